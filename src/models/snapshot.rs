//! Typed records composing the output snapshot.
//!
//! Wire names match the original context document: enum variants
//! serialize as the snake_case / SCREAMING_SNAKE_CASE strings consumers
//! already parse. Everything here is value-type data derived from one
//! run's input series; nothing is mutated after assembly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Swings and levels
// ---------------------------------------------------------------------------

/// Strength degrades monotonically with touch count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelStrength {
    StrongFirstTest,
    Strong,
    Weakening,
    Fragile,
}

impl LevelStrength {
    pub fn from_touches(touches: usize) -> Self {
        match touches {
            0 | 1 => LevelStrength::StrongFirstTest,
            2 => LevelStrength::Strong,
            3 => LevelStrength::Weakening,
            _ => LevelStrength::Fragile,
        }
    }

    pub fn is_exhausted(self) -> bool {
        matches!(self, LevelStrength::Weakening | LevelStrength::Fragile)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelZone {
    pub zone_mid: f64,
    pub zone_low: f64,
    pub zone_high: f64,
    pub touches: usize,
    pub strength: LevelStrength,
}

// ---------------------------------------------------------------------------
// Structure events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSide {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventLabel {
    Bos,
    Choch,
}

/// One compacted break-of-structure event. `count` is the number of raw
/// events merged into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureEvent {
    pub datetime: DateTime<Utc>,
    pub side: EventSide,
    pub label: EventLabel,
    pub broken_level: f64,
    pub close: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureStatus {
    NoSignal,
    ChochOnly,
    ChochPlusBosConfirmed,
}

// ---------------------------------------------------------------------------
// Regime
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeKind {
    TrendContinuation,
    RangeRotation,
    PotentialReversal,
    NoTrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBias {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingRef {
    pub datetime: DateTime<Utc>,
    pub value: f64,
}

/// Evidence behind a regime call: either the deciding swing pair, or the
/// reason the classifier degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegimeProof {
    Insufficient { reason: String },
    Swings { last_swing_high: SwingRef, last_swing_low: SwingRef },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regime {
    pub regime: RegimeKind,
    pub trend_bias: TrendBias,
    pub proof: RegimeProof,
}

// ---------------------------------------------------------------------------
// Initial balance
// ---------------------------------------------------------------------------

/// Acceptance/rejection state versus a seeded range. The two
/// `Insufficient*` variants are degraded statuses, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IbState {
    InsideIbRange,
    AcceptedAboveIbh,
    AcceptedBelowIbl,
    FailedBreakAboveIbh,
    FailedBreakBelowIbl,
    InsufficientSessionBars,
    InsufficientPeriodBars,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionIb {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ibh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ibl: Option<f64>,
    pub state: IbState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodIb {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub first_n_bars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ibh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ibl: Option<f64>,
    pub state: IbState,
}

// ---------------------------------------------------------------------------
// Volume profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileMode {
    Fixed,
    Anchored,
    Session,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vah: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val: Option<f64>,
    pub hvn_top3: Vec<f64>,
    pub lvn_top3: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ProfileMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueAcceptance {
    AcceptedAboveVah,
    ProbeAboveVah,
    AcceptedBelowVal,
    ProbeBelowVal,
    InsideValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPoc {
    pub session: String,
    pub poc: f64,
}

/// Direction-weighted profile anchored at the most recent relevant swing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchoredProfile {
    pub anchor_datetime: DateTime<Utc>,
    pub anchor_price: f64,
    #[serde(flatten)]
    pub profile: VolumeProfile,
    pub up_volume: f64,
    pub down_volume: f64,
}

// ---------------------------------------------------------------------------
// Imbalance zones
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImbalanceKind {
    OpeningGap,
    VolumeImbalance,
    Fvg,
    Ifvg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationState {
    Unmitigated,
    PartiallyMitigated,
    FullyMitigated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceZone {
    #[serde(rename = "type")]
    pub kind: ImbalanceKind,
    pub direction: Direction,
    pub low: f64,
    pub high: f64,
    /// Consequent encroachment: midpoint of the zone.
    pub ce: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigation_state: Option<MitigationState>,
    /// Original direction for IFVG zones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_direction: Option<Direction>,
}

// ---------------------------------------------------------------------------
// Liquidity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepEvent {
    None,
    SwingSwept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepOutcome {
    Accepted,
    Rejected,
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityPath {
    ExternalToInternal,
    InternalToExternal,
    Unclear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawTargets {
    pub external_up: Option<f64>,
    pub external_down: Option<f64>,
    pub internal_up: Option<f64>,
    pub internal_down: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liquidity {
    pub current_draw: Option<f64>,
    pub opposing_draw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_up: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_down: Option<f64>,
    pub draw_targets: DrawTargets,
    pub sweep_event: SweepEvent,
    pub sweep_outcome: SweepOutcome,
    pub liquidity_path: LiquidityPath,
}

// ---------------------------------------------------------------------------
// Fibonacci
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibAnchors {
    pub swing_low: SwingRef,
    pub swing_high: SwingRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OteZone {
    pub fib_0_618: f64,
    pub fib_0_706: f64,
    pub fib_0_786: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibContext {
    pub trend: TrendDirection,
    pub anchors: FibAnchors,
    pub retracements: BTreeMap<String, f64>,
    pub extensions: BTreeMap<String, f64>,
    pub ote: OteZone,
}

// ---------------------------------------------------------------------------
// Breakout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakoutStatus {
    ValidBreakout,
    FailedBreakout,
    NoBreakout,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceVolumeClass {
    StrongUp,
    HealthyPullback,
    WeakRally,
    Distribution,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseStatus {
    Ok,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseQuality {
    pub weeks: f64,
    pub depth: f64,
    pub too_short: bool,
    pub too_deep: bool,
    pub status: BaseStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutSnapshot {
    pub status: BreakoutStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<EventSide>,
    pub up_level: Option<f64>,
    pub down_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_datetime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_datetime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_vol_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_volume_class: Option<PriceVolumeClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_quality: Option<BaseQuality>,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CupAndHandle {
    pub detected: bool,
    pub confirmed: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_rim: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_rim: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cup_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cup_depth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_depth_ratio: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WyckoffPhase {
    Accumulation,
    Markup,
    Distribution,
    Markdown,
    Unclear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WyckoffSpring {
    pub detected: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_datetime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reclaim_close: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WyckoffReport {
    pub phase: WyckoffPhase,
    pub spring: WyckoffSpring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendlineKind {
    AscendingSupport,
    DescendingResistance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trendline {
    #[serde(rename = "type")]
    pub kind: TrendlineKind,
    pub anchor_start: f64,
    pub anchor_end: f64,
    pub projected_level: f64,
    pub points_on_line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patterns {
    pub cup_and_handle: CupAndHandle,
    pub wyckoff: WyckoffReport,
    pub trendlines: Vec<Trendline>,
}

// ---------------------------------------------------------------------------
// SMC
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualLevel {
    pub datetime: DateTime<Utc>,
    pub level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualLevels {
    pub eqh: Vec<EqualLevel>,
    pub eql: Vec<EqualLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePosition {
    Premium,
    Discount,
    Equilibrium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumDiscount {
    pub range_low: f64,
    pub range_high: f64,
    pub equilibrium: f64,
    pub zone: RangePosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    OrderBlock,
    BreakerBlock,
}

/// Origin candle of a structure break, kept as a reaction zone. A block
/// price has closed through flips into a breaker with opposite polarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub direction: Direction,
    pub low: f64,
    pub high: f64,
    pub origin_datetime: DateTime<Utc>,
    pub mitigation_state: MitigationState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmcSection {
    pub equal_levels: EqualLevels,
    pub premium_discount: PremiumDiscount,
    pub structure_bias: TrendBias,
    pub order_blocks: Vec<OrderBlock>,
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceReport {
    pub detected: bool,
    pub confirmed: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_high: Option<SwingRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_high: Option<SwingRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_rsi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_rsi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_vol_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionDays {
    pub count: usize,
    pub window: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoneyFlowSignal {
    Accumulation,
    Distribution,
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformedMoney {
    pub accumulation_days: usize,
    pub distribution_days: usize,
    pub ratio: f64,
    pub signal: MoneyFlowSignal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub divergence: DivergenceReport,
    pub distribution_days: DistributionDays,
    pub informed_money: InformedMoney,
}

// ---------------------------------------------------------------------------
// Setup selection and red flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupId {
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    #[serde(rename = "NO_VALID_SETUP")]
    NoValidSetup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupSelection {
    pub setup_id: SetupId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagId {
    #[serde(rename = "F1_NO_TRADE_REGIME")]
    NoTradeRegime,
    #[serde(rename = "F2_FAILED_BREAKOUT")]
    FailedBreakout,
    #[serde(rename = "F3_LEVEL_EXHAUSTION")]
    LevelExhaustion,
    #[serde(rename = "F4_BEARISH_DIVERGENCE")]
    BearishDivergence,
    #[serde(rename = "F5_STRUCTURE_AMBIGUITY")]
    StructureAmbiguity,
    #[serde(rename = "F6_DISTRIBUTION_CLUSTER")]
    DistributionCluster,
    #[serde(rename = "F7_MA_BREAKDOWN")]
    MaBreakdown,
    #[serde(rename = "F8_WEAK_DISPLACEMENT")]
    WeakDisplacement,
    #[serde(rename = "F9_WEAK_SMC_EVIDENCE")]
    WeakSmcEvidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlag {
    pub flag_id: FlagId,
    pub severity: Severity,
    pub why: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlagReport {
    pub flags: Vec<RedFlag>,
    pub overall_severity: Severity,
}

impl RedFlagReport {
    pub fn from_flags(flags: Vec<RedFlag>) -> Self {
        let overall_severity = flags
            .iter()
            .map(|f| f.severity)
            .max()
            .unwrap_or(Severity::Low);
        RedFlagReport { flags, overall_severity }
    }
}

// ---------------------------------------------------------------------------
// Core sections and the root snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketState {
    Balance,
    Imbalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateReason {
    InsideValueArea,
    OutsideValueAreaUnconfirmed,
    AcceptedAboveValue,
    AcceptedBelowValue,
    FailedAcceptanceBackInside,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateAndRegime {
    pub state: MarketState,
    pub state_reason: StateReason,
    pub regime: RegimeKind,
    pub trend_bias: TrendBias,
    pub regime_proof: RegimeProof,
    pub structure_status: StructureStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaPosture {
    pub above_ema21: bool,
    pub above_sma50: bool,
    pub above_sma100: bool,
    pub above_sma200: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveMa {
    pub adaptive_period: Option<usize>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBasedOpens {
    pub daily_open: Option<f64>,
    pub weekly_open: Option<f64>,
    pub monthly_open: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundLevels {
    pub round_below: f64,
    pub round_at: f64,
    pub round_above: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleReversalNote {
    SupportBrokenMayFlipToResistance,
    ResistanceBrokenMayFlipToSupport,
    NoFlipSignal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelsSection {
    pub zones: Vec<LevelZone>,
    pub ma_posture: MaPosture,
    pub adaptive_ma: AdaptiveMa,
    pub time_based_opens: TimeBasedOpens,
    pub round_levels: RoundLevels,
    pub role_reversal_note: RoleReversalNote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fib_context: Option<FibContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub daily_rows: usize,
    pub intraday_rows: usize,
    pub corp_actions_rows: usize,
    pub daily_start: DateTime<Utc>,
    pub daily_end: DateTime<Utc>,
    pub intraday_start: DateTime<Utc>,
    pub intraday_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpvrSection {
    #[serde(flatten)]
    pub profile: VolumeProfile,
    pub acceptance: ValueAcceptance,
    pub prior_session_pocs: Vec<SessionPoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchored: Option<AnchoredProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceSection {
    pub zones: Vec<ImbalanceZone>,
    pub fvg_zones: Vec<ImbalanceZone>,
    pub ifvg_zones: Vec<ImbalanceZone>,
}

/// The root object. Assembled once per invocation, never mutated after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub symbol: String,
    pub modules: Vec<String>,
    pub data: DataSummary,
    pub state_and_regime: StateAndRegime,
    pub levels: LevelsSection,
    pub ib_state: SessionIb,
    pub period_ib_state: PeriodIb,
    pub structure_events: Vec<StructureEvent>,
    pub setup_selection: SetupSelection,
    pub liquidity: Liquidity,
    pub patterns: Patterns,
    pub diagnostics: Diagnostics,
    pub red_flags: RedFlagReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpvr: Option<VpvrSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imbalance: Option<ImbalanceSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakout: Option<BreakoutSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smc: Option<SmcSection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_strength_degrades_with_touches() {
        assert_eq!(LevelStrength::from_touches(1), LevelStrength::StrongFirstTest);
        assert_eq!(LevelStrength::from_touches(2), LevelStrength::Strong);
        assert_eq!(LevelStrength::from_touches(3), LevelStrength::Weakening);
        assert_eq!(LevelStrength::from_touches(7), LevelStrength::Fragile);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_overall_severity_is_max_or_low() {
        let empty = RedFlagReport::from_flags(vec![]);
        assert_eq!(empty.overall_severity, Severity::Low);

        let report = RedFlagReport::from_flags(vec![
            RedFlag {
                flag_id: FlagId::NoTradeRegime,
                severity: Severity::Medium,
                why: "regime is no_trade".to_string(),
            },
            RedFlag {
                flag_id: FlagId::MaBreakdown,
                severity: Severity::High,
                why: "close below SMA50 and SMA200".to_string(),
            },
        ]);
        assert_eq!(report.overall_severity, Severity::High);
    }

    #[test]
    fn test_wire_names_match_original_document() {
        assert_eq!(serde_json::to_string(&EventLabel::Choch).unwrap(), "\"CHOCH\"");
        assert_eq!(serde_json::to_string(&ImbalanceKind::OpeningGap).unwrap(), "\"OPENING_GAP\"");
        assert_eq!(serde_json::to_string(&SetupId::NoValidSetup).unwrap(), "\"NO_VALID_SETUP\"");
        assert_eq!(serde_json::to_string(&IbState::FailedBreakAboveIbh).unwrap(), "\"failed_break_above_ibh\"");
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(
            serde_json::to_string(&FlagId::MaBreakdown).unwrap(),
            "\"F7_MA_BREAKDOWN\""
        );
    }
}
