//! Engine thresholds and window sizes.
//!
//! Every value here is part of the deterministic contract: changing one
//! changes snapshot output for identical input, so regression tests pin
//! against these constants rather than repeating literals.

/// Symmetric fractal pivot width (bars looked at on each side).
pub const SWING_PIVOT_WIDTH: usize = 2;

/// Relative tolerance for clustering swing prices into level zones.
pub const LEVEL_CLUSTER_TOLERANCE: f64 = 0.02;

/// Swing prices fed into level clustering (most recent highs + lows).
pub const LEVEL_SOURCE_SWINGS: usize = 20;

/// Level zones reported in the snapshot.
pub const MAX_LEVEL_ZONES: usize = 12;

/// Structure-event compaction: max relative delta between broken levels.
pub const COMPACTION_LEVEL_TOLERANCE: f64 = 0.0035;

/// Structure-event compaction: max calendar-day gap between events.
pub const COMPACTION_MAX_GAP_DAYS: i64 = 4;

/// Structure events retained after compaction.
pub const MAX_STRUCTURE_EVENTS: usize = 16;

/// Events inspected when deriving CHOCH/BOS structure status.
pub const STRUCTURE_STATUS_WINDOW: usize = 4;

/// Value-area coverage target.
pub const VALUE_AREA_PCT: f64 = 0.70;

/// Fixed-window volume profile: bars and bins.
pub const FIXED_PROFILE_WINDOW: usize = 260;
pub const FIXED_PROFILE_BINS: usize = 40;

/// Per-session intraday profile: bins and prior sessions reported.
pub const SESSION_PROFILE_BINS: usize = 30;
pub const MAX_SESSION_POCS: usize = 3;

/// Breakout confirmation: trigger-bar volume ratio floor.
pub const BREAKOUT_VOL_RATIO: f64 = 1.2;

/// Breakout displacement floor as a multiple of ATR14 (below it, F8 fires).
pub const BREAKOUT_DISPLACEMENT_ATR: f64 = 0.5;

/// Equal-high/low tolerance as a multiple of ATR14.
pub const EQUAL_LEVEL_ATR_MULT: f64 = 0.2;

/// Bars seeding the initial-balance range (intraday session and
/// calendar-month period alike).
pub const IB_SEED_BARS: usize = 2;

/// Distribution-day scan: window, down-close floor, flag thresholds.
pub const DISTRIBUTION_WINDOW: usize = 25;
pub const DISTRIBUTION_RET_FLOOR: f64 = -0.002;
pub const DISTRIBUTION_FLAG_COUNT: usize = 4;
pub const DISTRIBUTION_CRITICAL_COUNT: usize = 6;

/// Informed-money scan window and heavy-volume ratio.
pub const INFORMED_MONEY_WINDOW: usize = 50;
pub const HEAVY_VOLUME_RATIO: f64 = 1.2;

/// Cup-and-handle geometry.
pub const CUP_WINDOW: usize = 60;
pub const CUP_MIN_BARS: usize = 35;
pub const CUP_RIM_TOLERANCE: f64 = 0.03;
pub const CUP_MIN_DEPTH: f64 = 0.12;
pub const CUP_MAX_HANDLE_RATIO: f64 = 0.40;

/// Wyckoff spring reclaim lookback.
pub const SPRING_LOOKBACK: usize = 10;

/// Imbalance-zone caps (most recent kept).
pub const MAX_IMBALANCE_ZONES: usize = 20;
pub const MAX_FVG_ZONES: usize = 12;
pub const MAX_IFVG_ZONES: usize = 8;

/// Order-block zones reported.
pub const MAX_ORDER_BLOCKS: usize = 4;

/// Trendline fit: points required on the line and ATR tolerance factor.
pub const TRENDLINE_MIN_POINTS: usize = 3;
pub const TRENDLINE_ATR_TOLERANCE: f64 = 0.5;

/// Base-quality gate for breakouts (weeks of base, max depth).
pub const BASE_WINDOW: usize = 35;
pub const BASE_MIN_WEEKS: f64 = 7.0;
pub const BASE_MAX_DEPTH: f64 = 0.35;

/// Fibonacci ratio tables.
pub const FIB_RETRACEMENT_RATIOS: [f64; 6] = [0.236, 0.382, 0.5, 0.618, 0.706, 0.786];
pub const FIB_EXTENSION_RATIOS: [f64; 4] = [1.0, 1.272, 1.618, 2.618];

/// Guard for relative-delta denominators.
pub const EPSILON: f64 = 1e-9;
