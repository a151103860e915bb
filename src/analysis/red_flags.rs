//! Rule-based risk flags over the assembled module outputs.
//!
//! Each rule is independent and appends at most one flag; the second
//! pass cross-checks optional module sections that were requested.
//! Overall severity is the maximum present, LOW when nothing fired.

use crate::analysis::enrich::EnrichedDaily;
use crate::constants::{
    BREAKOUT_DISPLACEMENT_ATR, DISTRIBUTION_CRITICAL_COUNT, DISTRIBUTION_FLAG_COUNT,
};
use crate::models::{
    BreakoutSnapshot, BreakoutStatus, Diagnostics, EventSide, FlagId, LevelZone, Module,
    ModuleSet, RedFlag, RedFlagReport, RegimeKind, Severity, SmcSection, StructureStatus,
};

fn flag(flag_id: FlagId, severity: Severity, why: impl Into<String>) -> RedFlag {
    RedFlag { flag_id, severity, why: why.into() }
}

/// Zone whose midpoint sits nearest the price, if any.
fn nearest_zone(levels: &[LevelZone], price: f64) -> Option<&LevelZone> {
    levels
        .iter()
        .min_by(|a, b| (a.zone_mid - price).abs().total_cmp(&(b.zone_mid - price).abs()))
}

pub struct RedFlagInputs<'a> {
    pub daily: &'a EnrichedDaily,
    pub regime: RegimeKind,
    pub structure_status: StructureStatus,
    pub levels: &'a [LevelZone],
    pub breakout: Option<&'a BreakoutSnapshot>,
    pub diagnostics: &'a Diagnostics,
    pub smc: Option<&'a SmcSection>,
    pub modules: &'a ModuleSet,
}

pub fn evaluate(inputs: &RedFlagInputs) -> RedFlagReport {
    let mut flags = Vec::new();
    let daily = inputs.daily;
    let last_close = daily.last_close();

    if inputs.regime == RegimeKind::NoTrade {
        flags.push(flag(
            FlagId::NoTradeRegime,
            Severity::Medium,
            "regime classifier degraded to no_trade",
        ));
    }

    if let Some(breakout) = inputs.breakout {
        if breakout.status == BreakoutStatus::FailedBreakout {
            flags.push(flag(
                FlagId::FailedBreakout,
                Severity::High,
                "trigger bar broke a level but the follow bar gave it back",
            ));
        }
    }

    if let Some(zone) = nearest_zone(inputs.levels, last_close) {
        if zone.strength.is_exhausted() {
            flags.push(flag(
                FlagId::LevelExhaustion,
                Severity::Medium,
                format!(
                    "nearest zone at {:.2} already touched {} times",
                    zone.zone_mid, zone.touches
                ),
            ));
        }
    }

    if inputs.diagnostics.divergence.confirmed {
        flags.push(flag(
            FlagId::BearishDivergence,
            Severity::High,
            "higher price high on lower RSI high, confirmed on volume",
        ));
    }

    if inputs.structure_status == StructureStatus::ChochOnly {
        flags.push(flag(
            FlagId::StructureAmbiguity,
            Severity::Medium,
            "CHOCH printed without a confirming BOS",
        ));
    }

    let dist = &inputs.diagnostics.distribution_days;
    if dist.count >= DISTRIBUTION_FLAG_COUNT {
        let severity = if dist.count >= DISTRIBUTION_CRITICAL_COUNT {
            Severity::Critical
        } else {
            Severity::High
        };
        flags.push(flag(
            FlagId::DistributionCluster,
            severity,
            format!("{} distribution days in the last {} bars", dist.count, dist.window),
        ));
    }

    let n = daily.len();
    if n > 0 {
        let below_50 = daily.sma50[n - 1].is_some_and(|ma| last_close < ma);
        let below_200 = daily.sma200[n - 1].is_some_and(|ma| last_close < ma);
        if below_50 && below_200 {
            flags.push(flag(
                FlagId::MaBreakdown,
                Severity::High,
                "close below both SMA50 and SMA200",
            ));
        }
    }

    if let Some(breakout) = inputs.breakout {
        if breakout.status == BreakoutStatus::ValidBreakout {
            let displacement = match (breakout.trigger_close, breakout.side) {
                (Some(close), Some(side)) => match side {
                    EventSide::Up => breakout.up_level,
                    EventSide::Down => breakout.down_level,
                }
                .map(|level| (close - level).abs()),
                _ => None,
            };
            let atr = daily.atr14.last().copied().flatten();
            if let (Some(disp), Some(atr)) = (displacement, atr) {
                if disp < atr * BREAKOUT_DISPLACEMENT_ATR {
                    flags.push(flag(
                        FlagId::WeakDisplacement,
                        Severity::Low,
                        "breakout displacement under half an ATR",
                    ));
                }
            }
        }
    }

    // Enrichment pass: requested modules that produced no evidence.
    if inputs.modules.contains(Module::Smc) {
        let weak = match inputs.smc {
            Some(smc) => {
                smc.equal_levels.eqh.is_empty()
                    && smc.equal_levels.eql.is_empty()
                    && smc.order_blocks.is_empty()
            }
            None => true,
        };
        if weak {
            flags.push(flag(
                FlagId::WeakSmcEvidence,
                Severity::Low,
                "smc module produced no equal levels or order blocks",
            ));
        }
    }

    RedFlagReport::from_flags(flags)
}
