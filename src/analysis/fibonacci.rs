//! Fibonacci retracements, extensions, and the OTE sub-band.
//!
//! Anchors come from the most recent swing pair consistent with the
//! trend bias: in an up read the last swing low and the last swing high
//! at or after it, mirrored for a down read. A degenerate span (high at
//! or below low) yields no context.

use std::collections::BTreeMap;

use crate::analysis::enrich::EnrichedDaily;
use crate::constants::{FIB_EXTENSION_RATIOS, FIB_RETRACEMENT_RATIOS};
use crate::models::{FibAnchors, FibContext, OteZone, SwingRef, TrendBias, TrendDirection};

/// Ratio rendered with at least one decimal place, so 1.0 stays "1.0".
fn ratio_key(prefix: &str, r: f64) -> String {
    if r == r.trunc() {
        format!("{prefix}_{r:.1}")
    } else {
        format!("{prefix}_{r}")
    }
}

pub fn retracement_levels(
    swing_low: f64,
    swing_high: f64,
    trend: TrendDirection,
) -> BTreeMap<String, f64> {
    let span = swing_high - swing_low;
    FIB_RETRACEMENT_RATIOS
        .iter()
        .map(|&r| {
            let level = match trend {
                TrendDirection::Up => swing_high - span * r,
                TrendDirection::Down => swing_low + span * r,
            };
            (ratio_key("fib", r), level)
        })
        .collect()
}

pub fn extension_levels(
    swing_low: f64,
    swing_high: f64,
    trend: TrendDirection,
) -> BTreeMap<String, f64> {
    let span = swing_high - swing_low;
    FIB_EXTENSION_RATIOS
        .iter()
        .map(|&r| {
            let level = match trend {
                TrendDirection::Up => swing_low + span * r,
                TrendDirection::Down => swing_high - span * r,
            };
            (ratio_key("ext", r), level)
        })
        .collect()
}

/// Optimal trade entry: the 0.618 to 0.786 retracement sub-band.
pub fn ote_zone(swing_low: f64, swing_high: f64) -> OteZone {
    let span = swing_high - swing_low;
    OteZone {
        fib_0_618: swing_high - span * 0.618,
        fib_0_706: swing_high - span * 0.706,
        fib_0_786: swing_high - span * 0.786,
    }
}

pub fn derive_fib_context(daily: &EnrichedDaily, trend_bias: TrendBias) -> Option<FibContext> {
    let high_idx = daily.swing_high_indices();
    let low_idx = daily.swing_low_indices();
    let (last_high, last_low) = (*high_idx.last()?, *low_idx.last()?);

    let (trend, low_i, high_i) = if trend_bias == TrendBias::Bearish {
        // Anchor at the last swing high, the latest low at or after it.
        let low_i = low_idx
            .iter()
            .copied()
            .filter(|&i| i >= last_high)
            .next_back()
            .unwrap_or(last_low);
        (TrendDirection::Down, low_i, last_high)
    } else {
        let high_i = high_idx
            .iter()
            .copied()
            .filter(|&i| i >= last_low)
            .next_back()
            .unwrap_or(last_high);
        (TrendDirection::Up, last_low, high_i)
    };

    let swing_low = daily.swing_low[low_i]?;
    let swing_high = daily.swing_high[high_i]?;
    if swing_high <= swing_low {
        return None;
    }

    Some(FibContext {
        trend,
        anchors: FibAnchors {
            swing_low: SwingRef { datetime: daily.bars[low_i].datetime, value: swing_low },
            swing_high: SwingRef { datetime: daily.bars[high_i].datetime, value: swing_high },
        },
        retracements: retracement_levels(swing_low, swing_high, trend),
        extensions: extension_levels(swing_low, swing_high, trend),
        ote: ote_zone(swing_low, swing_high),
    })
}
