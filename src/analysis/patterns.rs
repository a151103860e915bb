//! Chart and smart-money patterns: cup-and-handle geometry, Wyckoff
//! phase/spring, equal highs/lows, premium/discount positioning,
//! order/breaker blocks, and swing-fit trendlines.

use crate::analysis::enrich::EnrichedDaily;
use crate::analysis::structure::IndexedEvent;
use crate::constants::{
    CUP_MAX_HANDLE_RATIO, CUP_MIN_BARS, CUP_MIN_DEPTH, CUP_RIM_TOLERANCE, CUP_WINDOW,
    EQUAL_LEVEL_ATR_MULT, MAX_ORDER_BLOCKS, SPRING_LOOKBACK, TRENDLINE_ATR_TOLERANCE,
    TRENDLINE_MIN_POINTS,
};
use crate::models::{
    BlockKind, CupAndHandle, Direction, EqualLevel, EqualLevels, EventSide, OrderBlock,
    PremiumDiscount, RangePosition, RegimeKind, TrendBias, Trendline, TrendlineKind, WyckoffPhase,
    WyckoffSpring,
};

// ---------------------------------------------------------------------------
// Equal highs / equal lows
// ---------------------------------------------------------------------------

/// Consecutive swing extremes within ATR14 x 0.2 of each other count as
/// equal. The last five per side are kept.
pub fn detect_equal_levels(daily: &EnrichedDaily) -> EqualLevels {
    fn scan(
        daily: &EnrichedDaily,
        indices: &[usize],
        value_at: impl Fn(usize) -> f64,
    ) -> Vec<EqualLevel> {
        let mut out = Vec::new();
        for pair in indices.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);
            let tol = daily.atr14[cur].unwrap_or(0.0) * EQUAL_LEVEL_ATR_MULT;
            let (v0, v1) = (value_at(prev), value_at(cur));
            if (v1 - v0).abs() <= tol {
                out.push(EqualLevel { datetime: daily.bars[cur].datetime, level: v1 });
            }
        }
        if out.len() > 5 {
            out.drain(..out.len() - 5);
        }
        out
    }

    let eqh = scan(daily, &daily.swing_high_indices(), |i| {
        daily.swing_high[i].unwrap_or(daily.bars[i].high)
    });
    let eql = scan(daily, &daily.swing_low_indices(), |i| {
        daily.swing_low[i].unwrap_or(daily.bars[i].low)
    });
    EqualLevels { eqh, eql }
}

// ---------------------------------------------------------------------------
// Premium / discount and structure bias
// ---------------------------------------------------------------------------

pub fn premium_discount_zone(range_low: f64, range_high: f64, price: f64) -> PremiumDiscount {
    let equilibrium = (range_low + range_high) / 2.0;
    let zone = if price > equilibrium {
        RangePosition::Premium
    } else if price < equilibrium {
        RangePosition::Discount
    } else {
        RangePosition::Equilibrium
    };
    PremiumDiscount { range_low, range_high, equilibrium, zone }
}

/// Swing bias wins; a neutral swing read falls back to the internal
/// (last-event) bias.
pub fn choose_structure_bias(swing_bias: TrendBias, internal_bias: TrendBias) -> TrendBias {
    if swing_bias != TrendBias::Neutral {
        swing_bias
    } else {
        internal_bias
    }
}

// ---------------------------------------------------------------------------
// Wyckoff
// ---------------------------------------------------------------------------

/// Phase from the regime read and where price sits in the recent range:
/// trending markets are markup/markdown, rotational markets accumulate
/// in discount and distribute in premium.
pub fn classify_wyckoff_phase(
    regime: RegimeKind,
    trend_bias: TrendBias,
    position: RangePosition,
) -> WyckoffPhase {
    match (regime, trend_bias) {
        (RegimeKind::TrendContinuation, TrendBias::Bullish) => WyckoffPhase::Markup,
        (RegimeKind::TrendContinuation, TrendBias::Bearish) => WyckoffPhase::Markdown,
        (RegimeKind::RangeRotation, _) => match position {
            RangePosition::Discount => WyckoffPhase::Accumulation,
            RangePosition::Premium => WyckoffPhase::Distribution,
            RangePosition::Equilibrium => WyckoffPhase::Unclear,
        },
        _ => WyckoffPhase::Unclear,
    }
}

fn spring_miss(reason: &str) -> WyckoffSpring {
    WyckoffSpring {
        detected: false,
        reason: reason.to_string(),
        support_level: None,
        support_datetime: None,
        sweep_low: None,
        reclaim_close: None,
    }
}

/// Spring: an undercut of a prior swing-low support reclaimed within the
/// lookback, in an accumulation-consistent context.
pub fn detect_wyckoff_spring(daily: &EnrichedDaily, phase: WyckoffPhase) -> WyckoffSpring {
    if !matches!(phase, WyckoffPhase::Accumulation | WyckoffPhase::Unclear) {
        return spring_miss("wrong_wyckoff_phase");
    }

    let low_idx = daily.swing_low_indices();
    let recent: Vec<usize> = low_idx.iter().rev().take(6).rev().copied().collect();
    if recent.len() < 2 {
        return spring_miss("insufficient_swing_lows");
    }

    let support_i = recent[recent.len() - 2];
    let support_level = match daily.swing_low[support_i] {
        Some(v) => v,
        None => return spring_miss("insufficient_swing_lows"),
    };
    let support_datetime = daily.bars[support_i].datetime;

    let after: Vec<usize> = (support_i + 1..daily.bars.len()).collect();
    if after.is_empty() {
        return spring_miss("no_bars_after_support");
    }
    let tail = &after[after.len().saturating_sub(SPRING_LOOKBACK)..];

    let sweep_low = tail
        .iter()
        .map(|&i| daily.bars[i].low)
        .fold(f64::INFINITY, f64::min);
    if sweep_low >= support_level {
        return spring_miss("no_sweep_below_support");
    }

    let reclaim_close = daily.bars[*tail.last().unwrap_or(&0)].close;
    if reclaim_close <= support_level {
        return spring_miss("not_reclaimed");
    }

    WyckoffSpring {
        detected: true,
        reason: "ok".to_string(),
        support_level: Some(support_level),
        support_datetime: Some(support_datetime),
        sweep_low: Some(sweep_low),
        reclaim_close: Some(reclaim_close),
    }
}

// ---------------------------------------------------------------------------
// Cup and handle
// ---------------------------------------------------------------------------

fn cup_miss(reason: &str) -> CupAndHandle {
    CupAndHandle {
        detected: false,
        confirmed: false,
        reason: reason.to_string(),
        left_rim: None,
        right_rim: None,
        cup_low: None,
        handle_low: None,
        cup_depth: None,
        handle_depth_ratio: None,
    }
}

/// Cup geometry over the recent window: rims within a tolerance band
/// around the deepest low, enough depth, and a handle retracing at most
/// a bounded share of the cup. Confirmed once the close clears the
/// right rim.
pub fn detect_cup_and_handle(daily: &EnrichedDaily) -> CupAndHandle {
    let n = daily.bars.len();
    if n < CUP_MIN_BARS {
        return cup_miss("insufficient_bars");
    }
    let start = n.saturating_sub(CUP_WINDOW);
    let window = &daily.bars[start..];
    let w = window.len();

    // Deepest low in the interior of the window is the cup bottom.
    let (low_i, cup_low) = window
        .iter()
        .enumerate()
        .skip(1)
        .take(w.saturating_sub(2))
        .map(|(i, b)| (i, b.low))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, window[0].low));
    if low_i < 2 || low_i > w - 3 {
        return cup_miss("cup_low_at_edge");
    }

    let left_rim = window[..low_i]
        .iter()
        .map(|b| b.high)
        .fold(f64::NEG_INFINITY, f64::max);
    // Right rim forms before the handle: highest high after the bottom,
    // excluding the last few bars that may be the handle itself.
    let right_scan_end = w.saturating_sub(3).max(low_i + 1);
    let (rim_rel, right_rim) = window[low_i + 1..right_scan_end]
        .iter()
        .enumerate()
        .map(|(i, b)| (i, b.high))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, window[low_i + 1].high));
    let right_rim_i = low_i + 1 + rim_rel;

    let rim_ref = left_rim.max(right_rim);
    if rim_ref <= 0.0 {
        return cup_miss("degenerate_prices");
    }
    if (left_rim - right_rim).abs() / rim_ref > CUP_RIM_TOLERANCE {
        return cup_miss("rims_not_level");
    }

    let cup_depth = (rim_ref - cup_low) / rim_ref;
    if cup_depth < CUP_MIN_DEPTH {
        return cup_miss("cup_too_shallow");
    }

    let handle = &window[right_rim_i + 1..];
    if handle.is_empty() {
        return cup_miss("no_handle");
    }
    let handle_low = handle.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let span = right_rim - cup_low;
    let handle_depth_ratio = if span > 0.0 {
        (right_rim - handle_low) / span
    } else {
        1.0
    };
    if handle_depth_ratio > CUP_MAX_HANDLE_RATIO {
        return cup_miss("handle_too_deep");
    }

    let confirmed = daily.last_close() > right_rim;
    CupAndHandle {
        detected: true,
        confirmed,
        reason: "ok".to_string(),
        left_rim: Some(left_rim),
        right_rim: Some(right_rim),
        cup_low: Some(cup_low),
        handle_low: Some(handle_low),
        cup_depth: Some(cup_depth),
        handle_depth_ratio: Some(handle_depth_ratio),
    }
}

// ---------------------------------------------------------------------------
// Order blocks and breakers
// ---------------------------------------------------------------------------

/// Origin candle of each recent structure break: the last opposite-
/// direction candle before the break bar. A block whose far side the
/// close has since traded through flips into a breaker.
pub fn detect_order_blocks(daily: &EnrichedDaily, events: &[IndexedEvent]) -> Vec<OrderBlock> {
    let last = match daily.bars.last() {
        Some(b) => b,
        None => return Vec::new(),
    };
    let mut out = Vec::new();

    for ev in events.iter().rev() {
        if out.len() >= MAX_ORDER_BLOCKS {
            break;
        }
        let break_i = ev.bar_index.min(daily.bars.len().saturating_sub(1));
        let origin = daily.bars[..break_i].iter().rposition(|b| match ev.event.side {
            EventSide::Up => b.close < b.open,
            EventSide::Down => b.close > b.open,
        });
        let origin_i = match origin {
            Some(i) => i,
            None => continue,
        };
        let origin_bar = &daily.bars[origin_i];
        let direction = match ev.event.side {
            EventSide::Up => Direction::Bullish,
            EventSide::Down => Direction::Bearish,
        };

        // Closed through the far side flips the block's polarity.
        let broken = match direction {
            Direction::Bullish => last.close < origin_bar.low,
            Direction::Bearish => last.close > origin_bar.high,
        };
        let (kind, direction) = if broken {
            (BlockKind::BreakerBlock, direction.flipped())
        } else {
            (BlockKind::OrderBlock, direction)
        };

        let mitigation = crate::analysis::imbalance::mitigation_state(
            origin_bar.low,
            origin_bar.high,
            last.low,
            last.high,
        );
        out.push(OrderBlock {
            kind,
            direction,
            low: origin_bar.low,
            high: origin_bar.high,
            origin_datetime: origin_bar.datetime,
            mitigation_state: mitigation,
        });
    }
    out.reverse();
    out
}

// ---------------------------------------------------------------------------
// Trendlines
// ---------------------------------------------------------------------------

/// Line through the first and last of the recent swing extremes on one
/// side; kept only when enough points sit within ATR-scaled tolerance
/// and the slope has the expected sign.
pub fn detect_trendlines(daily: &EnrichedDaily) -> Vec<Trendline> {
    let n = daily.bars.len();
    if n == 0 {
        return Vec::new();
    }
    let atr = daily.atr14[n - 1].unwrap_or(0.0);
    let tol = atr * TRENDLINE_ATR_TOLERANCE;
    let last_idx = (n - 1) as f64;
    let mut out = Vec::new();

    let fit = |indices: &[usize], values: &[f64], ascending: bool| {
        if indices.len() < TRENDLINE_MIN_POINTS || indices[indices.len() - 1] == indices[0] {
            return None;
        }
        let x0 = indices[0] as f64;
        let slope = (values[values.len() - 1] - values[0])
            / (indices[indices.len() - 1] as f64 - x0);
        if (ascending && slope <= 0.0) || (!ascending && slope >= 0.0) {
            return None;
        }
        let mut on_line = 0;
        for (&idx, &v) in indices.iter().zip(values) {
            let projected = values[0] + slope * (idx as f64 - x0);
            if (v - projected).abs() <= tol.max(projected.abs() * 0.01) {
                on_line += 1;
            }
        }
        if on_line < TRENDLINE_MIN_POINTS {
            return None;
        }
        Some(Trendline {
            kind: if ascending {
                TrendlineKind::AscendingSupport
            } else {
                TrendlineKind::DescendingResistance
            },
            anchor_start: values[0],
            anchor_end: values[values.len() - 1],
            projected_level: values[0] + slope * (last_idx - x0),
            points_on_line: on_line,
        })
    };

    let low_idx: Vec<usize> = daily
        .swing_low_indices()
        .iter()
        .rev()
        .take(8)
        .rev()
        .copied()
        .collect();
    let low_vals: Vec<f64> = low_idx.iter().filter_map(|&i| daily.swing_low[i]).collect();
    if let Some(t) = fit(&low_idx, &low_vals, true) {
        out.push(t);
    }

    let high_idx: Vec<usize> = daily
        .swing_high_indices()
        .iter()
        .rev()
        .take(8)
        .rev()
        .copied()
        .collect();
    let high_vals: Vec<f64> = high_idx.iter().filter_map(|&i| daily.swing_high[i]).collect();
    if let Some(t) = fit(&high_idx, &high_vals, false) {
        out.push(t);
    }

    out
}
