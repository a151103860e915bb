//! Momentum and volume diagnostics: RSI/price divergence, distribution
//! day counting, and heavy-volume money-flow classification.

use crate::analysis::enrich::EnrichedDaily;
use crate::constants::{
    DISTRIBUTION_RET_FLOOR, DISTRIBUTION_WINDOW, HEAVY_VOLUME_RATIO, INFORMED_MONEY_WINDOW,
};
use crate::models::{
    Diagnostics, DistributionDays, DivergenceReport, InformedMoney, MoneyFlowSignal, SwingRef,
};

fn divergence_miss(reason: &str) -> DivergenceReport {
    DivergenceReport {
        detected: false,
        confirmed: false,
        reason: reason.to_string(),
        prev_high: None,
        last_high: None,
        prev_rsi: None,
        last_rsi: None,
        confirm_close: None,
        confirm_vol_ratio: None,
    }
}

/// Bearish divergence over the last two RSI-bearing swing highs: price
/// prints a higher high while RSI prints a lower high. Confirmed only
/// once a later bar closes below the intervening swing low on at least
/// average volume (vol_ratio >= 1.0).
pub fn detect_divergence(daily: &EnrichedDaily) -> DivergenceReport {
    let highs: Vec<usize> = daily
        .swing_high_indices()
        .into_iter()
        .filter(|&i| daily.rsi14[i].is_some())
        .collect();
    if highs.len() < 2 {
        return divergence_miss("insufficient_swing_highs");
    }
    let prev_i = highs[highs.len() - 2];
    let last_i = highs[highs.len() - 1];
    let prev_price = daily.swing_high[prev_i].unwrap_or(daily.bars[prev_i].high);
    let last_price = daily.swing_high[last_i].unwrap_or(daily.bars[last_i].high);
    let prev_rsi = daily.rsi14[prev_i].unwrap_or(50.0);
    let last_rsi = daily.rsi14[last_i].unwrap_or(50.0);

    let prev_ref = SwingRef { datetime: daily.bars[prev_i].datetime, value: prev_price };
    let last_ref = SwingRef { datetime: daily.bars[last_i].datetime, value: last_price };

    if !(last_price > prev_price && last_rsi < prev_rsi) {
        let mut report = divergence_miss("no_divergence");
        report.prev_high = Some(prev_ref);
        report.last_high = Some(last_ref);
        report.prev_rsi = Some(prev_rsi);
        report.last_rsi = Some(last_rsi);
        return report;
    }

    // Reference low: the most recent swing low at or after the earlier
    // divergent high.
    let reference_low = daily
        .swing_low_indices()
        .into_iter()
        .filter(|&i| i >= prev_i)
        .next_back()
        .and_then(|i| daily.swing_low[i]);

    let mut confirm_close = None;
    let mut confirm_vol_ratio = None;
    if let Some(ref_low) = reference_low {
        for i in last_i + 1..daily.bars.len() {
            let close = daily.bars[i].close;
            let vol_ok = daily.vol_ratio[i].is_some_and(|r| r >= 1.0);
            if close < ref_low && vol_ok {
                confirm_close = Some(close);
                confirm_vol_ratio = daily.vol_ratio[i];
                break;
            }
        }
    }

    DivergenceReport {
        detected: true,
        confirmed: confirm_close.is_some(),
        reason: "ok".to_string(),
        prev_high: Some(prev_ref),
        last_high: Some(last_ref),
        prev_rsi: Some(prev_rsi),
        last_rsi: Some(last_rsi),
        confirm_close,
        confirm_vol_ratio,
    }
}

/// Down closes (beyond a small floor) on rising volume within the recent
/// window.
pub fn count_distribution_days(daily: &EnrichedDaily) -> DistributionDays {
    let n = daily.bars.len();
    let start = n.saturating_sub(DISTRIBUTION_WINDOW);
    let mut count = 0;
    for i in start.max(1)..n {
        let down = daily.ret[i].is_some_and(|r| r <= DISTRIBUTION_RET_FLOOR);
        let heavier = daily.bars[i].volume > daily.bars[i - 1].volume;
        if down && heavier {
            count += 1;
        }
    }
    DistributionDays { count, window: DISTRIBUTION_WINDOW }
}

/// Heavy-volume days split by close direction over the recent window.
pub fn informed_money(daily: &EnrichedDaily) -> InformedMoney {
    let n = daily.bars.len();
    let start = n.saturating_sub(INFORMED_MONEY_WINDOW);
    let mut accumulation_days = 0;
    let mut distribution_days = 0;
    for i in start..n {
        if !daily.vol_ratio[i].is_some_and(|r| r >= HEAVY_VOLUME_RATIO) {
            continue;
        }
        match daily.ret[i] {
            Some(r) if r > 0.0 => accumulation_days += 1,
            Some(r) if r < 0.0 => distribution_days += 1,
            _ => {}
        }
    }
    let ratio = accumulation_days as f64 / distribution_days.max(1) as f64;
    let signal = if accumulation_days > distribution_days {
        MoneyFlowSignal::Accumulation
    } else if distribution_days > accumulation_days {
        MoneyFlowSignal::Distribution
    } else {
        MoneyFlowSignal::Balanced
    };
    InformedMoney { accumulation_days, distribution_days, ratio, signal }
}

pub fn build_diagnostics(daily: &EnrichedDaily) -> Diagnostics {
    Diagnostics {
        divergence: detect_divergence(daily),
        distribution_days: count_distribution_days(daily),
        informed_money: informed_money(daily),
    }
}
