//! Moving-average posture and auxiliary reference levels: adaptive MA
//! selection, time-based opens, round numbers, and role-reversal notes.

use chrono::Datelike;

use crate::analysis::enrich::{rolling_mean, EnrichedDaily};
use crate::models::{AdaptiveMa, MaPosture, RoleReversalNote, RoundLevels, TimeBasedOpens};

const ADAPTIVE_CANDIDATES: [usize; 5] = [3, 5, 10, 20, 50];
const ADAPTIVE_LOOKBACK: usize = 120;
const ROUND_LEVEL_STEP: f64 = 100.0;

/// Close versus the MA stack at the latest bar. A moving average still
/// inside its warmup counts as "above", matching a missing-column read.
pub fn ma_posture(daily: &EnrichedDaily) -> MaPosture {
    let i = daily.len().saturating_sub(1);
    let c = daily.last_close();
    MaPosture {
        above_ema21: c >= daily.ema21.get(i).copied().unwrap_or(c),
        above_sma50: daily.sma50[i].map_or(true, |ma| c >= ma),
        above_sma100: daily.sma100[i].map_or(true, |ma| c >= ma),
        above_sma200: daily.sma200[i].map_or(true, |ma| c >= ma),
    }
}

/// Score each candidate SMA period over the recent lookback by how many
/// bars closed above a rising average; the best scorer is the adaptive
/// period. Ties keep the shortest period.
pub fn choose_adaptive_ma(daily: &EnrichedDaily) -> AdaptiveMa {
    let start = daily.len().saturating_sub(ADAPTIVE_LOOKBACK);
    let closes: Vec<f64> = daily.bars[start..].iter().map(|b| b.close).collect();

    let mut best_period = None;
    let mut best_score = -1.0;
    for n in ADAPTIVE_CANDIDATES {
        let sma = rolling_mean(&closes, n);
        let defined = sma.iter().filter(|v| v.is_some()).count();
        if defined < 20 {
            continue;
        }
        let mut score = 0.0;
        for i in 1..closes.len() {
            if let (Some(cur), Some(prev)) = (sma[i], sma[i - 1]) {
                if closes[i] >= cur && cur > prev {
                    score += 1.0;
                }
            }
        }
        if score > best_score {
            best_score = score;
            best_period = Some(n);
        }
    }
    AdaptiveMa { adaptive_period: best_period, score: best_score }
}

/// Opens of the latest day, ISO week, and calendar month in the daily
/// series.
pub fn time_based_opens(daily: &EnrichedDaily) -> TimeBasedOpens {
    let last = match daily.bars.last() {
        Some(b) => b,
        None => {
            return TimeBasedOpens { daily_open: None, weekly_open: None, monthly_open: None }
        }
    };
    let day_key = last.datetime.date_naive();
    let week_key = (last.datetime.iso_week().year(), last.datetime.iso_week().week());
    let month_key = (last.datetime.year(), last.datetime.month());

    let first_open = |pred: &dyn Fn(&chrono::DateTime<chrono::Utc>) -> bool| {
        daily
            .bars
            .iter()
            .find(|b| pred(&b.datetime))
            .map(|b| b.open)
    };

    TimeBasedOpens {
        daily_open: first_open(&|dt| dt.date_naive() == day_key),
        weekly_open: first_open(&|dt| (dt.iso_week().year(), dt.iso_week().week()) == week_key),
        monthly_open: first_open(&|dt| (dt.year(), dt.month()) == month_key),
    }
}

pub fn nearest_round_levels(price: f64) -> RoundLevels {
    let base = (price / ROUND_LEVEL_STEP).round() * ROUND_LEVEL_STEP;
    RoundLevels {
        round_below: base - ROUND_LEVEL_STEP,
        round_at: base,
        round_above: base + ROUND_LEVEL_STEP,
    }
}

/// A broken level likely flips roles: support into resistance, or the
/// reverse.
pub fn role_reversal(last_close: f64, level: f64, was_support: bool) -> RoleReversalNote {
    if was_support && last_close < level {
        RoleReversalNote::SupportBrokenMayFlipToResistance
    } else if !was_support && last_close > level {
        RoleReversalNote::ResistanceBrokenMayFlipToSupport
    } else {
        RoleReversalNote::NoFlipSignal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bar, Series};
    use chrono::{Duration, TimeZone, Utc};

    fn daily_from_closes(closes: &[f64]) -> EnrichedDaily {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars: Series = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Bar::new(start + Duration::days(i as i64), c - 0.5, c + 1.0, c - 1.0, c, 1000.0)
            })
            .collect();
        EnrichedDaily::new(bars, 2)
    }

    #[test]
    fn test_posture_above_all_in_uptrend() {
        let closes: Vec<f64> = (0..220).map(|i| 100.0 + i as f64 * 0.5).collect();
        let daily = daily_from_closes(&closes);
        let posture = ma_posture(&daily);
        assert!(posture.above_ema21);
        assert!(posture.above_sma50);
        assert!(posture.above_sma100);
        assert!(posture.above_sma200);
    }

    #[test]
    fn test_posture_defaults_true_during_warmup() {
        let daily = daily_from_closes(&[100.0, 101.0, 102.0]);
        let posture = ma_posture(&daily);
        assert!(posture.above_sma200);
    }

    #[test]
    fn test_adaptive_ma_picks_a_candidate_in_trend() {
        let closes: Vec<f64> = (0..150).map(|i| 100.0 + i as f64).collect();
        let daily = daily_from_closes(&closes);
        let adaptive = choose_adaptive_ma(&daily);
        // In a clean linear uptrend every candidate scores nearly every
        // bar past its warmup; the shortest window has the most defined
        // bars and wins.
        assert_eq!(adaptive.adaptive_period, Some(3));
        assert!(adaptive.score > 0.0);
    }

    #[test]
    fn test_adaptive_ma_degrades_on_short_history() {
        let daily = daily_from_closes(&[100.0; 10]);
        let adaptive = choose_adaptive_ma(&daily);
        assert_eq!(adaptive.adaptive_period, None);
        assert_eq!(adaptive.score, -1.0);
    }

    #[test]
    fn test_time_based_opens() {
        // Span two ISO weeks and one month boundary.
        let start = Utc.with_ymd_and_hms(2024, 1, 29, 0, 0, 0).unwrap(); // Monday
        let bars: Series = (0..7)
            .map(|i| {
                let t = start + Duration::days(i);
                Bar::new(t, 100.0 + i as f64, 101.0 + i as f64, 99.0, 100.5, 1000.0)
            })
            .collect();
        let daily = EnrichedDaily::new(bars, 2);
        let opens = time_based_opens(&daily);
        // Last bar is Sunday Feb 4, still ISO week 5 which began Jan 29.
        assert_eq!(opens.daily_open, Some(106.0));
        assert_eq!(opens.weekly_open, Some(100.0));
        // February opened on Feb 1 (index 3).
        assert_eq!(opens.monthly_open, Some(103.0));
    }

    #[test]
    fn test_round_levels() {
        let r = nearest_round_levels(1_234.0);
        assert_eq!(r.round_at, 1_200.0);
        assert_eq!(r.round_below, 1_100.0);
        assert_eq!(r.round_above, 1_300.0);
    }

    #[test]
    fn test_role_reversal_notes() {
        assert_eq!(
            role_reversal(95.0, 100.0, true),
            RoleReversalNote::SupportBrokenMayFlipToResistance
        );
        assert_eq!(
            role_reversal(105.0, 100.0, false),
            RoleReversalNote::ResistanceBrokenMayFlipToSupport
        );
        assert_eq!(role_reversal(105.0, 100.0, true), RoleReversalNote::NoFlipSignal);
    }
}
