//! Price-binned volume profiling.
//!
//! Bars smear their volume evenly across every bucket their [low, high]
//! span touches. POC is the heaviest bucket; the value area is the
//! smallest descending-volume bucket set reaching 70% of total volume.
//! Three modes: fixed window, anchored at a swing, and per intraday
//! session.

use chrono::NaiveDate;

use crate::analysis::enrich::{EnrichedDaily, EnrichedIntraday};
use crate::constants::{
    FIXED_PROFILE_BINS, FIXED_PROFILE_WINDOW, MAX_SESSION_POCS, SESSION_PROFILE_BINS,
    VALUE_AREA_PCT,
};
use crate::models::{
    AnchoredProfile, Bar, MarketState, ProfileMode, SessionPoc, StateReason, TrendBias,
    ValueAcceptance, VolumeProfile,
};

/// Histogram over equal-width price buckets. In directional mode the
/// same buckets additionally accumulate up-volume vs down-volume by the
/// bar's close/open relation.
struct Histogram {
    edges: Vec<f64>,
    mids: Vec<f64>,
    volume: Vec<f64>,
    up_volume: f64,
    down_volume: f64,
}

impl Histogram {
    fn new(lo: f64, hi: f64, bins: usize) -> Option<Self> {
        if bins == 0 || !(hi > lo) {
            return None;
        }
        let step = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + step * i as f64).collect();
        let mids: Vec<f64> = (0..bins).map(|i| (edges[i] + edges[i + 1]) / 2.0).collect();
        Some(Histogram {
            edges,
            mids,
            volume: vec![0.0; bins],
            up_volume: 0.0,
            down_volume: 0.0,
        })
    }

    fn bucket_of(&self, price: f64) -> usize {
        let bins = self.volume.len();
        // Index of the last edge <= price, clamped into [0, bins-1].
        let mut idx = match self
            .edges
            .binary_search_by(|e| e.total_cmp(&price))
        {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        if idx >= bins {
            idx = bins - 1;
        }
        idx
    }

    fn add_bar(&mut self, bar: &Bar) {
        if bar.volume <= 0.0 {
            return;
        }
        let lo = self.bucket_of(bar.low);
        let hi = self.bucket_of(bar.high);
        let span = hi - lo + 1;
        let per_bucket = bar.volume / span as f64;
        for bucket in &mut self.volume[lo..=hi] {
            *bucket += per_bucket;
        }
        if bar.close >= bar.open {
            self.up_volume += bar.volume;
        } else {
            self.down_volume += bar.volume;
        }
    }

    fn total(&self) -> f64 {
        self.volume.iter().sum()
    }
}

/// POC/VAH/VAL plus the three heaviest (HVN) and lightest (LVN) bucket
/// midpoints.
fn summarize(hist: &Histogram, mode: ProfileMode) -> VolumeProfile {
    let total = hist.total();
    if total <= 0.0 {
        return VolumeProfile {
            poc: None,
            vah: None,
            val: None,
            hvn_top3: Vec::new(),
            lvn_top3: Vec::new(),
            mode: Some(mode),
        };
    }

    // Bucket order by volume descending, index ascending for ties:
    // deterministic regardless of allocation order.
    let mut order: Vec<usize> = (0..hist.volume.len()).collect();
    order.sort_by(|&a, &b| {
        hist.volume[b]
            .total_cmp(&hist.volume[a])
            .then(a.cmp(&b))
    });

    let poc_idx = order[0];
    let target = total * VALUE_AREA_PCT;
    let mut cum = 0.0;
    let mut chosen: Vec<usize> = Vec::new();
    for &i in &order {
        chosen.push(i);
        cum += hist.volume[i];
        if cum >= target {
            break;
        }
    }
    let vah = chosen.iter().map(|&i| hist.mids[i]).fold(f64::NEG_INFINITY, f64::max);
    let val = chosen.iter().map(|&i| hist.mids[i]).fold(f64::INFINITY, f64::min);

    let hvn_top3: Vec<f64> = order.iter().take(3).map(|&i| hist.mids[i]).collect();
    let lvn_top3: Vec<f64> = order.iter().rev().take(3).map(|&i| hist.mids[i]).collect();

    VolumeProfile {
        poc: Some(hist.mids[poc_idx]),
        vah: Some(vah),
        val: Some(val),
        hvn_top3,
        lvn_top3,
        mode: Some(mode),
    }
}

fn build_histogram(bars: &[Bar], bins: usize) -> Option<Histogram> {
    if bars.is_empty() {
        return None;
    }
    let lo = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let hi = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let mut hist = Histogram::new(lo, hi, bins)?;
    for bar in bars {
        hist.add_bar(bar);
    }
    Some(hist)
}

fn empty_profile(mode: ProfileMode) -> VolumeProfile {
    VolumeProfile {
        poc: None,
        vah: None,
        val: None,
        hvn_top3: Vec::new(),
        lvn_top3: Vec::new(),
        mode: Some(mode),
    }
}

/// Fixed-window profile over the most recent bars.
pub fn fixed_profile(daily: &EnrichedDaily) -> VolumeProfile {
    let start = daily.bars.len().saturating_sub(FIXED_PROFILE_WINDOW);
    match build_histogram(&daily.bars[start..], FIXED_PROFILE_BINS) {
        Some(hist) => summarize(&hist, ProfileMode::Fixed),
        None => empty_profile(ProfileMode::Fixed),
    }
}

/// Direction-weighted profile anchored at the most recent swing
/// consistent with the trend bias: the latest swing low for a bullish or
/// neutral read, the latest swing high for a bearish one.
pub fn anchored_profile(daily: &EnrichedDaily, bias: TrendBias) -> Option<AnchoredProfile> {
    let indices = match bias {
        TrendBias::Bearish => daily.swing_high_indices(),
        _ => daily.swing_low_indices(),
    };
    let anchor_idx = *indices.last()?;
    let anchor_bar = &daily.bars[anchor_idx];
    let anchor_price = match bias {
        TrendBias::Bearish => daily.swing_high[anchor_idx]?,
        _ => daily.swing_low[anchor_idx]?,
    };

    let hist = build_histogram(&daily.bars[anchor_idx..], FIXED_PROFILE_BINS)?;
    let profile = summarize(&hist, ProfileMode::Anchored);
    Some(AnchoredProfile {
        anchor_datetime: anchor_bar.datetime,
        anchor_price,
        profile,
        up_volume: hist.up_volume,
        down_volume: hist.down_volume,
    })
}

/// POC of each of the prior intraday sessions (latest session excluded).
pub fn prior_session_pocs(intraday: &EnrichedIntraday) -> Vec<SessionPoc> {
    let mut sessions: Vec<NaiveDate> = intraday.sessions.clone();
    sessions.dedup();
    if sessions.len() <= 1 {
        return Vec::new();
    }
    let prior = &sessions[sessions.len().saturating_sub(MAX_SESSION_POCS + 1)..sessions.len() - 1];

    let mut out = Vec::new();
    for session in prior {
        let bars: Vec<Bar> = intraday
            .bars
            .iter()
            .zip(&intraday.sessions)
            .filter(|(_, s)| *s == session)
            .map(|(b, _)| b.clone())
            .collect();
        if let Some(hist) = build_histogram(&bars, SESSION_PROFILE_BINS) {
            if let Some(poc) = summarize(&hist, ProfileMode::Session).poc {
                out.push(SessionPoc { session: session.format("%Y-%m-%d").to_string(), poc });
            }
        }
    }
    out
}

/// Last close versus the value area, with a previous close for
/// follow-through: beyond value on both closes is acceptance, on one a
/// probe.
pub fn acceptance_vs_value(
    close: f64,
    vah: f64,
    val: f64,
    prev_close: Option<f64>,
) -> ValueAcceptance {
    if close > vah {
        if prev_close.is_some_and(|p| p >= vah) {
            ValueAcceptance::AcceptedAboveVah
        } else {
            ValueAcceptance::ProbeAboveVah
        }
    } else if close < val {
        if prev_close.is_some_and(|p| p <= val) {
            ValueAcceptance::AcceptedBelowVal
        } else {
            ValueAcceptance::ProbeBelowVal
        }
    } else {
        ValueAcceptance::InsideValue
    }
}

/// Balance/imbalance read of the last close against the value area,
/// with the prior close deciding whether an excursion was accepted.
pub fn infer_state(
    last_close: f64,
    value_low: f64,
    value_high: f64,
    follow_close: Option<f64>,
) -> (MarketState, StateReason) {
    let outside = last_close > value_high || last_close < value_low;
    if !outside {
        return (MarketState::Balance, StateReason::InsideValueArea);
    }
    let follow = match follow_close {
        Some(c) => c,
        None => return (MarketState::Imbalance, StateReason::OutsideValueAreaUnconfirmed),
    };
    if last_close > value_high && follow >= value_high {
        (MarketState::Imbalance, StateReason::AcceptedAboveValue)
    } else if last_close < value_low && follow <= value_low {
        (MarketState::Imbalance, StateReason::AcceptedBelowValue)
    } else {
        (MarketState::Balance, StateReason::FailedAcceptanceBackInside)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Series;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(specs: &[(f64, f64, f64)]) -> Series {
        // (low, high, volume)
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        specs
            .iter()
            .enumerate()
            .map(|(i, &(low, high, volume))| {
                let mid = (low + high) / 2.0;
                Bar::new(start + Duration::days(i as i64), mid, high, low, mid, volume)
            })
            .collect()
    }

    #[test]
    fn test_total_volume_preserved() {
        let series = bars(&[
            (100.0, 110.0, 1000.0),
            (105.0, 115.0, 2000.0),
            (90.0, 100.0, 500.0),
        ]);
        let hist = build_histogram(&series, 40).unwrap();
        let input_total: f64 = series.iter().map(|b| b.volume).sum();
        assert!((hist.total() - input_total).abs() < 1e-6);
    }

    #[test]
    fn test_value_area_covers_seventy_pct() {
        let series = bars(&[
            (100.0, 101.0, 5000.0),
            (100.5, 101.5, 4000.0),
            (104.0, 105.0, 500.0),
            (95.0, 96.0, 300.0),
        ]);
        let hist = build_histogram(&series, 30).unwrap();
        let profile = summarize(&hist, ProfileMode::Fixed);
        let total = hist.total();
        let (vah, val) = (profile.vah.unwrap(), profile.val.unwrap());
        let covered: f64 = hist
            .mids
            .iter()
            .zip(&hist.volume)
            .filter(|(m, _)| **m >= val && **m <= vah)
            .map(|(_, v)| v)
            .sum();
        assert!(covered >= total * VALUE_AREA_PCT - 1e-9);
        assert!(val <= profile.poc.unwrap() && profile.poc.unwrap() <= vah);
    }

    #[test]
    fn test_poc_is_heaviest_region() {
        let series = bars(&[
            (100.0, 102.0, 10_000.0),
            (120.0, 122.0, 100.0),
        ]);
        let hist = build_histogram(&series, 20).unwrap();
        let profile = summarize(&hist, ProfileMode::Fixed);
        let poc = profile.poc.unwrap();
        assert!((100.0..=102.5).contains(&poc));
    }

    #[test]
    fn test_directional_split() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let series: Series = vec![
            Bar::new(start, 100.0, 105.0, 99.0, 104.0, 1000.0), // up bar
            Bar::new(start + Duration::days(1), 104.0, 105.0, 100.0, 101.0, 400.0), // down bar
        ];
        let hist = build_histogram(&series, 10).unwrap();
        assert_eq!(hist.up_volume, 1000.0);
        assert_eq!(hist.down_volume, 400.0);
    }

    #[test]
    fn test_acceptance_states() {
        assert_eq!(
            acceptance_vs_value(106.0, 105.0, 95.0, Some(105.5)),
            ValueAcceptance::AcceptedAboveVah
        );
        assert_eq!(
            acceptance_vs_value(106.0, 105.0, 95.0, Some(100.0)),
            ValueAcceptance::ProbeAboveVah
        );
        assert_eq!(
            acceptance_vs_value(94.0, 105.0, 95.0, Some(94.5)),
            ValueAcceptance::AcceptedBelowVal
        );
        assert_eq!(
            acceptance_vs_value(100.0, 105.0, 95.0, Some(100.0)),
            ValueAcceptance::InsideValue
        );
    }

    #[test]
    fn test_prior_session_pocs_excludes_latest() {
        let mut series = Vec::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        for day in 0..3 {
            for i in 0..4 {
                let t = start + Duration::days(day) + Duration::minutes(5 * i);
                let price = 100.0 + day as f64 * 10.0;
                series.push(Bar::new(t, price, price + 1.0, price - 1.0, price, 100.0));
            }
        }
        let pocs = prior_session_pocs(&EnrichedIntraday::new(series));
        assert_eq!(pocs.len(), 2);
        assert_eq!(pocs[0].session, "2024-01-01");
        assert_eq!(pocs[1].session, "2024-01-02");
        // Latest session's ~120 price never appears.
        assert!(pocs.iter().all(|p| p.poc < 115.0));
    }

    #[test]
    fn test_infer_state_transitions() {
        assert_eq!(
            infer_state(100.0, 95.0, 105.0, Some(99.0)),
            (MarketState::Balance, StateReason::InsideValueArea)
        );
        assert_eq!(
            infer_state(106.0, 95.0, 105.0, None),
            (MarketState::Imbalance, StateReason::OutsideValueAreaUnconfirmed)
        );
        assert_eq!(
            infer_state(106.0, 95.0, 105.0, Some(105.5)),
            (MarketState::Imbalance, StateReason::AcceptedAboveValue)
        );
        assert_eq!(
            infer_state(94.0, 95.0, 105.0, Some(94.5)),
            (MarketState::Imbalance, StateReason::AcceptedBelowValue)
        );
        assert_eq!(
            infer_state(106.0, 95.0, 105.0, Some(100.0)),
            (MarketState::Balance, StateReason::FailedAcceptanceBackInside)
        );
    }

    #[test]
    fn test_degenerate_range_is_empty_profile() {
        let series = bars(&[(100.0, 100.0, 1000.0)]);
        assert!(build_histogram(&series, 30).is_none());
    }
}
