//! Trend/range/reversal regime classification from recent swings.

use crate::analysis::enrich::EnrichedDaily;
use crate::analysis::structure::{self, IndexedEvent};
use crate::models::{
    Regime, RegimeKind, RegimeProof, StructureStatus, SwingRef, TrendBias,
};

/// Classify from the last four swing highs/lows: HH&HL is a bullish
/// trend, LH&LL a bearish one. A CHOCH without its confirming BOS turns
/// an otherwise directionless read into `potential_reversal`. Fewer than
/// two swings per side degrades to `no_trade`.
pub fn classify_regime(daily: &EnrichedDaily, events: &[IndexedEvent]) -> (Regime, StructureStatus) {
    let high_idx = daily.swing_high_indices();
    let low_idx = daily.swing_low_indices();

    if high_idx.len() < 2 || low_idx.len() < 2 {
        let regime = Regime {
            regime: RegimeKind::NoTrade,
            trend_bias: TrendBias::Neutral,
            proof: RegimeProof::Insufficient { reason: "insufficient_swings".to_string() },
        };
        let status = structure::structure_status(TrendBias::Neutral, events);
        return (regime, status);
    }

    let h_last = daily.swing_high[high_idx[high_idx.len() - 1]].unwrap();
    let h_prev = daily.swing_high[high_idx[high_idx.len() - 2]].unwrap();
    let l_last = daily.swing_low[low_idx[low_idx.len() - 1]].unwrap();
    let l_prev = daily.swing_low[low_idx[low_idx.len() - 2]].unwrap();

    let hh = h_last > h_prev;
    let hl = l_last > l_prev;
    let lh = h_last < h_prev;
    let ll = l_last < l_prev;

    let swing_bias = if hh && hl {
        TrendBias::Bullish
    } else if lh && ll {
        TrendBias::Bearish
    } else {
        TrendBias::Neutral
    };
    let status = structure::structure_status(swing_bias, events);

    let (regime_kind, trend_bias) = if hh && hl {
        (RegimeKind::TrendContinuation, TrendBias::Bullish)
    } else if lh && ll {
        (RegimeKind::TrendContinuation, TrendBias::Bearish)
    } else if status == StructureStatus::ChochOnly {
        (RegimeKind::PotentialReversal, TrendBias::Neutral)
    } else {
        (RegimeKind::RangeRotation, TrendBias::Neutral)
    };

    let last_high_bar = &daily.bars[high_idx[high_idx.len() - 1]];
    let last_low_bar = &daily.bars[low_idx[low_idx.len() - 1]];
    let regime = Regime {
        regime: regime_kind,
        trend_bias,
        proof: RegimeProof::Swings {
            last_swing_high: SwingRef { datetime: last_high_bar.datetime, value: h_last },
            last_swing_low: SwingRef { datetime: last_low_bar.datetime, value: l_last },
        },
    };
    (regime, status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bar, Series};
    use chrono::{Duration, TimeZone, Utc};

    fn series_from_hl(hl: &[(f64, f64)]) -> Series {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        hl.iter()
            .enumerate()
            .map(|(i, &(high, low))| {
                let mid = (high + low) / 2.0;
                Bar::new(start + Duration::days(i as i64), mid, high, low, mid, 1000.0)
            })
            .collect()
    }

    /// Zig-zag with ascending peaks and troughs: two swing highs, two
    /// swing lows, each higher than the one before.
    fn ascending_zigzag() -> Series {
        series_from_hl(&[
            (10.0, 9.0),
            (11.0, 10.0),
            (14.0, 13.0), // swing high 14
            (11.5, 10.5),
            (10.8, 9.8), // swing low 9.8
            (12.0, 11.0),
            (16.0, 15.0), // swing high 16
            (13.0, 12.0),
            (12.0, 11.0), // swing low 11
            (13.5, 12.5),
            (14.5, 13.5),
        ])
    }

    #[test]
    fn test_hh_hl_is_bullish_trend() {
        let daily = EnrichedDaily::new(ascending_zigzag(), 2);
        let (regime, _) = classify_regime(&daily, &[]);
        assert_eq!(regime.regime, RegimeKind::TrendContinuation);
        assert_eq!(regime.trend_bias, TrendBias::Bullish);
        match regime.proof {
            RegimeProof::Swings { last_swing_high, last_swing_low } => {
                assert_eq!(last_swing_high.value, 16.0);
                assert_eq!(last_swing_low.value, 11.0);
            }
            _ => panic!("expected swing proof"),
        }
    }

    #[test]
    fn test_lh_ll_is_bearish_trend() {
        let mut hl: Vec<(f64, f64)> = ascending_zigzag()
            .iter()
            .map(|b| (b.high, b.low))
            .collect();
        hl.reverse();
        let daily = EnrichedDaily::new(series_from_hl(&hl), 2);
        let (regime, _) = classify_regime(&daily, &[]);
        assert_eq!(regime.regime, RegimeKind::TrendContinuation);
        assert_eq!(regime.trend_bias, TrendBias::Bearish);
    }

    #[test]
    fn test_insufficient_swings_is_no_trade() {
        let daily = EnrichedDaily::new(
            series_from_hl(&[(10.0, 9.0), (10.1, 9.1), (10.0, 9.0)]),
            2,
        );
        let (regime, _) = classify_regime(&daily, &[]);
        assert_eq!(regime.regime, RegimeKind::NoTrade);
        assert_eq!(regime.trend_bias, TrendBias::Neutral);
        assert_eq!(
            regime.proof,
            RegimeProof::Insufficient { reason: "insufficient_swings".to_string() }
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let daily = EnrichedDaily::new(ascending_zigzag(), 2);
        let a = classify_regime(&daily, &[]);
        let b = classify_regime(&daily, &[]);
        assert_eq!(a, b);
    }
}
