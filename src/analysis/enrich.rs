//! Feature enrichment over the cleaned series.
//!
//! Daily bars carry the MA stack (EMA21, SMA50/100/200), ATR14, RSI14
//! and volume features; intraday bars carry EMA9/EMA20 and per-session
//! VWAP. Indicators are aligned index-for-index with the bars; values
//! inside the warmup window are `None`.

use chrono::NaiveDate;

use crate::analysis::swings;
use crate::models::Series;

#[derive(Debug, Clone)]
pub struct EnrichedDaily {
    pub bars: Series,
    pub ema21: Vec<f64>,
    pub sma50: Vec<Option<f64>>,
    pub sma100: Vec<Option<f64>>,
    pub sma200: Vec<Option<f64>>,
    pub atr14: Vec<Option<f64>>,
    pub rsi14: Vec<Option<f64>>,
    pub vol_ma20: Vec<Option<f64>>,
    pub vol_ratio: Vec<Option<f64>>,
    pub ret: Vec<Option<f64>>,
    /// Price at bars confirmed as fractal swing highs/lows, else `None`.
    pub swing_high: Vec<Option<f64>>,
    pub swing_low: Vec<Option<f64>>,
}

impl EnrichedDaily {
    pub fn new(bars: Series, swing_n: usize) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

        let vol_ma20 = rolling_mean(&volumes, 20);
        let vol_ratio = volumes
            .iter()
            .zip(&vol_ma20)
            .map(|(v, ma)| match ma {
                Some(ma) if *ma > 0.0 => Some(v / ma),
                _ => None,
            })
            .collect();
        let ret = pct_change(&closes);
        let (swing_high, swing_low) = swings::swing_flags(&bars, swing_n);

        EnrichedDaily {
            ema21: ema(&closes, 21),
            sma50: rolling_mean(&closes, 50),
            sma100: rolling_mean(&closes, 100),
            sma200: rolling_mean(&closes, 200),
            atr14: atr(&bars, 14),
            rsi14: rsi(&closes, 14),
            vol_ma20,
            vol_ratio,
            ret,
            swing_high,
            swing_low,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_close(&self) -> f64 {
        self.bars[self.bars.len() - 1].close
    }

    pub fn prev_close(&self) -> Option<f64> {
        let n = self.bars.len();
        (n >= 2).then(|| self.bars[n - 2].close)
    }

    /// Bar indices carrying a confirmed swing high, in time order.
    pub fn swing_high_indices(&self) -> Vec<usize> {
        self.swing_high
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|_| i))
            .collect()
    }

    pub fn swing_low_indices(&self) -> Vec<usize> {
        self.swing_low
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|_| i))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct EnrichedIntraday {
    pub bars: Series,
    pub ema9: Vec<f64>,
    pub ema20: Vec<f64>,
    pub vwap: Vec<Option<f64>>,
    /// Session key per bar (calendar date of the timestamp).
    pub sessions: Vec<NaiveDate>,
}

impl EnrichedIntraday {
    pub fn new(bars: Series) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let sessions: Vec<NaiveDate> = bars.iter().map(|b| b.datetime.date_naive()).collect();

        // Session-cumulative VWAP from typical price.
        let mut vwap = Vec::with_capacity(bars.len());
        let mut cum_pv = 0.0;
        let mut cum_vol = 0.0;
        let mut current_session: Option<NaiveDate> = None;
        for (bar, session) in bars.iter().zip(&sessions) {
            if current_session != Some(*session) {
                current_session = Some(*session);
                cum_pv = 0.0;
                cum_vol = 0.0;
            }
            let typical = (bar.high + bar.low + bar.close) / 3.0;
            cum_pv += typical * bar.volume;
            cum_vol += bar.volume;
            vwap.push((cum_vol > 0.0).then(|| cum_pv / cum_vol));
        }

        EnrichedIntraday {
            ema9: ema(&closes, 9),
            ema20: ema(&closes, 20),
            vwap,
            sessions,
            bars,
        }
    }
}

/// Exponential moving average, seeded at the first value (`adjust=false`
/// semantics): defined for every index.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = values[0];
    out.push(prev);
    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

/// Simple rolling mean: `None` until `period` values are available.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

/// Average true range over a rolling window of true ranges. The first
/// bar's true range is its own high-low span.
pub fn atr(bars: &Series, period: usize) -> Vec<Option<f64>> {
    let tr: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, b)| {
            if i == 0 {
                b.high - b.low
            } else {
                let prev_close = bars[i - 1].close;
                (b.high - b.low)
                    .max((b.high - prev_close).abs())
                    .max((b.low - prev_close).abs())
            }
        })
        .collect();
    rolling_mean(&tr, period)
}

/// Wilder RSI: exponentially smoothed gains/losses with `alpha = 1/period`,
/// undefined until `period` deltas have been seen or while average loss
/// is zero.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if closes.len() <= period {
        return out;
    }
    let alpha = 1.0 / period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        if i == 1 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        }
        if i >= period && avg_loss > 0.0 {
            let rs = avg_gain / avg_loss;
            out[i] = Some(100.0 - 100.0 / (1.0 + rs));
        }
    }
    out
}

fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for i in 1..values.len() {
        if values[i - 1] != 0.0 {
            out[i] = Some((values[i] - values[i - 1]) / values[i - 1]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bar;
    use chrono::{Duration, TimeZone, Utc};

    fn daily_bars(closes: &[f64]) -> Series {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Bar::new(start + Duration::days(i as i64), c, c + 1.0, c - 1.0, c, 1000.0)
            })
            .collect()
    }

    #[test]
    fn test_rolling_mean_warmup() {
        let ma = rolling_mean(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0], 3);
        assert_eq!(ma[0], None);
        assert_eq!(ma[1], None);
        assert_eq!(ma[2], Some(11.0));
        assert_eq!(ma[5], Some(14.0));
    }

    #[test]
    fn test_ema_seeds_at_first_value() {
        let e = ema(&[10.0, 10.0, 10.0], 9);
        assert_eq!(e, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_rsi_warmup_and_direction() {
        // Strictly rising closes: every delta is a gain, so avg_loss stays
        // zero and RSI stays undefined.
        let rising: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert!(rsi(&rising, 14).iter().all(Option::is_none));

        // Mixed series: defined after warmup, bounded in (0, 100).
        let mixed: Vec<f64> = (0..40)
            .map(|i| 100.0 + (i as f64) + if i % 3 == 0 { -2.0 } else { 1.0 })
            .collect();
        let r = rsi(&mixed, 14);
        assert!(r[..14].iter().all(Option::is_none));
        let last = r.last().unwrap().unwrap();
        assert!(last > 0.0 && last < 100.0);
    }

    #[test]
    fn test_atr_uses_gaps() {
        let mut bars = daily_bars(&[100.0; 20]);
        // Gap the last bar far above the prior close.
        let n = bars.len();
        bars[n - 1].high = 120.0;
        bars[n - 1].low = 118.0;
        bars[n - 1].close = 119.0;
        let a = atr(&bars, 14);
        // True range for the gap bar is high - prev_close = 20.
        assert!(a[n - 1].unwrap() > 2.0);
    }

    #[test]
    fn test_intraday_vwap_resets_per_session() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut bars = Vec::new();
        for day in 0..2 {
            for i in 0..3 {
                let t = start + Duration::days(day) + Duration::minutes(i * 5);
                let price = 100.0 + day as f64 * 50.0;
                bars.push(Bar::new(t, price, price, price, price, 100.0));
            }
        }
        let enriched = EnrichedIntraday::new(bars);
        // Flat prices: VWAP equals the session price, not a blend of days.
        assert_eq!(enriched.vwap[2], Some(100.0));
        assert_eq!(enriched.vwap[5], Some(150.0));
    }
}
