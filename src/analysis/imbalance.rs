//! Opening-gap, volume-imbalance, FVG, and inverted-FVG zones.
//!
//! Pairwise scans over consecutive daily bars find full gaps and
//! partial-overlap displacement; a 3-bar window finds fair value gaps.
//! An FVG the closes have traded back through flips into an IFVG with
//! the opposite directional label. Every emitted zone carries a
//! mitigation state versus the latest bar's range.

use crate::constants::{MAX_FVG_ZONES, MAX_IFVG_ZONES, MAX_IMBALANCE_ZONES};
use crate::models::{
    Bar, Direction, ImbalanceKind, ImbalanceSection, ImbalanceZone, MitigationState, Series,
};

fn fvg_bounds(c1: &Bar, c3: &Bar, direction: Direction) -> Option<(f64, f64)> {
    let (low, high) = match direction {
        Direction::Bullish => (c1.high, c3.low),
        Direction::Bearish => (c3.high, c1.low),
    };
    if high > low {
        Some((low, high))
    } else {
        None
    }
}

fn zone(
    kind: ImbalanceKind,
    direction: Direction,
    low: f64,
    high: f64,
    start: &Bar,
    end: &Bar,
) -> ImbalanceZone {
    ImbalanceZone {
        kind,
        direction,
        low,
        high,
        ce: (low + high) / 2.0,
        start: start.datetime,
        end: end.datetime,
        mitigation_state: None,
        source_direction: None,
    }
}

/// Mixed scan: opening gaps and volume imbalances per bar pair, FVGs per
/// 3-bar window, in time order, capped to the most recent zones.
pub fn detect_imbalance_zones(bars: &Series) -> Vec<ImbalanceZone> {
    let mut out: Vec<ImbalanceZone> = Vec::new();
    for i in 1..bars.len() {
        let c2 = &bars[i - 1];
        let c3 = &bars[i];

        // Opening gap: no overlap at all between consecutive bars.
        if c3.low > c2.high {
            out.push(zone(
                ImbalanceKind::OpeningGap,
                Direction::Bullish,
                c2.high,
                c3.low,
                c2,
                c3,
            ));
        } else if c3.high < c2.low {
            out.push(zone(
                ImbalanceKind::OpeningGap,
                Direction::Bearish,
                c3.high,
                c2.low,
                c2,
                c3,
            ));
        }

        // Volume imbalance: close displaces beyond the prior bar's range
        // while the open stays inside it.
        if c3.close > c2.high && c3.open < c2.high {
            let low = c3.open.min(c2.high).max(c3.low.min(c2.low));
            let high = c2.high;
            if high > low {
                out.push(zone(
                    ImbalanceKind::VolumeImbalance,
                    Direction::Bullish,
                    low,
                    high,
                    c2,
                    c3,
                ));
            }
        } else if c3.close < c2.low && c3.open > c2.low {
            let low = c2.low;
            let high = c3.open.max(c2.low).min(c3.high.max(c2.high));
            if high > low {
                out.push(zone(
                    ImbalanceKind::VolumeImbalance,
                    Direction::Bearish,
                    low,
                    high,
                    c2,
                    c3,
                ));
            }
        }

        if i >= 2 {
            let c1 = &bars[i - 2];
            if let Some((low, high)) = fvg_bounds(c1, c3, Direction::Bullish) {
                out.push(zone(ImbalanceKind::Fvg, Direction::Bullish, low, high, c1, c3));
            } else if let Some((low, high)) = fvg_bounds(c1, c3, Direction::Bearish) {
                out.push(zone(ImbalanceKind::Fvg, Direction::Bearish, low, high, c1, c3));
            }
        }
    }
    if out.len() > MAX_IMBALANCE_ZONES {
        out.drain(..out.len() - MAX_IMBALANCE_ZONES);
    }
    out
}

/// FVG-only scan per 3-bar window. A window yields at most one gap, the
/// bullish reading taking precedence.
pub fn detect_fvg(bars: &Series) -> Vec<ImbalanceZone> {
    let mut out: Vec<ImbalanceZone> = Vec::new();
    for i in 2..bars.len() {
        let c1 = &bars[i - 2];
        let c3 = &bars[i];
        if let Some((low, high)) = fvg_bounds(c1, c3, Direction::Bullish) {
            out.push(zone(ImbalanceKind::Fvg, Direction::Bullish, low, high, c1, c3));
        } else if let Some((low, high)) = fvg_bounds(c1, c3, Direction::Bearish) {
            out.push(zone(ImbalanceKind::Fvg, Direction::Bearish, low, high, c1, c3));
        }
    }
    if out.len() > MAX_FVG_ZONES {
        out.drain(..out.len() - MAX_FVG_ZONES);
    }
    out
}

/// FVGs the last two closes have settled beyond become inverted zones
/// with the flipped direction. Requires a previous close; the first bar
/// of a series can never invert anything.
pub fn infer_ifvg_zones(
    fvg_zones: &[ImbalanceZone],
    close: f64,
    prev_close: Option<f64>,
) -> Vec<ImbalanceZone> {
    let prev = match prev_close {
        Some(p) => p,
        None => return Vec::new(),
    };
    let mut out: Vec<ImbalanceZone> = Vec::new();
    for z in fvg_zones {
        if z.kind != ImbalanceKind::Fvg {
            continue;
        }
        let inverted = match z.direction {
            Direction::Bullish => close < z.low && prev <= z.low,
            Direction::Bearish => close > z.high && prev >= z.high,
        };
        if inverted {
            let mut flipped = z.clone();
            flipped.kind = ImbalanceKind::Ifvg;
            flipped.source_direction = Some(z.direction);
            flipped.direction = z.direction.flipped();
            out.push(flipped);
        }
    }
    if out.len() > MAX_IFVG_ZONES {
        out.drain(..out.len() - MAX_IFVG_ZONES);
    }
    out
}

/// Zone range versus a bar range: untouched, fully engulfed, or partial.
pub fn mitigation_state(
    zone_low: f64,
    zone_high: f64,
    price_low: f64,
    price_high: f64,
) -> MitigationState {
    let touched = price_high >= zone_low && price_low <= zone_high;
    if !touched {
        return MitigationState::Unmitigated;
    }
    if price_low <= zone_low && price_high >= zone_high {
        MitigationState::FullyMitigated
    } else {
        MitigationState::PartiallyMitigated
    }
}

fn with_mitigation(mut zones: Vec<ImbalanceZone>, last: &Bar) -> Vec<ImbalanceZone> {
    for z in &mut zones {
        z.mitigation_state = Some(mitigation_state(z.low, z.high, last.low, last.high));
    }
    zones
}

/// Full imbalance section for the daily series.
pub fn build_section(bars: &Series) -> ImbalanceSection {
    let last = match bars.last() {
        Some(b) => b,
        None => {
            return ImbalanceSection {
                zones: Vec::new(),
                fvg_zones: Vec::new(),
                ifvg_zones: Vec::new(),
            }
        }
    };
    let prev_close = (bars.len() >= 2).then(|| bars[bars.len() - 2].close);

    let zones = with_mitigation(detect_imbalance_zones(bars), last);
    let fvg_zones = with_mitigation(detect_fvg(bars), last);
    let ifvg_zones = with_mitigation(
        infer_ifvg_zones(&fvg_zones, last.close, prev_close),
        last,
    );
    ImbalanceSection { zones, fvg_zones, ifvg_zones }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(day: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Bar::new(start + Duration::days(day), open, high, low, close, 1000.0)
    }

    #[test]
    fn test_bullish_fvg_bounds() {
        // bar1.high < bar3.low leaves an inefficiency between them.
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.5),
            bar(1, 101.0, 104.0, 100.5, 103.5),
            bar(2, 104.0, 106.0, 103.0, 105.0),
        ];
        let zones = detect_fvg(&bars);
        assert_eq!(zones.len(), 1);
        let z = &zones[0];
        assert_eq!(z.kind, ImbalanceKind::Fvg);
        assert_eq!(z.direction, Direction::Bullish);
        assert_eq!(z.low, 101.0);
        assert_eq!(z.high, 103.0);
        assert_eq!(z.ce, 102.0);
        assert_eq!(z.start, bars[0].datetime);
        assert_eq!(z.end, bars[2].datetime);
    }

    #[test]
    fn test_bearish_fvg() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 99.5),
            bar(1, 99.0, 99.5, 95.0, 95.5),
            bar(2, 95.0, 96.0, 94.0, 94.5),
        ];
        let zones = detect_fvg(&bars);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].direction, Direction::Bearish);
        assert_eq!(zones[0].low, 96.0);
        assert_eq!(zones[0].high, 99.0);
    }

    #[test]
    fn test_no_fvg_when_ranges_overlap() {
        let bars = vec![
            bar(0, 100.0, 102.0, 99.0, 101.0),
            bar(1, 101.0, 103.0, 100.0, 102.0),
            bar(2, 102.0, 104.0, 101.0, 103.0),
        ];
        assert!(detect_fvg(&bars).is_empty());
    }

    #[test]
    fn test_opening_gap_detected() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.5),
            bar(1, 103.0, 104.0, 102.0, 103.5),
        ];
        let zones = detect_imbalance_zones(&bars);
        let gap = zones
            .iter()
            .find(|z| z.kind == ImbalanceKind::OpeningGap)
            .unwrap();
        assert_eq!(gap.direction, Direction::Bullish);
        assert_eq!(gap.low, 101.0);
        assert_eq!(gap.high, 102.0);
    }

    #[test]
    fn test_volume_imbalance_detected() {
        // Opens inside the prior bar, closes beyond its high.
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.5),
            bar(1, 100.5, 103.0, 100.0, 102.5),
        ];
        let zones = detect_imbalance_zones(&bars);
        let vi = zones
            .iter()
            .find(|z| z.kind == ImbalanceKind::VolumeImbalance)
            .unwrap();
        assert_eq!(vi.direction, Direction::Bullish);
        assert_eq!(vi.high, 101.0);
        assert_eq!(vi.low, 100.5);
    }

    #[test]
    fn test_ifvg_requires_two_confirming_closes() {
        let fvg = vec![ImbalanceZone {
            kind: ImbalanceKind::Fvg,
            direction: Direction::Bullish,
            low: 101.0,
            high: 103.0,
            ce: 102.0,
            start: bar(0, 0.0, 0.0, 0.0, 0.0).datetime,
            end: bar(2, 0.0, 0.0, 0.0, 0.0).datetime,
            mitigation_state: None,
            source_direction: None,
        }];

        // Only the last close is below the gap: no inversion yet.
        assert!(infer_ifvg_zones(&fvg, 100.0, Some(102.0)).is_empty());
        // Missing previous close: never inverts.
        assert!(infer_ifvg_zones(&fvg, 100.0, None).is_empty());

        let inverted = infer_ifvg_zones(&fvg, 100.0, Some(100.5));
        assert_eq!(inverted.len(), 1);
        assert_eq!(inverted[0].kind, ImbalanceKind::Ifvg);
        assert_eq!(inverted[0].direction, Direction::Bearish);
        assert_eq!(inverted[0].source_direction, Some(Direction::Bullish));
    }

    #[test]
    fn test_mitigation_states() {
        assert_eq!(mitigation_state(101.0, 103.0, 104.0, 105.0), MitigationState::Unmitigated);
        assert_eq!(
            mitigation_state(101.0, 103.0, 100.0, 104.0),
            MitigationState::FullyMitigated
        );
        assert_eq!(
            mitigation_state(101.0, 103.0, 102.0, 104.0),
            MitigationState::PartiallyMitigated
        );
    }

    #[test]
    fn test_zone_caps() {
        // A long run of alternating gap-up bars produces more zones than
        // the caps allow; only the most recent survive.
        let mut bars = Vec::new();
        for i in 0..60 {
            let base = 100.0 + i as f64 * 10.0;
            bars.push(bar(i as i64, base, base + 1.0, base - 1.0, base + 0.5));
        }
        let zones = detect_imbalance_zones(&bars);
        assert!(zones.len() <= MAX_IMBALANCE_ZONES);
        let fvg = detect_fvg(&bars);
        assert!(fvg.len() <= MAX_FVG_ZONES);
        // Most recent zones are kept.
        assert!(fvg.last().unwrap().end == bars.last().unwrap().datetime);
    }
}
