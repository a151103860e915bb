//! Liquidity draws and sweep resolution.
//!
//! External liquidity sits at level-zone midpoints, internal liquidity
//! at imbalance-zone centers. The nearest pools above and below the
//! last close become draw targets; the most recent structure event is
//! read as a swept swing whose outcome depends on where price settled.

use crate::analysis::structure::IndexedEvent;
use crate::models::{
    DrawTargets, EventSide, ImbalanceZone, LevelZone, Liquidity, LiquidityPath, SweepEvent,
    SweepOutcome,
};

fn nearest_above(levels: &[f64], price: f64) -> Option<f64> {
    levels
        .iter()
        .copied()
        .filter(|&x| x > price)
        .min_by(f64::total_cmp)
}

fn nearest_below(levels: &[f64], price: f64) -> Option<f64> {
    levels
        .iter()
        .copied()
        .filter(|&x| x < price)
        .max_by(f64::total_cmp)
}

/// Nearest external/internal pool on each side of the price.
pub fn pick_draw_targets(
    external_levels: &[f64],
    internal_levels: &[f64],
    price: f64,
) -> DrawTargets {
    DrawTargets {
        external_up: nearest_above(external_levels, price),
        external_down: nearest_below(external_levels, price),
        internal_up: nearest_above(internal_levels, price),
        internal_down: nearest_below(internal_levels, price),
    }
}

/// Did the close confirm beyond the broken level?
pub fn sweep_outcome(close: f64, level: f64, side: EventSide) -> SweepOutcome {
    let accepted = match side {
        EventSide::Up => close > level,
        EventSide::Down => close < level,
    };
    if accepted {
        SweepOutcome::Accepted
    } else {
        SweepOutcome::Rejected
    }
}

/// Full liquidity read from the clustered levels, any imbalance-zone
/// centers, and the compacted event list.
pub fn derive_liquidity(
    last_close: f64,
    levels: &[LevelZone],
    internal_zones: Option<&[ImbalanceZone]>,
    events: &[IndexedEvent],
) -> Liquidity {
    let external: Vec<f64> = levels.iter().map(|z| z.zone_mid).collect();
    let internal: Vec<f64> = internal_zones
        .map(|zs| zs.iter().map(|z| z.ce).collect())
        .unwrap_or_default();

    let draw_targets = pick_draw_targets(&external, &internal, last_close);

    let (sweep_event, sweep_out) = match events.last() {
        Some(last) => (
            SweepEvent::SwingSwept,
            sweep_outcome(last_close, last.event.broken_level, last.event.side),
        ),
        None => (SweepEvent::None, SweepOutcome::Unresolved),
    };
    let liquidity_path = if sweep_event == SweepEvent::SwingSwept {
        LiquidityPath::ExternalToInternal
    } else {
        LiquidityPath::Unclear
    };

    Liquidity {
        current_draw: nearest_above(&external, last_close),
        opposing_draw: nearest_below(&external, last_close),
        internal_up: internal_zones.and_then(|_| nearest_above(&internal, last_close)),
        internal_down: internal_zones.and_then(|_| nearest_below(&internal, last_close)),
        draw_targets,
        sweep_event,
        sweep_outcome: sweep_out,
        liquidity_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventLabel, LevelStrength, StructureEvent};
    use chrono::{TimeZone, Utc};

    fn level(mid: f64) -> LevelZone {
        LevelZone {
            zone_mid: mid,
            zone_low: mid - 0.5,
            zone_high: mid + 0.5,
            touches: 1,
            strength: LevelStrength::StrongFirstTest,
        }
    }

    fn event(side: EventSide, level: f64, close: f64) -> IndexedEvent {
        IndexedEvent {
            event: StructureEvent {
                datetime: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
                side,
                label: EventLabel::Bos,
                broken_level: level,
                close,
                count: 1,
            },
            bar_index: 9,
        }
    }

    #[test]
    fn test_draws_are_nearest_levels() {
        let levels = vec![level(90.0), level(95.0), level(105.0), level(110.0)];
        let liq = derive_liquidity(100.0, &levels, None, &[]);
        assert_eq!(liq.current_draw, Some(105.0));
        assert_eq!(liq.opposing_draw, Some(95.0));
        assert_eq!(liq.internal_up, None);
        assert_eq!(liq.sweep_event, SweepEvent::None);
        assert_eq!(liq.sweep_outcome, SweepOutcome::Unresolved);
        assert_eq!(liq.liquidity_path, LiquidityPath::Unclear);
    }

    #[test]
    fn test_no_levels_above_leaves_draw_empty() {
        let levels = vec![level(90.0)];
        let liq = derive_liquidity(100.0, &levels, None, &[]);
        assert_eq!(liq.current_draw, None);
        assert_eq!(liq.opposing_draw, Some(90.0));
    }

    #[test]
    fn test_sweep_accepted_when_close_confirms() {
        let levels = vec![level(95.0)];
        let ev = vec![event(EventSide::Up, 102.0, 104.0)];
        let liq = derive_liquidity(104.0, &levels, None, &ev);
        assert_eq!(liq.sweep_event, SweepEvent::SwingSwept);
        assert_eq!(liq.sweep_outcome, SweepOutcome::Accepted);
        assert_eq!(liq.liquidity_path, LiquidityPath::ExternalToInternal);
    }

    #[test]
    fn test_sweep_rejected_when_close_back_inside() {
        let levels = vec![level(95.0)];
        let ev = vec![event(EventSide::Up, 102.0, 104.0)];
        let liq = derive_liquidity(101.0, &levels, None, &ev);
        assert_eq!(liq.sweep_outcome, SweepOutcome::Rejected);
    }

    #[test]
    fn test_downside_sweep_outcome() {
        assert_eq!(sweep_outcome(93.0, 95.0, EventSide::Down), SweepOutcome::Accepted);
        assert_eq!(sweep_outcome(96.0, 95.0, EventSide::Down), SweepOutcome::Rejected);
    }

    #[test]
    fn test_internal_targets_from_zone_centers() {
        use crate::models::{Direction, ImbalanceKind};
        let levels = vec![level(90.0), level(110.0)];
        let zone = ImbalanceZone {
            kind: ImbalanceKind::Fvg,
            direction: Direction::Bullish,
            low: 101.0,
            high: 103.0,
            ce: 102.0,
            start: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap(),
            mitigation_state: None,
            source_direction: None,
        };
        let liq = derive_liquidity(100.0, &levels, Some(std::slice::from_ref(&zone)), &[]);
        assert_eq!(liq.internal_up, Some(102.0));
        assert_eq!(liq.internal_down, None);
        assert_eq!(liq.draw_targets.internal_up, Some(102.0));
        assert_eq!(liq.draw_targets.external_up, Some(110.0));
    }
}
