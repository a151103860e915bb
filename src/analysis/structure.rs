//! Break-of-structure scan with event compaction.
//!
//! A single forward pass tracks the most recent confirmed swing high and
//! low. A close beyond the tracked extreme emits an event: BOS when it
//! continues the prevailing break direction, CHOCH when it reverses it.
//! Exact repeats are dropped, then bursts of near-identical events are
//! merged into one with an occurrence count.

use crate::analysis::enrich::EnrichedDaily;
use crate::constants::{
    COMPACTION_LEVEL_TOLERANCE, COMPACTION_MAX_GAP_DAYS, EPSILON, MAX_STRUCTURE_EVENTS,
    STRUCTURE_STATUS_WINDOW,
};
use crate::models::{EventLabel, EventSide, StructureEvent, StructureStatus, TrendBias};

/// A structure event plus the index of the bar that (last) produced it.
/// The bar index survives compaction so pattern detectors can look back
/// from the break bar.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEvent {
    pub event: StructureEvent,
    pub bar_index: usize,
}

pub fn detect_structure_events(daily: &EnrichedDaily) -> Vec<IndexedEvent> {
    let mut events: Vec<IndexedEvent> = Vec::new();
    let mut last_high: Option<f64> = None;
    let mut last_low: Option<f64> = None;
    let mut last_side: Option<EventSide> = None;

    for (i, bar) in daily.bars.iter().enumerate() {
        if let Some(price) = daily.swing_high[i] {
            last_high = Some(price);
        }
        if let Some(price) = daily.swing_low[i] {
            last_low = Some(price);
        }

        if let Some(level) = last_high {
            if bar.close > level {
                let label = if last_side == Some(EventSide::Up) {
                    EventLabel::Bos
                } else {
                    EventLabel::Choch
                };
                events.push(IndexedEvent {
                    event: StructureEvent {
                        datetime: bar.datetime,
                        side: EventSide::Up,
                        label,
                        broken_level: level,
                        close: bar.close,
                        count: 1,
                    },
                    bar_index: i,
                });
                last_side = Some(EventSide::Up);
                continue;
            }
        }
        if let Some(level) = last_low {
            if bar.close < level {
                let label = if last_side == Some(EventSide::Down) {
                    EventLabel::Bos
                } else {
                    EventLabel::Choch
                };
                events.push(IndexedEvent {
                    event: StructureEvent {
                        datetime: bar.datetime,
                        side: EventSide::Down,
                        label,
                        broken_level: level,
                        close: bar.close,
                        count: 1,
                    },
                    bar_index: i,
                });
                last_side = Some(EventSide::Down);
            }
        }
    }

    let deduped = dedup_events(events);
    let mut compacted = compact_events(deduped);
    if compacted.len() > MAX_STRUCTURE_EVENTS {
        compacted.drain(..compacted.len() - MAX_STRUCTURE_EVENTS);
    }
    compacted
}

/// Drop exact repeats: same timestamp, side, and broken level (to 4 dp).
fn dedup_events(events: Vec<IndexedEvent>) -> Vec<IndexedEvent> {
    let mut seen: Vec<(i64, EventSide, i64)> = Vec::new();
    let mut out = Vec::with_capacity(events.len());
    for e in events {
        let key = (
            e.event.datetime.timestamp(),
            e.event.side,
            (e.event.broken_level * 10_000.0).round() as i64,
        );
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(e);
    }
    out
}

/// Merge a run of events into its predecessor when side and label match,
/// broken levels sit within the relative tolerance, and the events are
/// at most a few days apart. The merged event keeps the latest
/// timestamp/level/close and accumulates the occurrence count.
/// Idempotent: compacting an already-compacted list is a no-op.
pub fn compact_events(events: Vec<IndexedEvent>) -> Vec<IndexedEvent> {
    let mut out: Vec<IndexedEvent> = Vec::with_capacity(events.len());
    for cur in events {
        let merged = match out.last_mut() {
            Some(prev) => {
                let gap_days = (cur.event.datetime - prev.event.datetime).num_days();
                let level_delta = (cur.event.broken_level - prev.event.broken_level).abs()
                    / prev.event.broken_level.abs().max(EPSILON);
                if prev.event.side == cur.event.side
                    && prev.event.label == cur.event.label
                    && level_delta <= COMPACTION_LEVEL_TOLERANCE
                    && gap_days <= COMPACTION_MAX_GAP_DAYS
                {
                    prev.event.datetime = cur.event.datetime;
                    prev.event.broken_level = cur.event.broken_level;
                    prev.event.close = cur.event.close;
                    prev.event.count += cur.event.count;
                    prev.bar_index = cur.bar_index;
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if !merged {
            out.push(cur);
        }
    }
    out
}

/// CHOCH/BOS state over the most recent events: `choch_only` is a CHOCH
/// without a confirming BOS inside the window; a neutral prevailing
/// trend never signals.
pub fn structure_status(prev_trend: TrendBias, events: &[IndexedEvent]) -> StructureStatus {
    if prev_trend == TrendBias::Neutral {
        return StructureStatus::NoSignal;
    }
    let window_start = events.len().saturating_sub(STRUCTURE_STATUS_WINDOW);
    let recent = &events[window_start..];
    let choch = recent.iter().any(|e| e.event.label == EventLabel::Choch);
    let bos = recent.iter().any(|e| e.event.label == EventLabel::Bos);
    if choch && bos {
        StructureStatus::ChochPlusBosConfirmed
    } else if choch {
        StructureStatus::ChochOnly
    } else {
        StructureStatus::NoSignal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
    }

    fn indexed(day: i64, side: EventSide, label: EventLabel, level: f64) -> IndexedEvent {
        IndexedEvent {
            event: StructureEvent {
                datetime: ts(day),
                side,
                label,
                broken_level: level,
                close: level + 1.0,
                count: 1,
            },
            bar_index: day as usize,
        }
    }

    #[test]
    fn test_compaction_merges_nearby_same_kind() {
        let events = vec![
            indexed(0, EventSide::Up, EventLabel::Bos, 100.0),
            indexed(2, EventSide::Up, EventLabel::Bos, 100.2),
            indexed(3, EventSide::Up, EventLabel::Bos, 100.3),
        ];
        let out = compact_events(events);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event.count, 3);
        assert_eq!(out[0].event.broken_level, 100.3);
        assert_eq!(out[0].event.datetime, ts(3));
    }

    #[test]
    fn test_compaction_respects_gap_and_tolerance() {
        // 6-day gap: not merged.
        let far = vec![
            indexed(0, EventSide::Up, EventLabel::Bos, 100.0),
            indexed(6, EventSide::Up, EventLabel::Bos, 100.1),
        ];
        assert_eq!(compact_events(far).len(), 2);

        // 1% level delta: not merged.
        let wide = vec![
            indexed(0, EventSide::Up, EventLabel::Bos, 100.0),
            indexed(1, EventSide::Up, EventLabel::Bos, 101.0),
        ];
        assert_eq!(compact_events(wide).len(), 2);

        // Different label: not merged.
        let mixed = vec![
            indexed(0, EventSide::Up, EventLabel::Choch, 100.0),
            indexed(1, EventSide::Up, EventLabel::Bos, 100.1),
        ];
        assert_eq!(compact_events(mixed).len(), 2);
    }

    #[test]
    fn test_compaction_is_idempotent() {
        let events = vec![
            indexed(0, EventSide::Up, EventLabel::Choch, 100.0),
            indexed(1, EventSide::Up, EventLabel::Bos, 100.1),
            indexed(2, EventSide::Up, EventLabel::Bos, 100.2),
            indexed(9, EventSide::Down, EventLabel::Choch, 95.0),
        ];
        let once = compact_events(events);
        let twice = compact_events(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_structure_status_windows() {
        let choch_only = vec![indexed(0, EventSide::Down, EventLabel::Choch, 95.0)];
        assert_eq!(
            structure_status(TrendBias::Bullish, &choch_only),
            StructureStatus::ChochOnly
        );

        let confirmed = vec![
            indexed(0, EventSide::Down, EventLabel::Choch, 95.0),
            indexed(2, EventSide::Down, EventLabel::Bos, 93.0),
        ];
        assert_eq!(
            structure_status(TrendBias::Bullish, &confirmed),
            StructureStatus::ChochPlusBosConfirmed
        );

        assert_eq!(
            structure_status(TrendBias::Neutral, &confirmed),
            StructureStatus::NoSignal
        );

        // CHOCH older than the 4-event window no longer signals.
        let stale = vec![
            indexed(0, EventSide::Down, EventLabel::Choch, 95.0),
            indexed(5, EventSide::Up, EventLabel::Choch, 96.0),
            indexed(11, EventSide::Down, EventLabel::Choch, 95.5),
            indexed(20, EventSide::Up, EventLabel::Bos, 97.0),
            indexed(26, EventSide::Up, EventLabel::Bos, 99.0),
        ];
        // Window = last 4 events; still contains CHOCHs here, so drop to a
        // run of pure BOS to check the negative case.
        let pure_bos = vec![
            indexed(0, EventSide::Up, EventLabel::Bos, 95.0),
            indexed(7, EventSide::Up, EventLabel::Bos, 97.0),
        ];
        assert_eq!(
            structure_status(TrendBias::Bullish, &pure_bos),
            StructureStatus::NoSignal
        );
        assert_eq!(
            structure_status(TrendBias::Bullish, &stale),
            StructureStatus::ChochPlusBosConfirmed
        );
    }
}
