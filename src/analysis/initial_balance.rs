//! Initial-balance state machines.
//!
//! The seed range is the high/low of the first bars of a session (or
//! calendar period); the remaining bars are walked pairwise, comparing
//! consecutive closes against the range bounds. The last transition
//! observed wins.

use chrono::Datelike;

use crate::analysis::enrich::{EnrichedDaily, EnrichedIntraday};
use crate::constants::IB_SEED_BARS;
use crate::models::{Bar, IbState, PeriodIb, SessionIb};

/// Pairwise close transition against a seeded range.
fn transition(c0: f64, c1: f64, ibh: f64, ibl: f64) -> Option<IbState> {
    if c0 > ibh && c1 >= ibh {
        Some(IbState::AcceptedAboveIbh)
    } else if c0 < ibl && c1 <= ibl {
        Some(IbState::AcceptedBelowIbl)
    } else if c0 > ibh && c1 < ibh {
        Some(IbState::FailedBreakAboveIbh)
    } else if c0 < ibl && c1 > ibl {
        Some(IbState::FailedBreakBelowIbl)
    } else {
        None
    }
}

/// IB state for the latest intraday session. Needs at least three bars
/// in the session; degrades to `insufficient_session_bars` otherwise.
pub fn latest_session_ib(intraday: &EnrichedIntraday) -> SessionIb {
    let latest = match intraday.sessions.last() {
        Some(s) => *s,
        None => {
            return SessionIb {
                session: None,
                ibh: None,
                ibl: None,
                state: IbState::InsufficientSessionBars,
            }
        }
    };
    let session_bars: Vec<&Bar> = intraday
        .bars
        .iter()
        .zip(&intraday.sessions)
        .filter(|(_, s)| **s == latest)
        .map(|(b, _)| b)
        .collect();

    if session_bars.len() < 3 {
        return SessionIb {
            session: None,
            ibh: None,
            ibl: None,
            state: IbState::InsufficientSessionBars,
        };
    }

    let seed = &session_bars[..IB_SEED_BARS];
    let ibh = seed.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let ibl = seed.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

    let mut state = IbState::InsideIbRange;
    for pair in session_bars[IB_SEED_BARS..].windows(2) {
        if let Some(next) = transition(pair[0].close, pair[1].close, ibh, ibl) {
            state = next;
        }
    }

    SessionIb {
        session: Some(latest.format("%Y-%m-%d").to_string()),
        ibh: Some(ibh),
        ibl: Some(ibl),
        state,
    }
}

/// IB state for the latest calendar-month period over the daily series:
/// the month's first bars seed the range, the last two closes decide the
/// state.
pub fn latest_period_ib(daily: &EnrichedDaily) -> PeriodIb {
    let insufficient = PeriodIb {
        period: None,
        first_n_bars: IB_SEED_BARS,
        ibh: None,
        ibl: None,
        state: IbState::InsufficientPeriodBars,
    };

    let last_bar = match daily.bars.last() {
        Some(b) => b,
        None => return insufficient,
    };
    let key = (last_bar.datetime.year(), last_bar.datetime.month());
    let month_bars: Vec<&Bar> = daily
        .bars
        .iter()
        .filter(|b| (b.datetime.year(), b.datetime.month()) == key)
        .collect();
    if month_bars.len() < IB_SEED_BARS || daily.bars.len() < 2 {
        return insufficient;
    }

    let seed = &month_bars[..IB_SEED_BARS];
    let ibh = seed.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let ibl = seed.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

    let c0 = daily.bars[daily.bars.len() - 2].close;
    let c1 = daily.bars[daily.bars.len() - 1].close;
    let state = transition(c0, c1, ibh, ibl).unwrap_or(IbState::InsideIbRange);

    PeriodIb {
        period: Some(format!("{:04}-{:02}", key.0, key.1)),
        first_n_bars: IB_SEED_BARS,
        ibh: Some(ibh),
        ibl: Some(ibl),
        state,
    }
}
