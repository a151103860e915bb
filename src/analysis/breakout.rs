//! Breakout detection against clustered levels, with volume-backed
//! quality grading and a base-structure gate.
//!
//! The second-to-last bar is the trigger, the last bar the follow.
//! A valid breakout needs the trigger close beyond the nearest level,
//! the follow close holding it, and trigger volume at least 1.2x its
//! 20-bar average.

use crate::analysis::enrich::EnrichedDaily;
use crate::constants::{BASE_MAX_DEPTH, BASE_MIN_WEEKS, BASE_WINDOW, BREAKOUT_VOL_RATIO};
use crate::models::{
    BaseQuality, BaseStatus, BreakoutSnapshot, BreakoutStatus, EventSide, LevelZone,
    PriceVolumeClass,
};

pub fn classify_price_volume(change_pct: f64, vol_ratio: f64) -> PriceVolumeClass {
    if change_pct > 0.0 && vol_ratio >= 1.2 {
        PriceVolumeClass::StrongUp
    } else if change_pct < 0.0 && vol_ratio <= 0.8 {
        PriceVolumeClass::HealthyPullback
    } else if change_pct > 0.0 && vol_ratio <= 0.8 {
        PriceVolumeClass::WeakRally
    } else if change_pct < 0.0 && vol_ratio >= 1.2 {
        PriceVolumeClass::Distribution
    } else {
        PriceVolumeClass::Neutral
    }
}

/// Weeks-of-base and depth over the recent window: too short or too deep
/// downgrades the base to weak.
pub fn base_quality(daily: &EnrichedDaily) -> Option<BaseQuality> {
    if daily.bars.is_empty() {
        return None;
    }
    let start = daily.bars.len().saturating_sub(BASE_WINDOW);
    let window = &daily.bars[start..];
    let weeks = window.len() as f64 / 5.0;
    let hi = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let lo = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let depth = if hi > 0.0 { (hi - lo) / hi } else { 0.0 };
    let too_short = weeks < BASE_MIN_WEEKS;
    let too_deep = depth > BASE_MAX_DEPTH;
    Some(BaseQuality {
        weeks,
        depth,
        too_short,
        too_deep,
        status: if too_short || too_deep {
            BaseStatus::Weak
        } else {
            BaseStatus::Ok
        },
    })
}

/// Grade a break of `level`: trigger, follow-through, and volume must
/// all line up for `valid_breakout`; trigger without follow-through is
/// `failed_breakout`.
fn breakout_quality(daily: &EnrichedDaily, level: f64, side: EventSide) -> BreakoutStatus {
    let n = daily.bars.len();
    let (trig, foll) = (n - 2, n - 1);
    let trig_close = daily.bars[trig].close;
    let foll_close = daily.bars[foll].close;
    let (triggered, followed) = match side {
        EventSide::Up => (trig_close > level, foll_close >= level),
        EventSide::Down => (trig_close < level, foll_close <= level),
    };
    let vol_ok = daily.vol_ratio[trig].is_some_and(|r| r >= BREAKOUT_VOL_RATIO);
    if triggered && followed && vol_ok {
        BreakoutStatus::ValidBreakout
    } else if triggered && !followed {
        BreakoutStatus::FailedBreakout
    } else {
        BreakoutStatus::NoBreakout
    }
}

pub fn breakout_snapshot(daily: &EnrichedDaily, levels: &[LevelZone]) -> BreakoutSnapshot {
    let n = daily.bars.len();
    if n < 2 {
        return BreakoutSnapshot {
            status: BreakoutStatus::InsufficientData,
            side: None,
            up_level: None,
            down_level: None,
            trigger_datetime: None,
            trigger_close: None,
            follow_datetime: None,
            follow_close: None,
            trigger_vol_ratio: None,
            price_volume_class: None,
            base_quality: None,
        };
    }
    // Candidate levels are picked relative to the close preceding the
    // trigger bar, so a break that held through the follow bar still
    // registers against the level it crossed.
    let ref_close = if n >= 3 {
        daily.bars[n - 3].close
    } else {
        daily.bars[n - 2].open
    };
    let mids: Vec<f64> = levels.iter().map(|z| z.zone_mid).collect();
    let up_level = mids
        .iter()
        .copied()
        .filter(|&m| m > ref_close)
        .min_by(f64::total_cmp);
    let down_level = mids
        .iter()
        .copied()
        .filter(|&m| m < ref_close)
        .max_by(f64::total_cmp);

    let (trig, foll) = (n - 2, n - 1);
    let trig_close = daily.bars[trig].close;

    let (side, level) = if up_level.is_some_and(|lvl| trig_close > lvl) {
        (Some(EventSide::Up), up_level)
    } else if down_level.is_some_and(|lvl| trig_close < lvl) {
        (Some(EventSide::Down), down_level)
    } else {
        (None, None)
    };

    let status = match (side, level) {
        (Some(s), Some(lvl)) => breakout_quality(daily, lvl, s),
        _ => BreakoutStatus::NoBreakout,
    };

    let change_pct = daily.ret[foll].unwrap_or(0.0);
    let vol_ratio = daily.vol_ratio[foll].unwrap_or(1.0);

    BreakoutSnapshot {
        status,
        side,
        up_level,
        down_level,
        trigger_datetime: Some(daily.bars[trig].datetime),
        trigger_close: Some(trig_close),
        follow_datetime: Some(daily.bars[foll].datetime),
        follow_close: Some(daily.bars[foll].close),
        trigger_vol_ratio: daily.vol_ratio[trig],
        price_volume_class: Some(classify_price_volume(change_pct, vol_ratio)),
        base_quality: base_quality(daily),
    }
}
