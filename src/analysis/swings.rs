//! Fractal pivot detection and support/resistance level clustering.

use crate::constants::{EPSILON, LEVEL_CLUSTER_TOLERANCE, LEVEL_SOURCE_SWINGS};
use crate::models::{LevelStrength, LevelZone, Series};

/// Symmetric fractal test: bar `i` is a swing high iff its high strictly
/// exceeds the highs of the `n` bars on each side (strict `>`; ties never
/// qualify). Edge bars with fewer than `n` neighbours never qualify.
/// Returns per-index price flags aligned with the series.
pub fn swing_flags(bars: &Series, n: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let len = bars.len();
    let mut highs = vec![None; len];
    let mut lows = vec![None; len];
    if len < 2 * n + 1 {
        return (highs, lows);
    }
    for i in n..len - n {
        let mut is_high = true;
        let mut is_low = true;
        for j in 1..=n {
            if bars[i].high <= bars[i - j].high || bars[i].high <= bars[i + j].high {
                is_high = false;
            }
            if bars[i].low >= bars[i - j].low || bars[i].low >= bars[i + j].low {
                is_low = false;
            }
            if !is_high && !is_low {
                break;
            }
        }
        if is_high {
            highs[i] = Some(bars[i].high);
        }
        if is_low {
            lows[i] = Some(bars[i].low);
        }
    }
    (highs, lows)
}

/// Greedy tolerance clustering over ascending swing prices. A price
/// joins the current cluster while its relative distance to the running
/// cluster mean stays within `tolerance`; otherwise a new cluster opens.
/// Clusters come out in ascending zone_mid order and non-overlapping
/// under the tolerance.
pub fn cluster_levels(levels: &[f64], tolerance: f64) -> Vec<LevelZone> {
    if levels.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<f64> = levels.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut clusters: Vec<Vec<f64>> = Vec::new();
    for &lvl in &sorted {
        match clusters.last_mut() {
            Some(cluster) => {
                let center: f64 = cluster.iter().sum::<f64>() / cluster.len() as f64;
                if (lvl - center).abs() / center.max(EPSILON) <= tolerance {
                    cluster.push(lvl);
                } else {
                    clusters.push(vec![lvl]);
                }
            }
            None => clusters.push(vec![lvl]),
        }
    }

    clusters
        .into_iter()
        .map(|cluster| {
            let touches = cluster.len();
            let zone_mid = cluster.iter().sum::<f64>() / touches as f64;
            let zone_low = cluster.iter().cloned().fold(f64::INFINITY, f64::min);
            let zone_high = cluster.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            LevelZone {
                zone_mid,
                zone_low,
                zone_high,
                touches,
                strength: LevelStrength::from_touches(touches),
            }
        })
        .collect()
}

/// Level zones from the most recent swing highs and lows.
pub fn derive_levels(swing_high: &[Option<f64>], swing_low: &[Option<f64>]) -> Vec<LevelZone> {
    let mut prices: Vec<f64> = swing_high
        .iter()
        .filter_map(|v| *v)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .take(LEVEL_SOURCE_SWINGS)
        .collect();
    let lows: Vec<f64> = swing_low
        .iter()
        .filter_map(|v| *v)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .take(LEVEL_SOURCE_SWINGS)
        .collect();
    prices.extend(lows);
    cluster_levels(&prices, LEVEL_CLUSTER_TOLERANCE)
}
