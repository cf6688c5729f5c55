use crate::model::{BridgeRecord, MatchedWay, NearestBridge, WayRecord};
use geo::Point;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use std::collections::HashSet;

/// Length of one degree of latitude, in meters.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Flat-earth distance in meters between a way centroid and a bridge, with
/// longitude scaled at the bridge's latitude. Only meaningful for short
/// distances.
pub fn approx_distance(way: Point, bridge: Point) -> f64 {
    let lon_factor = METERS_PER_DEGREE * bridge.y().to_radians().cos();
    let dist_lat = (way.y() - bridge.y()).abs() * METERS_PER_DEGREE;
    let dist_lon = (way.x() - bridge.x()).abs() * lon_factor;
    dist_lat.hypot(dist_lon)
}

/// Closest bridge to `way`. Equidistant bridges are resolved towards the
/// lowest key so the outcome does not depend on the order of `bridges`.
fn closest<'a>(way: Point, bridges: &'a [BridgeRecord]) -> Option<(&'a BridgeRecord, f64)> {
    bridges.iter().fold(None, |best, bridge| {
        let distance = approx_distance(way, bridge.point());
        if !distance.is_finite() {
            return best;
        }
        match best {
            Some((current, best_distance))
                if distance > best_distance
                    || (distance == best_distance && bridge.key >= current.key) =>
            {
                best
            }
            _ => Some((bridge, distance)),
        }
    })
}

pub fn nearest_bridge(way: &WayRecord, bridges: &[BridgeRecord]) -> Option<NearestBridge> {
    closest(way.centroid(), bridges).map(|(bridge, distance_m)| NearestBridge {
        key: bridge.key.clone(),
        distance_m,
    })
}

/// Attaches the nearest bridge to every way and keeps only the ways that got
/// one. Output order follows `ways`.
pub fn match_ways(
    ways: &[WayRecord],
    bridges: &[BridgeRecord],
    progress: &ProgressBar,
) -> Vec<MatchedWay> {
    let mut seen = HashSet::with_capacity(bridges.len());
    let duplicates = bridges.iter().filter(|b| !seen.insert(&b.key)).count();
    if duplicates > 0 {
        log::warn!("{duplicates} bridges share a key with an earlier bridge");
    }

    log::info!(
        "Matching {} ways against {} bridges...",
        ways.len(),
        bridges.len()
    );

    progress.set_length(ways.len() as u64);
    let matched: Vec<MatchedWay> = ways
        .par_iter()
        .progress_with(progress.clone())
        .filter_map(|way| {
            let (bridge, distance_m) = closest(way.centroid(), bridges)?;
            Some(MatchedWay {
                way: way.clone(),
                nearest: NearestBridge {
                    key: bridge.key.clone(),
                    distance_m,
                },
                bridge: bridge.clone(),
            })
        })
        .collect();
    progress.finish_and_clear();

    log::info!(
        "Matched {} of {} ways to a bridge",
        matched.len(),
        ways.len()
    );
    matched
}
