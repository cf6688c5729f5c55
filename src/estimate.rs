use crate::model::{
    BridgeKey, BridgeProvenance, MatchedWay, ObstacleRecord, OsmTags, WayRecord,
};
use std::collections::HashMap;

/// A bridge key referenced by more ways than this is ambiguous.
pub const MAX_UNAMBIGUOUS_REFERENCES: usize = 4;

pub const RAILWAY_WIDTH: f64 = 2.5;

/// Width in meters by exact `lanes` value.
pub fn lane_width(lanes: &str) -> Option<f64> {
    match lanes {
        "1" => Some(4.0),
        "2" => Some(7.0),
        "3" => Some(11.0),
        "4" => Some(15.0),
        "5" => Some(18.0),
        _ => None,
    }
}

/// Width in meters by `man_made` category.
pub fn category_width(man_made: &str) -> Option<f64> {
    match man_made {
        "gantry" => Some(0.5),
        "pipeline" => Some(0.3),
        "wildlife_crossing" => Some(50.0),
        _ => None,
    }
}

/// Tag based fallback: lanes first, then `man_made`, then any railway.
pub fn estimate_width(tags: &OsmTags) -> Option<f64> {
    tags.lanes
        .as_deref()
        .and_then(lane_width)
        .or_else(|| tags.man_made.as_deref().and_then(category_width))
        .or_else(|| tags.railway.as_ref().map(|_| RAILWAY_WIDTH))
}

/// A way and whatever bridge data survived pruning so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub way: WayRecord,
    pub provenance: Option<BridgeProvenance>,
}

impl Candidate {
    fn key(&self) -> Option<&BridgeKey> {
        self.provenance.as_ref().map(|p| &p.bridge.key)
    }
}

/// Keeps a match only if the way lies within half the bridge's length of it.
/// Bridges without a length never qualify.
pub fn apply_proximity_rule(matched: Vec<MatchedWay>) -> Vec<Candidate> {
    matched
        .into_iter()
        .map(|m| {
            let close = m
                .bridge
                .length
                .is_some_and(|length| m.nearest.distance_m <= length / 2.0);
            Candidate {
                way: m.way,
                provenance: close.then(|| BridgeProvenance {
                    distance_m: m.nearest.distance_m,
                    bridge: m.bridge,
                }),
            }
        })
        .collect()
}

fn compact(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Whether the street on top of the bridge is this way, by name or ref.
fn carries_way(street_top: Option<&str>, tags: &OsmTags) -> bool {
    let Some(street_top) = street_top else {
        return false;
    };
    [&tags.name, &tags.reference, &tags.int_ref]
        .into_iter()
        .flatten()
        .any(|value| compact(value) == street_top)
}

/// Drops bridge data for over-referenced keys unless the bridge's street on
/// top names the way. References are counted after proximity pruning.
pub fn apply_reference_rule(candidates: &mut [Candidate]) {
    let mut references: HashMap<BridgeKey, usize> = HashMap::new();
    for key in candidates.iter().filter_map(Candidate::key) {
        *references.entry(key.clone()).or_default() += 1;
    }

    let mut dropped = 0;
    for candidate in candidates.iter_mut() {
        let Some(provenance) = &candidate.provenance else {
            continue;
        };
        let count = references.get(&provenance.bridge.key).copied().unwrap_or(0);
        if count > MAX_UNAMBIGUOUS_REFERENCES
            && !carries_way(provenance.bridge.street_top.as_deref(), &candidate.way.tags)
        {
            candidate.provenance = None;
            dropped += 1;
        }
    }
    log::debug!("Dropped {dropped} matches of over-referenced bridges");
}

/// Prunes unreliable matches and adds the tag based estimate. One record per
/// matched way, sorted by way id.
pub fn estimate(matched: Vec<MatchedWay>) -> Vec<ObstacleRecord> {
    let total = matched.len();
    let mut candidates = apply_proximity_rule(matched);
    let close = candidates.iter().filter(|c| c.provenance.is_some()).count();
    log::info!("{close} of {total} matches are within half a bridge length");

    apply_reference_rule(&mut candidates);
    let retained = candidates.iter().filter(|c| c.provenance.is_some()).count();
    log::info!("{retained} matches kept after ambiguity check");

    let mut records: Vec<ObstacleRecord> = candidates
        .into_iter()
        .map(|candidate| {
            let est_width = estimate_width(&candidate.way.tags);
            let (bast_width, bwnr_tbwnr, bast_name) = match candidate.provenance {
                Some(p) => (p.bridge.width, Some(p.bridge.key), p.bridge.name),
                None => (None, None, None),
            };
            ObstacleRecord {
                id: candidate.way.id,
                bast_width,
                osm_width: candidate.way.width,
                est_width,
                bwnr_tbwnr,
                bast_name,
                osm_name: candidate.way.tags.name,
            }
        })
        .collect();
    records.sort_by_key(|r| r.id);

    let estimated = records.iter().filter(|r| r.est_width.is_some()).count();
    log::info!("Estimated a width from tags for {estimated} of {total} ways");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::match_ways;
    use crate::matcher::tests::{bridge_at, way_at};
    use crate::model::NearestBridge;
    use indicatif::ProgressBar;

    fn tags(pairs: &[(&str, &str)]) -> OsmTags {
        let mut tags = OsmTags::default();
        for (key, value) in pairs {
            tags.set(key, value.to_string());
        }
        tags
    }

    fn matched(id: i64, key: &str, distance_m: f64, length: f64, tags: OsmTags) -> MatchedWay {
        let mut way = way_at(id, 50.0, 8.0);
        way.tags = tags;
        MatchedWay {
            way,
            nearest: NearestBridge {
                key: BridgeKey(key.to_string()),
                distance_m,
            },
            bridge: bridge_at(key, 50.0, 8.0, length),
        }
    }

    #[test]
    fn lane_rule_is_exact_match_only() {
        assert_eq!(estimate_width(&tags(&[("lanes", "2")])), Some(7.0));
        assert_eq!(estimate_width(&tags(&[("lanes", "5")])), Some(18.0));
        assert_eq!(estimate_width(&tags(&[("lanes", "2.5")])), None);
        assert_eq!(estimate_width(&tags(&[("lanes", "two")])), None);
        assert_eq!(estimate_width(&tags(&[("lanes", " 2")])), None);
    }

    #[test]
    fn lanes_beat_category() {
        let way = tags(&[("lanes", "1"), ("man_made", "gantry")]);
        assert_eq!(estimate_width(&way), Some(4.0));
    }

    #[test]
    fn category_then_railway() {
        assert_eq!(estimate_width(&tags(&[("man_made", "pipeline")])), Some(0.3));
        assert_eq!(
            estimate_width(&tags(&[("man_made", "wildlife_crossing")])),
            Some(50.0)
        );
        assert_eq!(
            estimate_width(&tags(&[("lanes", "7"), ("railway", "rail")])),
            Some(RAILWAY_WIDTH)
        );
        assert_eq!(
            estimate_width(&tags(&[("man_made", "gantry"), ("railway", "rail")])),
            Some(0.5)
        );
        assert_eq!(estimate_width(&tags(&[("highway", "footway")])), None);
    }

    #[test]
    fn proximity_rule_strips_far_matches() {
        let candidates = apply_proximity_rule(vec![
            matched(1, "A", 10.0, 20.0, OsmTags::default()),
            matched(2, "A", 10.5, 20.0, OsmTags::default()),
        ]);

        assert!(candidates[0].provenance.is_some());
        assert!(candidates[1].provenance.is_none());
        assert_eq!(candidates[1].way.id, 2);
    }

    #[test]
    fn bridge_without_length_never_matches() {
        let mut way = matched(1, "A", 0.0, 20.0, OsmTags::default());
        way.bridge.length = None;
        let candidates = apply_proximity_rule(vec![way]);
        assert!(candidates[0].provenance.is_none());
    }

    #[test]
    fn over_referenced_bridge_keeps_only_named_ways() {
        let mut rows = Vec::new();
        for id in 0..5 {
            rows.push(matched(id, "K", 1.0, 100.0, tags(&[("name", "Feldweg")])));
        }
        rows.push(matched(10, "K", 1.0, 100.0, tags(&[("ref", "A 5")])));
        rows.push(matched(11, "K", 1.0, 100.0, tags(&[("int_ref", "E 451")])));
        for row in &mut rows {
            row.bridge.street_top = Some("A5".to_string());
        }

        let mut candidates = apply_proximity_rule(rows);
        apply_reference_rule(&mut candidates);

        let kept: Vec<i64> = candidates
            .iter()
            .filter(|c| c.provenance.is_some())
            .map(|c| c.way.id)
            .collect();
        assert_eq!(kept, vec![10]);
    }

    #[test]
    fn four_references_are_not_ambiguous() {
        let rows = (0..4)
            .map(|id| matched(id, "K", 1.0, 100.0, OsmTags::default()))
            .collect();
        let mut candidates = apply_proximity_rule(rows);
        apply_reference_rule(&mut candidates);
        assert!(candidates.iter().all(|c| c.provenance.is_some()));
    }

    #[test]
    fn references_counted_after_proximity_pruning() {
        // five ways reference K, but two are too far away to count
        let mut rows: Vec<MatchedWay> = (0..3)
            .map(|id| matched(id, "K", 1.0, 100.0, OsmTags::default()))
            .collect();
        rows.push(matched(3, "K", 80.0, 100.0, OsmTags::default()));
        rows.push(matched(4, "K", 90.0, 100.0, OsmTags::default()));

        let mut candidates = apply_proximity_rule(rows);
        apply_reference_rule(&mut candidates);

        let kept = candidates.iter().filter(|c| c.provenance.is_some()).count();
        assert_eq!(kept, 3);
    }

    #[test]
    fn estimate_nulls_all_bridge_fields_together() {
        let records = estimate(vec![
            matched(2, "A", 500.0, 20.0, tags(&[("name", "Brückenstraße")])),
            matched(1, "A", 1.0, 20.0, tags(&[("lanes", "2")])),
        ]);

        assert_eq!(records[0].id, 1);
        assert_eq!(records[0].bast_width, Some(10.0));
        assert_eq!(records[0].bwnr_tbwnr, Some(BridgeKey("A".to_string())));
        assert_eq!(records[0].bast_name.as_deref(), Some("Bauwerk A"));
        assert_eq!(records[0].est_width, Some(7.0));

        assert_eq!(records[1].id, 2);
        assert_eq!(records[1].bast_width, None);
        assert_eq!(records[1].bwnr_tbwnr, None);
        assert_eq!(records[1].bast_name, None);
        assert_eq!(records[1].osm_name.as_deref(), Some("Brückenstraße"));
        assert_eq!(records[1].est_width, None);
    }

    #[test]
    fn two_ways_one_bridge_scenario() {
        let ways = vec![way_at(1, 50.0, 8.0), way_at(2, 50.0, 8.01)];
        let bridges = vec![bridge_at("47110", 50.0, 8.0, 20.0)];

        let records = estimate(match_ways(&ways, &bridges, &ProgressBar::hidden()));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bwnr_tbwnr, Some(BridgeKey("47110".to_string())));
        assert_eq!(records[0].bast_width, Some(10.0));
        assert_eq!(records[1].bwnr_tbwnr, None);
        assert_eq!(records[1].bast_width, None);
    }
}
