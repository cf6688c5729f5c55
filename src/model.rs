use std::fmt;

use geo::{Coord, Point, Rect};
use serde::{Deserialize, Serialize};

pub type WayId = i64;

/// `bwnr` followed by `tbwnr`, unique per BASt structure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BridgeKey(pub String);

impl BridgeKey {
    pub fn new(bwnr: &str, tbwnr: &str) -> Self {
        BridgeKey(format!("{bwnr}{tbwnr}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BridgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn rect(&self) -> Rect {
        Rect::new(
            Coord {
                x: self.min_lon,
                y: self.min_lat,
            },
            Coord {
                x: self.max_lon,
                y: self.max_lat,
            },
        )
    }

    /// Center of the bounding box, x = lon, y = lat.
    pub fn centroid(&self) -> Point {
        self.rect().center().into()
    }
}

/// Allow-listed OSM tags. Anything not listed here is dropped on extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsmTags {
    pub name: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub int_ref: Option<String>,
    pub highway: Option<String>,
    pub lanes: Option<String>,
    pub bicycle: Option<String>,
    pub foot: Option<String>,
    pub tracktype: Option<String>,
    pub railway: Option<String>,
    pub oneway: Option<String>,
    pub passenger_lines: Option<String>,
    pub segregated: Option<String>,
    pub sidewalk: Option<String>,
    #[serde(rename = "cycleway:both")]
    pub cycleway_both: Option<String>,
    pub traffic_sign: Option<String>,
    pub shoulder: Option<String>,
    pub horse: Option<String>,
    pub motorroad: Option<String>,
    pub lane_markings: Option<String>,
    #[serde(rename = "cycleway:right")]
    pub cycleway_right: Option<String>,
    pub man_made: Option<String>,
    #[serde(rename = "bridge:structure")]
    pub bridge_structure: Option<String>,
    #[serde(rename = "railway:bidirectional")]
    pub railway_bidirectional: Option<String>,
    pub cycleway: Option<String>,
    #[serde(rename = "cycleway:left")]
    pub cycleway_left: Option<String>,
    #[serde(rename = "sidewalk:right")]
    pub sidewalk_right: Option<String>,
    pub tracks: Option<String>,
    pub footway: Option<String>,
    pub wheelchair: Option<String>,
    #[serde(rename = "parking:both")]
    pub parking_both: Option<String>,
    #[serde(rename = "sidewalk:both")]
    pub sidewalk_both: Option<String>,
    #[serde(rename = "sidewalk:left")]
    pub sidewalk_left: Option<String>,
    pub is_sidepath: Option<String>,
}

/// Tag keys fed to the learned estimator, in column order.
pub const FEATURE_KEYS: [&str; 30] = [
    "lanes",
    "oneway",
    "highway",
    "bicycle",
    "foot",
    "sidewalk",
    "sidewalk:both",
    "sidewalk:right",
    "sidewalk:left",
    "cycleway",
    "cycleway:both",
    "cycleway:left",
    "tracktype",
    "railway",
    "passenger_lines",
    "segregated",
    "traffic_sign",
    "shoulder",
    "horse",
    "motorroad",
    "lane_markings",
    "cycleway:right",
    "man_made",
    "bridge:structure",
    "railway:bidirectional",
    "tracks",
    "footway",
    "wheelchair",
    "parking:both",
    "is_sidepath",
];

impl OsmTags {
    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        let slot = match key {
            "name" => &mut self.name,
            "ref" => &mut self.reference,
            "int_ref" => &mut self.int_ref,
            "highway" => &mut self.highway,
            "lanes" => &mut self.lanes,
            "bicycle" => &mut self.bicycle,
            "foot" => &mut self.foot,
            "tracktype" => &mut self.tracktype,
            "railway" => &mut self.railway,
            "oneway" => &mut self.oneway,
            "passenger_lines" => &mut self.passenger_lines,
            "segregated" => &mut self.segregated,
            "sidewalk" => &mut self.sidewalk,
            "cycleway:both" => &mut self.cycleway_both,
            "traffic_sign" => &mut self.traffic_sign,
            "shoulder" => &mut self.shoulder,
            "horse" => &mut self.horse,
            "motorroad" => &mut self.motorroad,
            "lane_markings" => &mut self.lane_markings,
            "cycleway:right" => &mut self.cycleway_right,
            "man_made" => &mut self.man_made,
            "bridge:structure" => &mut self.bridge_structure,
            "railway:bidirectional" => &mut self.railway_bidirectional,
            "cycleway" => &mut self.cycleway,
            "cycleway:left" => &mut self.cycleway_left,
            "sidewalk:right" => &mut self.sidewalk_right,
            "tracks" => &mut self.tracks,
            "footway" => &mut self.footway,
            "wheelchair" => &mut self.wheelchair,
            "parking:both" => &mut self.parking_both,
            "sidewalk:both" => &mut self.sidewalk_both,
            "sidewalk:left" => &mut self.sidewalk_left,
            "is_sidepath" => &mut self.is_sidepath,
            _ => return None,
        };
        Some(slot)
    }

    /// Stores `value` under `key` if the key is allow-listed. Returns whether
    /// it was kept.
    pub fn set(&mut self, key: &str, value: String) -> bool {
        match self.slot_mut(key) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "name" => &self.name,
            "ref" => &self.reference,
            "int_ref" => &self.int_ref,
            "highway" => &self.highway,
            "lanes" => &self.lanes,
            "bicycle" => &self.bicycle,
            "foot" => &self.foot,
            "tracktype" => &self.tracktype,
            "railway" => &self.railway,
            "oneway" => &self.oneway,
            "passenger_lines" => &self.passenger_lines,
            "segregated" => &self.segregated,
            "sidewalk" => &self.sidewalk,
            "cycleway:both" => &self.cycleway_both,
            "traffic_sign" => &self.traffic_sign,
            "shoulder" => &self.shoulder,
            "horse" => &self.horse,
            "motorroad" => &self.motorroad,
            "lane_markings" => &self.lane_markings,
            "cycleway:right" => &self.cycleway_right,
            "man_made" => &self.man_made,
            "bridge:structure" => &self.bridge_structure,
            "railway:bidirectional" => &self.railway_bidirectional,
            "cycleway" => &self.cycleway,
            "cycleway:left" => &self.cycleway_left,
            "sidewalk:right" => &self.sidewalk_right,
            "tracks" => &self.tracks,
            "footway" => &self.footway,
            "wheelchair" => &self.wheelchair,
            "parking:both" => &self.parking_both,
            "sidewalk:both" => &self.sidewalk_both,
            "sidewalk:left" => &self.sidewalk_left,
            "is_sidepath" => &self.is_sidepath,
            _ => return None,
        };
        value.as_deref()
    }
}

/// One OSM way that carried a bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WayRecord {
    pub id: WayId,
    pub bounds: Bounds,
    pub meanlat: f64,
    pub meanlon: f64,
    /// Tagged width in meters, only ever strictly positive.
    pub width: Option<f64>,
    pub tags: OsmTags,
}

impl WayRecord {
    pub fn new(id: WayId, bounds: Bounds, width: Option<f64>, tags: OsmTags) -> Self {
        let centroid = bounds.centroid();
        WayRecord {
            id,
            bounds,
            meanlat: centroid.y(),
            meanlon: centroid.x(),
            width,
            tags,
        }
    }

    pub fn centroid(&self) -> Point {
        Point::new(self.meanlon, self.meanlat)
    }
}

/// One row of the BASt bridge statistics, reprojected to WGS84.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRecord {
    pub key: BridgeKey,
    pub bwnr: String,
    pub tbwnr: String,
    pub lat: f64,
    pub lon: f64,
    pub name: Option<String>,
    pub ort: Option<String>,
    pub street_top: Option<String>,
    pub street_bottom: Option<String>,
    pub length: Option<f64>,
    pub area: Option<f64>,
    pub width: Option<f64>,
    pub zustandsnote: Option<f64>,
    pub zustandsnotenklasse: Option<String>,
    pub jast_lage: Option<String>,
    pub teil_bw_stadium: Option<String>,
    pub trag_l_idx: Option<String>,
    pub baustoffklasse: Option<String>,
    pub baujahr: Option<String>,
    pub altersklasse: Option<String>,
    pub laengenklasse: Option<String>,
    pub bl: Option<String>,
    pub id_nr: Option<String>,
}

impl BridgeRecord {
    pub fn point(&self) -> Point {
        Point::new(self.lon, self.lat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestBridge {
    pub key: BridgeKey,
    pub distance_m: f64,
}

/// A way joined with the bridge closest to its centroid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedWay {
    pub way: WayRecord,
    pub nearest: NearestBridge,
    pub bridge: BridgeRecord,
}

/// Bridge-derived data attached to a way. Dropped as a whole when a match is
/// judged unreliable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeProvenance {
    pub distance_m: f64,
    pub bridge: BridgeRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleRecord {
    pub id: WayId,
    pub bast_width: Option<f64>,
    pub osm_width: Option<f64>,
    pub est_width: Option<f64>,
    pub bwnr_tbwnr: Option<BridgeKey>,
    pub bast_name: Option<String>,
    pub osm_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WidthPrediction {
    pub id: WayId,
    pub nn_width: f64,
}

/// Row of `obstacle_data.json`. The way id is the object key, not a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub bast_width: Option<f64>,
    pub osm_width: Option<f64>,
    pub est_width: Option<f64>,
    pub bwnr_tbwnr: Option<BridgeKey>,
    pub bast_name: Option<String>,
    pub osm_name: Option<String>,
    pub nn_width: f64,
}
