use super::{ExtractStats, Extracted, Extractor, FilterReason};
use crate::error::Result;
use crate::model::{BridgeKey, BridgeRecord};
use geo::Point;
use proj::Proj;
use serde::Deserialize;
use std::io::Read;

pub const EPSG_UTM_32N: &str = "EPSG:32632";
pub const EPSG_WGS84: &str = "EPSG:4326";

/// Raw `hoechst_sachverhalt_unten` values that mean "no street below", e.g.
/// paths, forestry tracks or waterways.
pub const DENIED_STREET_BOTTOM: [&str; 6] = [
    " U:  WiWeg.",
    " U:  G     ",
    " U:  G+R",
    " U:  Forstw.",
    " U:  Gehweg",
    " U:  Sonstige Straße",
];

// turn projected coordinates into WGS84, x = lon, y = lat
pub trait Reprojector {
    fn to_wgs84(&self, points: &mut [Point]) -> Result<()>;
}

pub struct UtmZone32N {
    proj: Proj,
}

impl UtmZone32N {
    pub fn new() -> Result<Self> {
        let proj = Proj::new_known_crs(EPSG_UTM_32N, EPSG_WGS84, None)?;
        Ok(UtmZone32N { proj })
    }
}

impl Reprojector for UtmZone32N {
    fn to_wgs84(&self, points: &mut [Point]) -> Result<()> {
        self.proj.convert_array(points)?;
        Ok(())
    }
}

/// Columns of the BASt "Brückenstatistik" CSV we care about. Headers are
/// matched by name, unknown columns are ignored.
#[derive(Debug, Deserialize)]
struct RawBridgeRow {
    bwnr: String,
    tbwnr: String,
    #[serde(default)]
    bauwerksname: Option<String>,
    #[serde(default)]
    ort: Option<String>,
    #[serde(default)]
    hoechst_sachverhalt_oben: Option<String>,
    #[serde(default)]
    hoechst_sachverhalt_unten: Option<String>,
    #[serde(default)]
    jast_lage: Option<String>,
    #[serde(default)]
    teil_bw_stadium: Option<String>,
    #[serde(default)]
    laenge: Option<String>,
    #[serde(default)]
    flaeche: Option<String>,
    #[serde(default)]
    trag_l_idx: Option<String>,
    #[serde(default)]
    zustandsnote: Option<String>,
    #[serde(default)]
    zustandsnotenklasse: Option<String>,
    #[serde(default)]
    baustoffklasse: Option<String>,
    #[serde(default)]
    baujahr: Option<String>,
    #[serde(default)]
    altersklasse: Option<String>,
    #[serde(default)]
    laengenklasse: Option<String>,
    #[serde(default)]
    bl: Option<String>,
    #[serde(default)]
    id_nr: Option<String>,
    #[serde(default)]
    x_y: Option<String>,
}

/**
 * Parse the semicolon separated, ISO-8859-1 encoded bridge statistics of the
 * Bundesanstalt für Straßenwesen.
 */
pub struct BastExtractor<P> {
    reprojector: P,
}

impl<P: Reprojector> BastExtractor<P> {
    pub fn new(reprojector: P) -> Self {
        BastExtractor { reprojector }
    }
}

impl<P: Reprojector> Extractor for BastExtractor<P> {
    type Record = BridgeRecord;

    fn extract<R: Read>(&self, mut input: R) -> Result<Extracted<BridgeRecord>> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;

        // encoding_rs maps the ISO-8859-1 label onto windows-1252
        let (text, _, had_errors) = encoding_rs::WINDOWS_1252.decode(&bytes);
        if had_errors {
            log::warn!("BASt table contained undecodable bytes, replaced them");
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut stats = ExtractStats::default();
        let mut rows = Vec::new();
        let mut points = Vec::new();

        for result in reader.deserialize::<RawBridgeRow>() {
            let row = result?;

            let Some(point) = row.x_y.as_deref().and_then(parse_utm_point) else {
                stats.filter(FilterReason::NoLocation);
                continue;
            };
            if is_denied_street_bottom(row.hoechst_sachverhalt_unten.as_deref()) {
                stats.filter(FilterReason::DeniedStreetBottom);
                continue;
            }

            points.push(point);
            rows.push(row);
        }

        log::debug!("Reprojecting {} bridge locations", points.len());
        self.reprojector.to_wgs84(&mut points)?;

        let mut records: Vec<BridgeRecord> = rows
            .into_iter()
            .zip(points)
            .map(|(row, point)| into_record(row, point))
            .collect();
        records.sort_by(|a, b| a.lat.total_cmp(&b.lat));

        stats.kept = records.len();
        Ok(Extracted { records, stats })
    }

    fn name(&self) -> &'static str {
        "BASt Extractor"
    }
}

fn into_record(row: RawBridgeRow, point: Point) -> BridgeRecord {
    let length = row.laenge.as_deref().and_then(parse_decimal);
    let area = row.flaeche.as_deref().and_then(parse_decimal);
    let width = match (area, length) {
        (Some(area), Some(length)) if length != 0.0 => Some(area / length),
        _ => None,
    };

    BridgeRecord {
        key: BridgeKey::new(row.bwnr.trim(), &row.tbwnr),
        lat: point.y(),
        lon: point.x(),
        name: row.bauwerksname,
        ort: row.ort,
        street_top: row
            .hoechst_sachverhalt_oben
            .as_deref()
            .map(|s| normalize_street(s, "O:")),
        street_bottom: row
            .hoechst_sachverhalt_unten
            .as_deref()
            .map(|s| normalize_street(s, "U:")),
        length,
        area,
        width,
        zustandsnote: row.zustandsnote.as_deref().and_then(parse_decimal),
        zustandsnotenklasse: row.zustandsnotenklasse,
        jast_lage: row.jast_lage,
        teil_bw_stadium: row.teil_bw_stadium,
        trag_l_idx: row.trag_l_idx,
        baustoffklasse: row.baustoffklasse,
        baujahr: row.baujahr,
        altersklasse: row.altersklasse,
        laengenklasse: row.laengenklasse,
        bl: row.bl,
        id_nr: row.id_nr,
        bwnr: row.bwnr,
        tbwnr: row.tbwnr,
    }
}

/// Parses `POINT (<easting> <northing>)`.
pub fn parse_utm_point(raw: &str) -> Option<Point> {
    let inner = raw.trim().strip_prefix("POINT (")?.strip_suffix(')')?;
    let (x, y) = inner.trim().split_once(' ')?;
    Some(Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}

fn parse_decimal(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
    value.is_finite().then_some(value)
}

pub fn is_denied_street_bottom(raw: Option<&str>) -> bool {
    match raw {
        Some(street) => street.trim().is_empty() || DENIED_STREET_BOTTOM.contains(&street),
        None => false,
    }
}

/// Strips spaces, the `*` marker, the `U:`/`O:` side prefix and a trailing
/// `(Ast)` so the result can be compared against OSM names and refs.
pub fn normalize_street(raw: &str, side_prefix: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let street = compact.strip_prefix('*').unwrap_or(&compact);
    let street = street.strip_prefix(side_prefix).unwrap_or(street);
    let street = street.strip_suffix("(Ast)").unwrap_or(street);
    street.to_string()
}
