use super::{ExtractStats, Extracted, Extractor, FilterReason};
use crate::error::{Error, Result};
use crate::model::{Bounds, OsmTags, WayId, WayRecord};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::{BufReader, Read};

/**
 * Extract ways from an Overpass XML export queried with `geometry="full"`,
 * which gives every way a `<bounds>` child.
 */
pub struct OsmExtractor;

impl Extractor for OsmExtractor {
    type Record = WayRecord;

    fn extract<R: Read>(&self, input: R) -> Result<Extracted<WayRecord>> {
        let mut reader = Reader::from_reader(BufReader::new(input));
        reader.trim_text(true);

        let mut records = Vec::new();
        let mut stats = ExtractStats::default();
        let mut current: Option<PendingWay> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Eof => break,
                Event::Start(e) if e.name().as_ref() == b"way" => {
                    current = Some(PendingWay::new(way_id(&e)?));
                }
                Event::Empty(e) => match e.name().as_ref() {
                    // a self-closing way has no children, so no bounds either
                    b"way" => stats.filter(FilterReason::NoBounds),
                    b"bounds" => {
                        if let Some(way) = current.as_mut() {
                            way.bounds = parse_bounds(&e)?;
                        }
                    }
                    b"tag" => {
                        if let Some(way) = current.as_mut() {
                            let key = attr_value(&e, b"k")?;
                            let value = attr_value(&e, b"v")?;
                            if let (Some(key), Some(value)) = (key, value) {
                                way.add_tag(&key, value);
                            }
                        }
                    }
                    _ => {}
                },
                Event::End(e) if e.name().as_ref() == b"way" => {
                    if let Some(way) = current.take() {
                        match way.finish() {
                            Some(record) => records.push(record),
                            None => stats.filter(FilterReason::NoBounds),
                        }
                    }
                }
                _ => {}
            }
            buf.clear();
        }

        stats.kept = records.len();
        log::debug!("Extracted {} ways from OSM document", records.len());

        Ok(Extracted { records, stats })
    }

    fn name(&self) -> &'static str {
        "OSM Extractor"
    }
}

struct PendingWay {
    id: WayId,
    bounds: Option<Bounds>,
    raw_width: Option<String>,
    tags: OsmTags,
}

impl PendingWay {
    fn new(id: WayId) -> Self {
        PendingWay {
            id,
            bounds: None,
            raw_width: None,
            tags: OsmTags::default(),
        }
    }

    fn add_tag(&mut self, key: &str, value: String) {
        if key == "width" {
            self.raw_width = Some(value);
        } else {
            self.tags.set(key, value);
        }
    }

    fn finish(self) -> Option<WayRecord> {
        let bounds = self.bounds?;
        let width = self.raw_width.as_deref().and_then(normalize_width);
        Some(WayRecord::new(self.id, bounds, width, self.tags))
    }
}

/// Turns a free-text `width` tag into meters. Anything that is not a
/// positive number once spaces, decimal commas and a trailing `m` are
/// removed counts as untagged.
pub fn normalize_width(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let number = cleaned.strip_suffix('m').unwrap_or(&cleaned);

    let width: f64 = number.parse().ok()?;
    (width.is_finite() && width > 0.0).then_some(width)
}

fn attr_value(event: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in event.attributes().with_checks(false) {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn way_id(event: &BytesStart<'_>) -> Result<WayId> {
    let raw = attr_value(event, b"id")?
        .ok_or_else(|| Error::InvalidData("way element without id".to_string()))?;
    raw.parse()
        .map_err(|_| Error::InvalidData(format!("way id '{raw}' is not an integer")))
}

/// Bounds with a missing or garbled coordinate are as good as no bounds.
fn parse_bounds(event: &BytesStart<'_>) -> Result<Option<Bounds>> {
    let coord = |key: &[u8]| -> Result<Option<f64>> {
        Ok(attr_value(event, key)?.and_then(|value| value.parse().ok()))
    };

    let bounds = match (
        coord(b"minlat")?,
        coord(b"maxlat")?,
        coord(b"minlon")?,
        coord(b"maxlon")?,
    ) {
        (Some(min_lat), Some(max_lat), Some(min_lon), Some(max_lon)) => Some(Bounds {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }),
        _ => None,
    };
    Ok(bounds)
}
