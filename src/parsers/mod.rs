pub mod bast;
pub mod osm;

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use crate::error::Result;

/// Why a source row was dropped without failing the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterReason {
    /// OSM way without a `<bounds>` element.
    NoBounds,
    /// BASt row with an empty or unparsable `x_y` location.
    NoLocation,
    /// BASt row whose street below is a placeholder, not a street.
    DeniedStreetBottom,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FilterReason::NoBounds => "no bounding box",
            FilterReason::NoLocation => "no location",
            FilterReason::DeniedStreetBottom => "placeholder street below",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractStats {
    pub kept: usize,
    pub filtered: BTreeMap<FilterReason, usize>,
}

impl ExtractStats {
    pub fn filter(&mut self, reason: FilterReason) {
        *self.filtered.entry(reason).or_default() += 1;
    }

    pub fn filtered_count(&self, reason: FilterReason) -> usize {
        self.filtered.get(&reason).copied().unwrap_or(0)
    }

    pub fn log(&self, source: &str) {
        log::info!("{source}: kept {} records", self.kept);
        for (reason, count) in &self.filtered {
            log::info!("{source}: dropped {count} records ({reason})");
        }
    }
}

pub struct Extracted<T> {
    pub records: Vec<T>,
    pub stats: ExtractStats,
}

// turn a raw source document into typed records
pub trait Extractor {
    type Record;

    fn extract<R: Read>(&self, input: R) -> Result<Extracted<Self::Record>>;

    fn name(&self) -> &'static str;
}
