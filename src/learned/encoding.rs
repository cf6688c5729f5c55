use crate::model::{FEATURE_KEYS, WayRecord};
use std::collections::BTreeSet;

/// Category used for tags a way does not carry.
pub const MISSING: &str = "None";

pub fn feature_row(way: &WayRecord) -> Vec<&str> {
    FEATURE_KEYS
        .iter()
        .map(|key| way.tags.get(key).unwrap_or(MISSING))
        .collect()
}

/// One-hot encoding over the categories seen while fitting. Every feature
/// gets one extra slot, in front of its categories, for values never seen.
#[derive(Debug, Clone)]
pub struct OneHotEncoder {
    vocabularies: Vec<Vec<String>>,
    offsets: Vec<usize>,
    width: usize,
}

impl OneHotEncoder {
    pub fn fit(rows: &[Vec<&str>]) -> Self {
        let columns = rows.first().map_or(0, Vec::len);
        let vocabularies: Vec<Vec<String>> = (0..columns)
            .map(|column| {
                let categories: BTreeSet<&str> = rows.iter().map(|row| row[column]).collect();
                categories.into_iter().map(str::to_string).collect()
            })
            .collect();

        let mut offsets = Vec::with_capacity(columns);
        let mut width = 0;
        for vocabulary in &vocabularies {
            offsets.push(width);
            width += vocabulary.len() + 1;
        }

        OneHotEncoder {
            vocabularies,
            offsets,
            width,
        }
    }

    /// Total number of one-hot slots.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Indices of the hot slots, one per feature.
    pub fn encode(&self, row: &[&str]) -> Vec<usize> {
        self.vocabularies
            .iter()
            .zip(&self.offsets)
            .zip(row)
            .map(|((vocabulary, offset), value)| {
                let slot = vocabulary
                    .binary_search_by(|category| category.as_str().cmp(*value))
                    .map_or(0, |position| position + 1);
                offset + slot
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::tests::way_at;

    #[test]
    fn categories_are_sorted_behind_an_unknown_slot() {
        let rows = vec![vec!["2", "yes"], vec!["1", "no"], vec!["2", "no"]];
        let encoder = OneHotEncoder::fit(&rows);

        // lanes: [unknown, "1", "2"], oneway: [unknown, "no", "yes"]
        assert_eq!(encoder.width(), 6);
        assert_eq!(encoder.encode(&["1", "yes"]), vec![1, 5]);
        assert_eq!(encoder.encode(&["2", "no"]), vec![2, 4]);
    }

    #[test]
    fn unseen_values_use_the_unknown_slot() {
        let rows = vec![vec!["2", "yes"]];
        let encoder = OneHotEncoder::fit(&rows);
        assert_eq!(encoder.encode(&["7", "yes"]), vec![0, 3]);
    }

    #[test]
    fn missing_tags_become_a_category() {
        let mut way = way_at(1, 50.0, 8.0);
        way.tags.set("highway", "primary".to_string());
        let row = feature_row(&way);

        assert_eq!(row.len(), FEATURE_KEYS.len());
        assert_eq!(row[2], "primary");
        assert_eq!(row[0], MISSING);
    }
}
