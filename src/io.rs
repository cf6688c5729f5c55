use crate::error::{Error, Result};
use crate::model::{ExportRow, WayId};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Persists a stage's full output as gzip-compressed JSON.
pub fn write_snapshot<T: Serialize>(records: &[T], path: &Path) -> Result<()> {
    create_parent(path)?;

    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, records)?;
    encoder.finish()?.flush()?;

    log::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(Error::MissingSnapshot(path.to_path_buf()));
    }

    let decoder = GzDecoder::new(BufReader::new(File::open(path)?));
    let records: Vec<T> = serde_json::from_reader(decoder)?;

    log::info!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Writes the merged table as one JSON object keyed by way id, which is what
/// the map front end loads.
pub fn write_export(rows: &BTreeMap<WayId, ExportRow>, path: &Path) -> Result<()> {
    create_parent(path)?;

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, rows)?;
    writer.flush()?;

    log::info!("Exported {} obstacles to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BridgeKey, WidthPrediction};
    use tempfile::tempdir;

    #[test]
    fn snapshot_survives_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("nn_est.json.gz");
        let predictions = vec![
            WidthPrediction {
                id: 7,
                nn_width: 3.25,
            },
            WidthPrediction {
                id: 9,
                nn_width: 11.0,
            },
        ];

        write_snapshot(&predictions, &path).unwrap();
        let read: Vec<WidthPrediction> = read_snapshot(&path).unwrap();

        assert_eq!(read, predictions);
    }

    #[test]
    fn missing_snapshot_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("comb_df.json.gz");

        let err = read_snapshot::<WidthPrediction>(&path).unwrap_err();
        assert!(matches!(err, Error::MissingSnapshot(p) if p == path));
    }

    #[test]
    fn export_is_keyed_by_way_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("obstacle_data.json");
        let mut rows = BTreeMap::new();
        rows.insert(
            42,
            ExportRow {
                bast_width: Some(12.0),
                osm_width: None,
                est_width: Some(7.0),
                bwnr_tbwnr: Some(BridgeKey("47110".to_string())),
                bast_name: Some("Mainbrücke".to_string()),
                osm_name: Some("B 3".to_string()),
                nn_width: 6.5,
            },
        );

        write_export(&rows, &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        let row = &json["42"];
        assert_eq!(row["bast_width"], 12.0);
        assert!(row["osm_width"].is_null());
        assert_eq!(row["est_width"], 7.0);
        assert_eq!(row["nn_width"], 6.5);
        assert_eq!(row["bwnr_tbwnr"], "47110");
        assert_eq!(row["bast_name"], "Mainbrücke");
        assert_eq!(row["osm_name"], "B 3");
    }
}
