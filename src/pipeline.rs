use crate::config::Config;
use crate::error::Result;
use crate::estimate::estimate;
use crate::fetch::{fetch_bast, fetch_osm};
use crate::io::{read_snapshot, write_export, write_snapshot};
use crate::learned::{predict_all, train};
use crate::matcher::match_ways;
use crate::model::{
    BridgeRecord, ExportRow, MatchedWay, ObstacleRecord, WayId, WayRecord, WidthPrediction,
};
use crate::parsers::Extractor;
use crate::parsers::bast::{BastExtractor, Reprojector, UtmZone32N};
use crate::parsers::osm::OsmExtractor;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;

/// The stages in the order `run` executes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchOsm,
    ExtractOsm,
    ExtractBast,
    Match,
    Estimate,
    Train,
    Export,
}

pub const ALL_STAGES: [Stage; 7] = [
    Stage::FetchOsm,
    Stage::ExtractOsm,
    Stage::ExtractBast,
    Stage::Match,
    Stage::Estimate,
    Stage::Train,
    Stage::Export,
];

/// Joins the learned predictions onto the heuristic output. Ways without a
/// prediction are left out.
pub fn merge(
    obstacles: Vec<ObstacleRecord>,
    predictions: &[WidthPrediction],
) -> BTreeMap<WayId, ExportRow> {
    let by_id: HashMap<WayId, f64> = predictions.iter().map(|p| (p.id, p.nn_width)).collect();

    obstacles
        .into_iter()
        .filter_map(|obstacle| {
            let nn_width = *by_id.get(&obstacle.id)?;
            Some((
                obstacle.id,
                ExportRow {
                    bast_width: obstacle.bast_width,
                    osm_width: obstacle.osm_width,
                    est_width: obstacle.est_width,
                    bwnr_tbwnr: obstacle.bwnr_tbwnr,
                    bast_name: obstacle.bast_name,
                    osm_name: obstacle.osm_name,
                    nn_width,
                },
            ))
        })
        .collect()
}

pub struct Pipeline<'a> {
    config: &'a Config,
    multi: MultiProgress,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, multi: MultiProgress) -> Self {
        Pipeline { config, multi }
    }

    fn progress_bar(&self, message: &str) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(
            ProgressStyle::with_template("{msg} {wide_bar:.cyan/dim} {pos}/{len} [{eta}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_message(message.to_string());
        bar
    }

    pub fn run(&self, stages: &[Stage]) -> Result<()> {
        for stage in stages {
            log::info!("--- Running {stage:?} ---");
            match stage {
                Stage::FetchOsm => fetch_osm(self.config)?,
                Stage::ExtractOsm => self.extract_osm()?,
                Stage::ExtractBast => self.extract_bast()?,
                Stage::Match => self.match_bridges()?,
                Stage::Estimate => self.estimate()?,
                Stage::Train => self.train()?,
                Stage::Export => self.export()?,
            }
        }
        Ok(())
    }

    pub fn extract_osm(&self) -> Result<()> {
        let path = self.config.osm_document();
        log::info!("Parsing {}...", path.display());

        let extractor = OsmExtractor;
        let extracted = extractor.extract(File::open(&path)?)?;
        extracted.stats.log(extractor.name());

        write_snapshot(&extracted.records, &self.config.osm_snapshot())
    }

    pub fn extract_bast(&self) -> Result<()> {
        self.extract_bast_with(UtmZone32N::new()?)
    }

    pub fn extract_bast_with<P: Reprojector>(&self, reprojector: P) -> Result<()> {
        let raw = fetch_bast(self.config)?;

        let extractor = BastExtractor::new(reprojector);
        let extracted = extractor.extract(raw.as_slice())?;
        extracted.stats.log(extractor.name());

        write_snapshot(&extracted.records, &self.config.bast_snapshot())
    }

    pub fn match_bridges(&self) -> Result<()> {
        let ways: Vec<WayRecord> = read_snapshot(&self.config.osm_snapshot())?;
        let bridges: Vec<BridgeRecord> = read_snapshot(&self.config.bast_snapshot())?;

        let bar = self.progress_bar("Matching ways");
        let matched = match_ways(&ways, &bridges, &bar);

        write_snapshot(&matched, &self.config.matched_snapshot())
    }

    pub fn estimate(&self) -> Result<()> {
        let matched: Vec<MatchedWay> = read_snapshot(&self.config.matched_snapshot())?;
        let obstacles = estimate(matched);
        write_snapshot(&obstacles, &self.config.obstacle_snapshot())
    }

    pub fn train(&self) -> Result<()> {
        let ways: Vec<WayRecord> = read_snapshot(&self.config.osm_snapshot())?;

        let bar = self.progress_bar("Training epochs");
        let estimator = train(&ways, &self.config.training, &bar)?;
        let predictions = predict_all(&estimator, &ways);

        write_snapshot(&predictions, &self.config.prediction_snapshot())
    }

    pub fn export(&self) -> Result<()> {
        let obstacles: Vec<ObstacleRecord> = read_snapshot(&self.config.obstacle_snapshot())?;
        let predictions: Vec<WidthPrediction> =
            read_snapshot(&self.config.prediction_snapshot())?;

        let total = obstacles.len();
        let merged = merge(obstacles, &predictions);
        if merged.len() < total {
            log::warn!(
                "{} obstacles had no learned prediction and were left out",
                total - merged.len()
            );
        }

        let rows: Vec<(WayId, ExportRow)> = merged
            .iter()
            .map(|(id, row)| (*id, row.clone()))
            .collect();
        write_snapshot(&rows, &self.config.merged_snapshot())?;
        write_export(&merged, &self.config.export_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::error::Error;
    use crate::model::BridgeKey;
    use geo::Point;
    use indicatif::ProgressDrawTarget;
    use std::fs;
    use tempfile::tempdir;

    /// Test tables carry lon/lat directly in `x_y`.
    struct AlreadyWgs84;

    impl Reprojector for AlreadyWgs84 {
        fn to_wgs84(&self, _points: &mut [Point]) -> Result<()> {
            Ok(())
        }
    }

    const OSM_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <way id="1">
    <bounds minlat="50.0" minlon="8.0" maxlat="50.0" maxlon="8.0"/>
    <tag k="highway" v="primary"/>
    <tag k="lanes" v="2"/>
    <tag k="name" v="Frankfurter Straße"/>
    <tag k="width" v="7 m"/>
  </way>
  <way id="2">
    <bounds minlat="50.0" minlon="8.01" maxlat="50.0" maxlon="8.01"/>
    <tag k="highway" v="residential"/>
    <tag k="width" v="4,5"/>
  </way>
  <way id="3">
    <tag k="highway" v="service"/>
  </way>
</osm>
"#;

    const BAST_TABLE: &str = "bwnr;tbwnr;bauwerksname;ort;hoechst_sachverhalt_oben;hoechst_sachverhalt_unten;laenge;flaeche;x_y\n\
        5817;A;Talbrücke Nidda;Bad Vilbel; O:  B 3; U:  Nidda;20;240;POINT (8.0 50.0)\n\
        5818;0;Feldwegbrücke;Bad Vilbel; O:  K 1; U:  Gehweg;10;50;POINT (8.5 50.5)\n";

    fn config(dir: &std::path::Path) -> Config {
        let mut config = Config::with_data_dir(dir);
        config.training = TrainingConfig {
            hidden_layers: vec![4],
            epochs: 5,
            batch_size: 2,
            ..TrainingConfig::default()
        };
        config
    }

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn stages_produce_export_keyed_by_way() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        fs::write(config.osm_document(), OSM_DOCUMENT).unwrap();
        let latin1: Vec<u8> = BAST_TABLE.chars().map(|c| c as u32 as u8).collect();
        fs::write(config.bast_raw(), latin1).unwrap();

        let pipeline = Pipeline::new(&config, hidden());
        pipeline.extract_osm().unwrap();
        pipeline.extract_bast_with(AlreadyWgs84).unwrap();
        pipeline
            .run(&[Stage::Match, Stage::Estimate, Stage::Train, Stage::Export])
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(config.export_json()).unwrap()).unwrap();
        let rows = json.as_object().unwrap();
        assert_eq!(rows.len(), 2);

        let near = &rows["1"];
        assert_eq!(near["bast_width"], 12.0);
        assert_eq!(near["osm_width"], 7.0);
        assert_eq!(near["est_width"], 7.0);
        assert_eq!(near["bwnr_tbwnr"], "5817A");
        assert_eq!(near["bast_name"], "Talbrücke Nidda");
        assert_eq!(near["osm_name"], "Frankfurter Straße");
        assert!(near["nn_width"].is_f64());

        let far = &rows["2"];
        assert!(far["bast_width"].is_null());
        assert!(far["bwnr_tbwnr"].is_null());
        assert_eq!(far["osm_width"], 4.5);
        assert!(far["est_width"].is_null());

        let merged: Vec<(WayId, ExportRow)> = read_snapshot(&config.merged_snapshot()).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].1.bwnr_tbwnr, Some(BridgeKey("5817A".to_string())));
    }

    #[test]
    fn stage_without_upstream_snapshot_fails() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let pipeline = Pipeline::new(&config, hidden());

        let err = pipeline.run(&[Stage::Estimate]).unwrap_err();
        assert!(matches!(err, Error::MissingSnapshot(_)));
    }

    #[test]
    fn merge_is_an_inner_join_on_way_id() {
        let obstacle = |id| ObstacleRecord {
            id,
            bast_width: None,
            osm_width: None,
            est_width: Some(2.5),
            bwnr_tbwnr: None,
            bast_name: None,
            osm_name: None,
        };
        let predictions = vec![
            WidthPrediction {
                id: 3,
                nn_width: 2.0,
            },
            WidthPrediction {
                id: 9,
                nn_width: 5.0,
            },
        ];

        let merged = merge(vec![obstacle(3), obstacle(4)], &predictions);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[&3].nn_width, 2.0);
        assert_eq!(merged[&3].est_width, Some(2.5));
    }
}
