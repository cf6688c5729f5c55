//! Learned width estimator.
//!
//! A small feed-forward network is fit on the ways that carry a `width` tag,
//! using their categorical tags as one-hot input and minimizing the mean
//! absolute percentage error. The fitted network then predicts a width for
//! every way, tagged or not.

pub mod encoding;
pub mod network;

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::model::{WayRecord, WidthPrediction};
use encoding::{OneHotEncoder, feature_row};
use indicatif::ProgressBar;
use network::{Network, mape};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

pub struct TrainedEstimator {
    encoder: OneHotEncoder,
    network: Network,
    pub validation_mape: Option<f64>,
}

impl TrainedEstimator {
    pub fn predict(&self, way: &WayRecord) -> f64 {
        let hot = self.encoder.encode(&feature_row(way));
        self.network.predict(&hot)
    }
}

/// Fits the network on every way with a tagged width.
pub fn train(
    ways: &[WayRecord],
    config: &TrainingConfig,
    progress: &ProgressBar,
) -> Result<TrainedEstimator> {
    let tagged: Vec<(&WayRecord, f64)> = ways
        .iter()
        .filter_map(|way| way.width.map(|width| (way, width)))
        .collect();
    if tagged.is_empty() {
        return Err(Error::InvalidData(
            "no way carries a width tag to train on".to_string(),
        ));
    }
    if config.batch_size == 0 {
        return Err(Error::InvalidData("batch size must be positive".to_string()));
    }

    let rows: Vec<Vec<&str>> = tagged.iter().map(|(way, _)| feature_row(way)).collect();
    let targets: Vec<f64> = tagged.iter().map(|(_, width)| *width).collect();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.shuffle(&mut rng);
    let validation_len = (rows.len() as f64 * config.validation_split).round() as usize;
    let validation_len = validation_len.min(rows.len().saturating_sub(1));
    let (validation, training) = order.split_at(validation_len);

    // categories only seen in validation rows count as unknown, as they will
    // for any way the network never saw
    let training_rows: Vec<Vec<&str>> = training.iter().map(|&i| rows[i].clone()).collect();
    let encoder = OneHotEncoder::fit(&training_rows);
    let encoded: Vec<Vec<usize>> = rows.iter().map(|row| encoder.encode(row)).collect();

    log::info!(
        "Training on {} ways ({} held out), {} one-hot inputs",
        training.len(),
        validation.len(),
        encoder.width()
    );

    let mut network = Network::new(encoder.width(), &config.hidden_layers, &mut rng);
    let mut shuffled = training.to_vec();

    progress.set_length(config.epochs as u64);
    for epoch in 0..config.epochs {
        shuffled.shuffle(&mut rng);
        let mut loss_sum = 0.0;
        let mut batches = 0u32;
        for chunk in shuffled.chunks(config.batch_size) {
            let batch: Vec<(&[usize], f64)> = chunk
                .iter()
                .map(|&i| (encoded[i].as_slice(), targets[i]))
                .collect();
            loss_sum += network.train_batch(&batch, config.learning_rate);
            batches += 1;
        }
        if epoch % 50 == 0 {
            log::debug!(
                "epoch {epoch}: training MAPE {:.2}%",
                loss_sum / f64::from(batches.max(1))
            );
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    let validation_mape = (!validation.is_empty()).then(|| {
        let predictions: Vec<f64> = validation
            .iter()
            .map(|&i| network.predict(&encoded[i]))
            .collect();
        let expected: Vec<f64> = validation.iter().map(|&i| targets[i]).collect();
        mape(&predictions, &expected)
    });
    if let Some(error) = validation_mape {
        log::info!("Validation MAPE {error:.2}%");
    }

    Ok(TrainedEstimator {
        encoder,
        network,
        validation_mape,
    })
}

/// Predicts a width for every way, including the untagged ones.
pub fn predict_all(estimator: &TrainedEstimator, ways: &[WayRecord]) -> Vec<WidthPrediction> {
    ways.par_iter()
        .map(|way| WidthPrediction {
            id: way.id,
            nn_width: estimator.predict(way),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::tests::way_at;

    fn tagged(id: i64, lanes: &str, width: Option<f64>) -> WayRecord {
        let mut way = way_at(id, 50.0, 8.0);
        way.tags.set("lanes", lanes.to_string());
        way.width = width;
        way
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            hidden_layers: vec![16],
            epochs: 300,
            batch_size: 4,
            learning_rate: 0.01,
            validation_split: 0.1,
            seed: 42,
        }
    }

    #[test]
    fn refuses_to_train_without_tagged_widths() {
        let ways = vec![tagged(1, "2", None)];
        let result = train(&ways, &small_config(), &ProgressBar::hidden());
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn predicts_for_every_way_including_untagged() {
        let mut ways = Vec::new();
        for id in 0..20 {
            ways.push(tagged(id, "1", Some(4.0)));
            ways.push(tagged(100 + id, "2", Some(7.0)));
        }
        ways.push(tagged(500, "2", None));
        ways.push(tagged(501, "9", None));

        let estimator = train(&ways, &small_config(), &ProgressBar::hidden()).unwrap();
        let predictions = predict_all(&estimator, &ways);

        assert_eq!(predictions.len(), ways.len());
        assert_eq!(predictions[40].id, 500);
        assert!(estimator.validation_mape.is_some());

        let one_lane = estimator.predict(&ways[0]);
        let two_lanes = estimator.predict(&ways[1]);
        assert!(two_lanes > one_lane);
        assert!((predictions[40].nn_width - two_lanes).abs() < 1e-12);
    }
}
