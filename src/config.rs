use std::path::{Path, PathBuf};

pub const DATA_DIR: &str = "data";
pub const PUBLIC_DIR: &str = "public";

pub const OVERPASS_URL: &str = "http://overpass-api.de/api/interpreter";
pub const BAST_URL: &str = "https://www.bast.de/DE/Statistik/Bruecken/Brueckenstatistik-csv.csv?__blob=publicationFile&v=7";

pub const OSM_DOCUMENT: &str = "export.osm";
pub const BAST_RAW: &str = "bast_raw.csv";
pub const OSM_SNAPSHOT: &str = "extracted_osm_data.json.gz";
pub const BAST_SNAPSHOT: &str = "bast_bridge_data.json.gz";
pub const MATCHED_SNAPSHOT: &str = "comb_df.json.gz";
pub const OBSTACLE_SNAPSHOT: &str = "obstacle_data.json.gz";
pub const PREDICTION_SNAPSHOT: &str = "nn_est.json.gz";
pub const MERGED_SNAPSHOT: &str = "obstacle_data_nn.json.gz";
pub const EXPORT_JSON: &str = "obstacle_data.json";

/// Hyper-parameters of the learned width estimator.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub hidden_layers: Vec<usize>,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_split: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            hidden_layers: vec![30, 25, 20, 15, 10, 5],
            epochs: 500,
            batch_size: 16,
            learning_rate: 0.001,
            validation_split: 0.1,
            seed: 42,
        }
    }
}

/// Where every stage reads and writes, plus the remote sources.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub public_dir: PathBuf,
    pub overpass_url: String,
    pub bast_url: String,
    pub http_timeout_secs: u64,
    pub training: TrainingConfig,
}

impl Config {
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Config {
            data_dir: data_dir.to_path_buf(),
            public_dir: data_dir.join(PUBLIC_DIR),
            overpass_url: OVERPASS_URL.to_string(),
            bast_url: BAST_URL.to_string(),
            http_timeout_secs: 6000,
            training: TrainingConfig::default(),
        }
    }

    pub fn osm_document(&self) -> PathBuf {
        self.data_dir.join(OSM_DOCUMENT)
    }

    pub fn bast_raw(&self) -> PathBuf {
        self.data_dir.join(BAST_RAW)
    }

    pub fn osm_snapshot(&self) -> PathBuf {
        self.data_dir.join(OSM_SNAPSHOT)
    }

    pub fn bast_snapshot(&self) -> PathBuf {
        self.data_dir.join(BAST_SNAPSHOT)
    }

    pub fn matched_snapshot(&self) -> PathBuf {
        self.data_dir.join(MATCHED_SNAPSHOT)
    }

    pub fn obstacle_snapshot(&self) -> PathBuf {
        self.data_dir.join(OBSTACLE_SNAPSHOT)
    }

    pub fn prediction_snapshot(&self) -> PathBuf {
        self.data_dir.join(PREDICTION_SNAPSHOT)
    }

    pub fn merged_snapshot(&self) -> PathBuf {
        self.data_dir.join(MERGED_SNAPSHOT)
    }

    pub fn export_json(&self) -> PathBuf {
        self.public_dir.join(EXPORT_JSON)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Config::with_data_dir(Path::new(DATA_DIR));
        config.public_dir = PathBuf::from(PUBLIC_DIR);
        config
    }
}
