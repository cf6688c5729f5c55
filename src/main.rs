use bridge_width::config::{BAST_URL, Config, DATA_DIR, OVERPASS_URL, PUBLIC_DIR, TrainingConfig};
use bridge_width::error::Result;
use bridge_width::pipeline::{ALL_STAGES, Pipeline, Stage};
use clap::{Args, Parser, Subcommand};
use indicatif::MultiProgress;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bridge-width",
    about = "Estimate the width of bridges and other obstacles on German roads"
)]
struct Cli {
    /// Directory holding downloads and stage snapshots
    #[arg(long, global = true, default_value = DATA_DIR)]
    data_dir: PathBuf,
    /// Directory the final obstacle_data.json is written to
    #[arg(long, global = true, default_value = PUBLIC_DIR)]
    public_dir: PathBuf,
    #[arg(long, global = true, default_value = OVERPASS_URL)]
    overpass_url: String,
    #[arg(long, global = true, default_value = BAST_URL)]
    bast_url: String,
    #[arg(long, global = true, default_value_t = 6000)]
    http_timeout_secs: u64,
    #[command(flatten)]
    training: TrainingArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TrainingArgs {
    /// Sizes of the hidden layers of the width network
    #[arg(long, global = true, value_delimiter = ',', default_values_t = [30, 25, 20, 15, 10, 5])]
    hidden_layers: Vec<usize>,
    #[arg(long, global = true, default_value_t = 500)]
    epochs: usize,
    #[arg(long, global = true, default_value_t = 16)]
    batch_size: usize,
    #[arg(long, global = true, default_value_t = 0.001)]
    learning_rate: f64,
    #[arg(long, global = true, default_value_t = 42)]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Query Overpass for all bridge ways in Germany
    FetchOsm,
    /// Extract way records from the downloaded OSM document
    ExtractOsm,
    /// Download and normalize the BASt bridge statistics
    ExtractBast,
    /// Attach the nearest BASt bridge to every way
    Match,
    /// Prune unreliable matches and estimate widths from tags
    Estimate,
    /// Train the width network and predict a width for every way
    Train,
    /// Merge heuristic and learned widths into obstacle_data.json
    Export,
    /// Run every stage in order
    Run {
        /// Reuse the existing OSM document instead of querying Overpass
        #[arg(long)]
        skip_fetch: bool,
    },
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            data_dir: self.data_dir.clone(),
            public_dir: self.public_dir.clone(),
            overpass_url: self.overpass_url.clone(),
            bast_url: self.bast_url.clone(),
            http_timeout_secs: self.http_timeout_secs,
            training: TrainingConfig {
                hidden_layers: self.training.hidden_layers.clone(),
                epochs: self.training.epochs,
                batch_size: self.training.batch_size,
                learning_rate: self.training.learning_rate,
                seed: self.training.seed,
                ..TrainingConfig::default()
            },
        }
    }

    fn stages(&self) -> Vec<Stage> {
        match self.command {
            Commands::FetchOsm => vec![Stage::FetchOsm],
            Commands::ExtractOsm => vec![Stage::ExtractOsm],
            Commands::ExtractBast => vec![Stage::ExtractBast],
            Commands::Match => vec![Stage::Match],
            Commands::Estimate => vec![Stage::Estimate],
            Commands::Train => vec![Stage::Train],
            Commands::Export => vec![Stage::Export],
            Commands::Run { skip_fetch } => ALL_STAGES
                .into_iter()
                .filter(|stage| !(skip_fetch && *stage == Stage::FetchOsm))
                .collect(),
        }
    }
}

/// Routes `log` through `pretty_env_logger` without tearing progress bars.
fn init_logging() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // only fails if a logger is already installed
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();
    log::set_max_level(level);

    multi
}

fn run(cli: &Cli, multi: MultiProgress) -> Result<()> {
    let config = cli.config();
    let stages = cli.stages();
    Pipeline::new(&config, multi).run(&stages)?;

    log::info!("Done");
    Ok(())
}

fn main() {
    let multi = init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(&cli, multi) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
