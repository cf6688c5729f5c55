use std::path::PathBuf;

use thiserror::Error;

/// Fatal pipeline errors. Missing values are modelled as `Option` and
/// filtered rows are tallied in [`crate::parsers::ExtractStats`]; neither
/// ends up here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not set up projection: {0}")]
    ProjCreate(#[from] proj::ProjCreateError),
    #[error("Projection failed: {0}")]
    Proj(#[from] proj::ProjError),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Snapshot {} not found, run the upstream stage first", .0.display())]
    MissingSnapshot(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
