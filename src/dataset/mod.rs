//! Training data ingestion: CSV loading and the deterministic holdout split.

use std::path::PathBuf;

use thiserror::Error;

mod loader;
mod split;

pub use loader::{LoadOptions, LoadedDataset, load_csv, parse_csv};
pub use split::{SplitIndices, stratified_split};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required column '{0}'")]
    MissingColumn(String),
    #[error("Line {line}: column '{column}' has non-numeric value '{value}'")]
    Parse {
        line: u64,
        column: String,
        value: String,
    },
    #[error("Line {line}: label must be 0 or 1, got {value}")]
    InvalidLabel { line: u64, value: f64 },
    #[error("Dataset has no rows")]
    Empty,
    #[error("Test fraction must be in [0, 1), got {0}")]
    InvalidSplit(f64),
}
