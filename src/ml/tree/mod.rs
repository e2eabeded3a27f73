//! Binary decision-tree classifier trained from scratch.
//!
//! The tree is grown greedily by minimizing weighted Gini impurity over a
//! percentile-sampled set of candidate thresholds. Leaves store the mean
//! training label, so predictions are probabilities rather than hard classes.
//! Trees round-trip through JSON without loss.

mod model;
mod train;

pub use model::{DecisionTree, MODEL_VERSION, Node};
pub use train::{
    ClassCounts, DISTINCT_VALUE_CUTOVER, PERCENTILE_POINTS, TrainOptions, build_tree,
    candidate_thresholds, gini_index, training_gini,
};

use std::path::PathBuf;

use thiserror::Error;

/// Deepest tree the builder will grow; keeps recursion and JSON nesting bounded.
pub const MAX_SUPPORTED_DEPTH: usize = 64;

/// Errors raised while building or evaluating a tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The training matrix or options violate a precondition.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A split referenced a feature the input vector does not have.
    #[error("feature index {index} out of range for vector of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Errors raised while reading or writing a model artifact.
#[derive(Debug, Error)]
pub enum ModelIoError {
    #[error("Failed to read model {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write model {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid model: {0}")]
    Invalid(String),
}
