//! Library exports for the command-line tools, tests and benchmarks.
/// Application directory resolution.
pub mod app_dirs;
/// TOML configuration for training and serving.
pub mod config;
/// CSV ingestion and the holdout split.
pub mod dataset;
/// Clinical feature derivation.
pub mod features;
/// Logging initialization.
pub mod logging;
/// Decision tree training, inference and evaluation.
pub mod ml;
/// Active model management and prediction requests.
pub mod predictor;
/// Risk categories and contributing factors.
pub mod risk;
