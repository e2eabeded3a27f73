//! TOML configuration for training and serving.
//!
//! The file lives at `config.toml` in the app directory. A missing file means
//! defaults. Unknown keys are rejected.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::{self, AppDirError};
use crate::dataset::LoadOptions;
use crate::ml::tree::{MAX_SUPPORTED_DEPTH, TrainOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    pub training: TrainingConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub max_depth: usize,
    pub min_leaf_size: usize,
    /// Share of each class held out for evaluation.
    pub test_fraction: f64,
    /// Seed string for the hashed holdout split.
    pub seed: String,
    /// Probability at or above which a prediction counts as positive.
    pub decision_threshold: f64,
    pub deduplicate: bool,
    pub target_column: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let tree = TrainOptions::default();
        Self {
            max_depth: tree.max_depth,
            min_leaf_size: tree.min_leaf_size,
            test_fraction: 0.2,
            seed: "cardiorisk-holdout-v1".to_string(),
            decision_threshold: 0.5,
            deduplicate: true,
            target_column: "cardio".to_string(),
        }
    }
}

impl TrainingConfig {
    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            max_depth: self.max_depth,
            min_leaf_size: self.min_leaf_size,
            ..TrainOptions::default()
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            target_column: self.target_column.clone(),
            deduplicate: self.deduplicate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Where the trained tree is written and read.
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/cardio_model.json"),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let training = &self.training;
        if !(1..=MAX_SUPPORTED_DEPTH).contains(&training.max_depth) {
            return Err(ConfigError::Invalid(format!(
                "training.max_depth must be in 1..={MAX_SUPPORTED_DEPTH}, got {}",
                training.max_depth
            )));
        }
        if training.min_leaf_size < 1 {
            return Err(ConfigError::Invalid(
                "training.min_leaf_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&training.test_fraction) {
            return Err(ConfigError::Invalid(format!(
                "training.test_fraction must be in [0, 1), got {}",
                training.test_fraction
            )));
        }
        if !(0.0..=1.0).contains(&training.decision_threshold) {
            return Err(ConfigError::Invalid(format!(
                "training.decision_threshold must be in [0, 1], got {}",
                training.decision_threshold
            )));
        }
        if training.target_column.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "training.target_column must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Path of the app-level `config.toml`.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::config_file()?)
}

/// Load the app-level config, falling back to defaults when the file is absent.
pub fn load_or_default() -> Result<RiskConfig, ConfigError> {
    load_from(&config_path()?)
}

/// Load and validate a config file. A missing file yields defaults.
pub fn load_from(path: &Path) -> Result<RiskConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(RiskConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: RiskConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}
