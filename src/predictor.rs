//! Serving-side prediction: the process-wide active model and the request path.
//!
//! The active tree is published as a whole `Arc` under a lock. Readers clone
//! the `Arc` and keep using that tree even if a retrained one is installed
//! meanwhile, so no caller ever sees a partially built model.

use std::path::Path;
use std::sync::{Arc, LazyLock, RwLock};

use thiserror::Error;

use crate::features::{ClinicalRecord, FEATURE_LEN, FEATURE_VERSION, FeatureVector, RawInputs};
use crate::ml::tree::{DecisionTree, ModelIoError, TreeError};
use crate::risk::PredictionResponse;

static ACTIVE_MODEL: LazyLock<RwLock<Option<Arc<DecisionTree>>>> =
    LazyLock::new(|| RwLock::new(None));

/// Errors raised while serving predictions.
#[derive(Debug, Error)]
pub enum PredictError {
    /// No model has been loaded or installed yet.
    #[error("No model loaded")]
    NoModel,
    /// The model was trained for a different feature layout.
    #[error(
        "Model expects feat_version {found_version} with {found_len} features (need {expected_version} with {expected_len})",
        expected_version = FEATURE_VERSION,
        expected_len = FEATURE_LEN
    )]
    IncompatibleModel { found_version: i64, found_len: usize },
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Model(#[from] ModelIoError),
}

/// Replace the process-wide model, returning the handle now being served.
pub fn install_model(tree: DecisionTree) -> Result<Arc<DecisionTree>, PredictError> {
    ensure_compatible(&tree)?;
    let tree = Arc::new(tree);
    let mut guard = ACTIVE_MODEL.write().unwrap_or_else(|err| err.into_inner());
    *guard = Some(Arc::clone(&tree));
    tracing::info!(
        "Installed decision tree ({} leaves, depth {})",
        tree.leaf_count(),
        tree.depth()
    );
    Ok(tree)
}

/// Load a model artifact from disk and make it the active model.
pub fn load_model(path: &Path) -> Result<Arc<DecisionTree>, PredictError> {
    let tree = DecisionTree::load_json(path)?;
    install_model(tree)
}

/// Current active model, if any.
pub fn active_model() -> Option<Arc<DecisionTree>> {
    ACTIVE_MODEL
        .read()
        .unwrap_or_else(|err| err.into_inner())
        .clone()
}

/// Score a raw request against the active model.
pub fn predict(raw: &RawInputs) -> Result<PredictionResponse, PredictError> {
    let tree = active_model().ok_or(PredictError::NoModel)?;
    RiskPredictor::new(tree)?.predict(raw)
}

/// Prediction entry point bound to one immutable tree.
#[derive(Debug, Clone)]
pub struct RiskPredictor {
    tree: Arc<DecisionTree>,
}

impl RiskPredictor {
    pub fn new(tree: Arc<DecisionTree>) -> Result<Self, PredictError> {
        ensure_compatible(&tree)?;
        Ok(Self { tree })
    }

    /// Derive features, walk the tree, and build the response.
    pub fn predict(&self, raw: &RawInputs) -> Result<PredictionResponse, PredictError> {
        let record = ClinicalRecord::from_raw(raw);
        let features = FeatureVector::from_record(&record);
        tracing::debug!("Prediction requested. Input features: {:?}", features.as_slice());
        let probability = self.tree.predict(features.as_slice())?;
        Ok(PredictionResponse::new(probability, &record))
    }
}

fn ensure_compatible(tree: &DecisionTree) -> Result<(), PredictError> {
    if tree.feat_version != FEATURE_VERSION || tree.feature_len != FEATURE_LEN {
        return Err(PredictError::IncompatibleModel {
            found_version: tree.feat_version,
            found_len: tree.feature_len,
        });
    }
    Ok(())
}
