//! Evaluation metrics for the binary risk classifier.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, ModelIoError, TreeError, training_gini};

/// Train/test accuracy gap above which a model is reported as overfitting.
pub const OVERFIT_GAP: f32 = 0.1;
/// Accuracy below which (on both splits) a model is reported as underfitting.
pub const UNDERFIT_ACCURACY: f32 = 0.6;

/// Confusion matrix for a two-class classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: u32,
    pub true_negative: u32,
    pub false_positive: u32,
    pub false_negative: u32,
}

impl ConfusionMatrix {
    pub fn add(&mut self, truth: bool, predicted: bool) {
        let slot = match (truth, predicted) {
            (true, true) => &mut self.true_positive,
            (false, false) => &mut self.true_negative,
            (false, true) => &mut self.false_positive,
            (true, false) => &mut self.false_negative,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u32 {
        self.true_positive + self.true_negative + self.false_positive + self.false_negative
    }
}

/// Headline classification scores derived from a [`ConfusionMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub accuracy: f32,
    /// `TP / (TP + FP)`, or 0 when nothing was predicted positive.
    pub precision: f32,
    /// `TP / (TP + FN)`, or 0 when there are no positives.
    pub recall: f32,
    pub f1: f32,
}

impl From<&ConfusionMatrix> for BinaryMetrics {
    fn from(cm: &ConfusionMatrix) -> Self {
        let tp = cm.true_positive as f32;
        let tn = cm.true_negative as f32;
        let fp = cm.false_positive as f32;
        let fn_ = cm.false_negative as f32;
        let total = cm.total() as f32;
        let accuracy = if total == 0.0 { 0.0 } else { (tp + tn) / total };
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self {
            accuracy,
            precision,
            recall,
            f1,
        }
    }
}

/// Coarse verdict comparing train and test accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitDiagnosis {
    Overfitting,
    Underfitting,
    WellFitted,
}

impl FitDiagnosis {
    pub fn assess(train_accuracy: f32, test_accuracy: f32) -> Self {
        if train_accuracy - test_accuracy > OVERFIT_GAP {
            FitDiagnosis::Overfitting
        } else if train_accuracy < UNDERFIT_ACCURACY && test_accuracy < UNDERFIT_ACCURACY {
            FitDiagnosis::Underfitting
        } else {
            FitDiagnosis::WellFitted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FitDiagnosis::Overfitting => "Model is Overfitting",
            FitDiagnosis::Underfitting => "Model is Underfitting",
            FitDiagnosis::WellFitted => "Model is Well-Fitted",
        }
    }
}

/// Threshold tree probabilities over labeled rows (label in the last column).
pub fn evaluate(
    tree: &DecisionTree,
    rows: &[Vec<f64>],
    decision_threshold: f64,
) -> Result<ConfusionMatrix, TreeError> {
    let mut cm = ConfusionMatrix::default();
    for row in rows {
        let Some((label, features)) = row.split_last() else {
            continue;
        };
        let probability = tree.predict(features)?;
        cm.add(*label == 1.0, probability >= decision_threshold);
    }
    Ok(cm)
}

/// Serialized evaluation snapshot written next to a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub decision_threshold: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train: SplitReport,
    pub test: SplitReport,
    pub diagnosis: FitDiagnosis,
    pub training_gini: f64,
    pub leaf_count: usize,
    pub depth: usize,
}

impl ModelReport {
    /// Evaluate `tree` on both sides of a holdout split.
    ///
    /// With an empty test side the diagnosis compares training accuracy with
    /// itself and never reports overfitting.
    pub fn build(
        tree: &DecisionTree,
        train_rows: &[Vec<f64>],
        test_rows: &[Vec<f64>],
        decision_threshold: f64,
    ) -> Result<Self, TreeError> {
        let train = SplitReport::from(evaluate(tree, train_rows, decision_threshold)?);
        let test = SplitReport::from(evaluate(tree, test_rows, decision_threshold)?);
        let test_accuracy = if test_rows.is_empty() {
            train.metrics.accuracy
        } else {
            test.metrics.accuracy
        };
        Ok(Self {
            decision_threshold,
            train_rows: train_rows.len(),
            test_rows: test_rows.len(),
            diagnosis: FitDiagnosis::assess(train.metrics.accuracy, test_accuracy),
            training_gini: training_gini(tree, train_rows)?,
            leaf_count: tree.leaf_count(),
            depth: tree.depth(),
            train,
            test,
        })
    }

    /// `cardio_model.json` reports to `cardio_model.metrics.json`.
    pub fn path_for_model(model_path: &Path) -> PathBuf {
        model_path.with_extension("metrics.json")
    }

    pub fn save_json(&self, path: &Path) -> Result<(), ModelIoError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ModelIoError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes).map_err(|source| ModelIoError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitReport {
    pub metrics: BinaryMetrics,
    pub confusion: ConfusionMatrix,
}

impl From<ConfusionMatrix> for SplitReport {
    fn from(confusion: ConfusionMatrix) -> Self {
        Self {
            metrics: BinaryMetrics::from(&confusion),
            confusion,
        }
    }
}
