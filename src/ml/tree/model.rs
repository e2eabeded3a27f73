use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{MAX_SUPPORTED_DEPTH, ModelIoError, TreeError};

/// Artifact format version written by this crate.
pub const MODEL_VERSION: i64 = 1;

/// A node of a binary decision tree.
///
/// Each split exclusively owns its two children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Internal node routing `value < threshold` left and everything else right.
    Split {
        feature_index: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// Terminal node holding the mean training label that reached it.
    Leaf { probability: f64 },
}

impl Node {
    pub fn leaf(probability: f64) -> Self {
        Node::Leaf { probability }
    }

    pub fn split(feature_index: usize, threshold: f64, left: Node, right: Node) -> Self {
        Node::Split {
            feature_index,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Trained decision tree plus the metadata needed to use it safely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Artifact format version.
    pub model_version: i64,
    /// Feature layout version the tree was trained against.
    pub feat_version: i64,
    /// Number of features per input vector.
    pub feature_len: usize,
    /// Depth limit used during training.
    pub max_depth: usize,
    /// Leaf size limit used during training.
    pub min_leaf_size: usize,
    pub root: Node,
}

impl DecisionTree {
    /// Walk the tree for a single feature vector and return the leaf probability.
    ///
    /// Fails only if a split references a feature beyond `features.len()`,
    /// which means the tree and feature layout do not belong together.
    pub fn predict(&self, features: &[f64]) -> Result<f64, TreeError> {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { probability } => return Ok(*probability),
                Node::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    let value =
                        features
                            .get(*feature_index)
                            .ok_or(TreeError::IndexOutOfRange {
                                index: *feature_index,
                                len: features.len(),
                            })?;
                    node = if *value < *threshold { &**left } else { &**right };
                }
            }
        }
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            match node {
                Node::Leaf { .. } => count += 1,
                Node::Split { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        count
    }

    /// Depth of the tree counting split levels (a root-only leaf has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }

    /// Validate structural invariants of the tree.
    pub fn validate(&self) -> Result<(), String> {
        if self.model_version != MODEL_VERSION {
            return Err(format!(
                "Unsupported model_version {} (expected {MODEL_VERSION})",
                self.model_version
            ));
        }
        if self.feature_len == 0 {
            return Err("feature_len must be > 0".to_string());
        }
        if self.depth() > MAX_SUPPORTED_DEPTH {
            return Err(format!("Tree deeper than {MAX_SUPPORTED_DEPTH} levels"));
        }
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            match node {
                Node::Leaf { probability } => {
                    if !probability.is_finite() || !(0.0..=1.0).contains(probability) {
                        return Err(format!("Leaf probability {probability} outside [0, 1]"));
                    }
                }
                Node::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature_index >= self.feature_len {
                        return Err(format!(
                            "Split feature_index {feature_index} out of range for {} features",
                            self.feature_len
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("Split threshold {threshold} is not finite"));
                    }
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        Ok(())
    }

    /// Load a tree from a JSON file and validate it.
    pub fn load_json(path: &Path) -> Result<Self, ModelIoError> {
        let bytes = std::fs::read(path).map_err(|source| ModelIoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let tree = Self::from_json_slice(&bytes)?;
        tracing::info!(
            "Loaded decision tree from {} ({} leaves, depth {})",
            path.display(),
            tree.leaf_count(),
            tree.depth()
        );
        Ok(tree)
    }

    /// Parse and validate a tree from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ModelIoError> {
        let tree: Self = serde_json::from_slice(bytes)?;
        tree.validate().map_err(ModelIoError::Invalid)?;
        Ok(tree)
    }

    /// Write the tree as pretty-printed JSON, creating parent directories.
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
