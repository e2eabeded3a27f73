use std::collections::BTreeMap;
use std::time::Instant;

use super::model::{DecisionTree, MODEL_VERSION, Node};
use super::{MAX_SUPPORTED_DEPTH, TreeError};
use crate::features::FEATURE_VERSION;

/// Columns with at most this many distinct values try every distinct value as a threshold.
pub const DISTINCT_VALUE_CUTOVER: usize = 10;

/// Percentiles tried as thresholds for columns above the cutover: 2, 4, ..., 98.
pub const PERCENTILE_POINTS: usize = 49;

/// Training hyperparameters for tree growth.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Maximum depth, counting the root split as depth 1.
    pub max_depth: usize,
    /// Groups with at most this many rows become leaves.
    pub min_leaf_size: usize,
    /// Feature layout version recorded in the model.
    pub feat_version: i64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            max_depth: 12,
            min_leaf_size: 50,
            feat_version: FEATURE_VERSION,
        }
    }
}

/// Label tallies for one group of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub total: usize,
    pub positives: usize,
}

impl ClassCounts {
    fn add(&mut self, label: f64) {
        self.total += 1;
        if label == 1.0 {
            self.positives += 1;
        }
    }
}

/// Weighted Gini impurity of a partition: `sum(|g|/N * (1 - sum_c p(c|g)^2))`.
///
/// Empty groups contribute nothing.
pub fn gini_index(groups: &[ClassCounts]) -> f64 {
    let n_instances: usize = groups.iter().map(|g| g.total).sum();
    if n_instances == 0 {
        return 0.0;
    }
    let n_instances = n_instances as f64;
    let mut gini = 0.0;
    for group in groups {
        if group.total == 0 {
            continue;
        }
        let size = group.total as f64;
        let p_neg = (group.total - group.positives) as f64 / size;
        let p_pos = group.positives as f64 / size;
        let score = p_neg * p_neg + p_pos * p_pos;
        gini += (1.0 - score) * (size / n_instances);
    }
    gini
}

/// Candidate split thresholds for one column of a row group.
///
/// Returns the sorted distinct values when there are at most
/// [`DISTINCT_VALUE_CUTOVER`] of them, otherwise the 2nd..98th percentiles in
/// steps of two, interpolated linearly between closest ranks.
pub fn candidate_thresholds(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut distinct = sorted.clone();
    distinct.dedup();
    if distinct.len() <= DISTINCT_VALUE_CUTOVER {
        return distinct;
    }
    (1..=PERCENTILE_POINTS)
        .map(|step| percentile_linear(&sorted, (2 * step) as f64))
        .collect()
}

fn percentile_linear(sorted: &[f64], percent: f64) -> f64 {
    let n = sorted.len();
    let q = percent / 100.0;
    let virtual_index = n as f64 * q + (1.0 - q) - 1.0;
    let floor = virtual_index.floor();
    let lower = if floor <= 0.0 {
        0
    } else {
        (floor as usize).min(n - 1)
    };
    let upper = (lower + 1).min(n - 1);
    let gamma = virtual_index - floor;
    lerp(sorted[lower], sorted[upper], gamma)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    let diff = b - a;
    if t >= 0.5 {
        b - diff * (1.0 - t)
    } else {
        a + diff * t
    }
}

/// Grow a decision tree from a training matrix whose last column is a 0/1 label.
pub fn build_tree(rows: &[Vec<f64>], options: &TrainOptions) -> Result<DecisionTree, TreeError> {
    validate_options(options)?;
    let width = validate_matrix(rows)?;
    let matrix = Matrix {
        rows,
        n_features: width - 1,
    };

    let started = Instant::now();
    tracing::info!(
        "Growing decision tree on {} rows x {} features (max_depth={}, min_leaf_size={})",
        rows.len(),
        matrix.n_features,
        options.max_depth,
        options.min_leaf_size
    );
    let indices: Vec<usize> = (0..rows.len()).collect();
    let root = build_subtree(&matrix, &indices, 1, options);
    let tree = DecisionTree {
        model_version: MODEL_VERSION,
        feat_version: options.feat_version,
        feature_len: matrix.n_features,
        max_depth: options.max_depth,
        min_leaf_size: options.min_leaf_size,
        root,
    };
    tracing::info!(
        "Decision tree grown in {:.2?}: {} leaves, depth {}",
        started.elapsed(),
        tree.leaf_count(),
        tree.depth()
    );
    Ok(tree)
}

/// Weighted Gini impurity of a tree's leaves over a labeled matrix.
///
/// Rows are grouped by the leaf they reach, so two leaves with equal
/// probability still count as separate groups.
pub fn training_gini(tree: &DecisionTree, rows: &[Vec<f64>]) -> Result<f64, TreeError> {
    let mut groups: BTreeMap<u128, ClassCounts> = BTreeMap::new();
    for row in rows {
        let (features, label) = row
            .split_last()
            .map(|(label, features)| (features, *label))
            .ok_or_else(|| TreeError::InvalidInput("empty row".to_string()))?;
        let leaf = leaf_position(tree, features)?;
        groups.entry(leaf).or_default().add(label);
    }
    let groups: Vec<ClassCounts> = groups.into_values().collect();
    Ok(gini_index(&groups))
}

/// Heap-style position of the reached leaf (root = 1, children 2i and 2i + 1).
fn leaf_position(tree: &DecisionTree, features: &[f64]) -> Result<u128, TreeError> {
    let mut node = &tree.root;
    let mut position: u128 = 1;
    loop {
        match node {
            Node::Leaf { .. } => return Ok(position),
            Node::Split {
                feature_index,
                threshold,
                left,
                right,
            } => {
                let value = features
                    .get(*feature_index)
                    .ok_or(TreeError::IndexOutOfRange {
                        index: *feature_index,
                        len: features.len(),
                    })?;
                if *value < *threshold {
                    position *= 2;
                    node = &**left;
                } else {
                    position = position * 2 + 1;
                    node = &**right;
                }
            }
        }
    }
}

fn validate_options(options: &TrainOptions) -> Result<(), TreeError> {
    if options.max_depth < 1 {
        return Err(TreeError::InvalidInput("max_depth must be >= 1".to_string()));
    }
    if options.max_depth > MAX_SUPPORTED_DEPTH {
        return Err(TreeError::InvalidInput(format!(
            "max_depth must be <= {MAX_SUPPORTED_DEPTH}"
        )));
    }
    if options.min_leaf_size < 1 {
        return Err(TreeError::InvalidInput(
            "min_leaf_size must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_matrix(rows: &[Vec<f64>]) -> Result<usize, TreeError> {
    let first = rows
        .first()
        .ok_or_else(|| TreeError::InvalidInput("training matrix has no rows".to_string()))?;
    let width = first.len();
    if width < 2 {
        return Err(TreeError::InvalidInput(format!(
            "training matrix needs at least 2 columns, got {width}"
        )));
    }
    for (idx, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(TreeError::InvalidInput(format!(
                "row {idx} has {} columns, expected {width}",
                row.len()
            )));
        }
        if let Some(col) = row.iter().position(|v| !v.is_finite()) {
            return Err(TreeError::InvalidInput(format!(
                "row {idx} column {col} is not finite"
            )));
        }
        let label = row[width - 1];
        if label != 0.0 && label != 1.0 {
            return Err(TreeError::InvalidInput(format!(
                "row {idx} label {label} is not 0 or 1"
            )));
        }
    }
    Ok(width)
}

struct Matrix<'a> {
    rows: &'a [Vec<f64>],
    n_features: usize,
}

impl Matrix<'_> {
    fn value(&self, row: usize, feature: usize) -> f64 {
        self.rows[row][feature]
    }

    fn label(&self, row: usize) -> f64 {
        self.rows[row][self.n_features]
    }

    fn mean_label(&self, indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        let sum: f64 = indices.iter().map(|&i| self.label(i)).sum();
        sum / indices.len() as f64
    }
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature_index: usize,
    threshold: f64,
}

fn build_subtree(matrix: &Matrix<'_>, indices: &[usize], depth: usize, options: &TrainOptions) -> Node {
    let Some(best) = find_best_split(matrix, indices) else {
        return Node::leaf(matrix.mean_label(indices));
    };
    let (left, right) = partition(matrix, indices, best);

    if left.is_empty() || right.is_empty() {
        let probability = matrix.mean_label(indices);
        return Node::split(
            best.feature_index,
            best.threshold,
            Node::leaf(probability),
            Node::leaf(probability),
        );
    }
    if depth >= options.max_depth {
        return Node::split(
            best.feature_index,
            best.threshold,
            Node::leaf(matrix.mean_label(&left)),
            Node::leaf(matrix.mean_label(&right)),
        );
    }
    Node::split(
        best.feature_index,
        best.threshold,
        grow_child(matrix, &left, depth, options),
        grow_child(matrix, &right, depth, options),
    )
}

fn grow_child(matrix: &Matrix<'_>, indices: &[usize], depth: usize, options: &TrainOptions) -> Node {
    if indices.len() <= options.min_leaf_size {
        Node::leaf(matrix.mean_label(indices))
    } else {
        build_subtree(matrix, indices, depth + 1, options)
    }
}

/// Scan every feature and candidate threshold; a candidate replaces the
/// incumbent only when its impurity is strictly lower.
fn find_best_split(matrix: &Matrix<'_>, indices: &[usize]) -> Option<BestSplit> {
    let mut best: Option<BestSplit> = None;
    let mut best_score = 1.0;
    let mut column = Vec::with_capacity(indices.len());
    for feature_index in 0..matrix.n_features {
        column.clear();
        column.extend(indices.iter().map(|&i| matrix.value(i, feature_index)));
        for threshold in candidate_thresholds(&column) {
            let mut left = ClassCounts::default();
            let mut right = ClassCounts::default();
            for (&row, &value) in indices.iter().zip(column.iter()) {
                if value < threshold {
                    left.add(matrix.label(row));
                } else {
                    right.add(matrix.label(row));
                }
            }
            let score = gini_index(&[left, right]);
            if score < best_score {
                best_score = score;
                best = Some(BestSplit {
                    feature_index,
                    threshold,
                });
            }
        }
    }
    best
}

fn partition(matrix: &Matrix<'_>, indices: &[usize], split: BestSplit) -> (Vec<usize>, Vec<usize>) {
    indices
        .iter()
        .partition(|&&i| matrix.value(i, split.feature_index) < split.threshold)
}
