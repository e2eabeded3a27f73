use std::collections::BTreeMap;

use super::DatasetError;

/// Row indices assigned to each side of a holdout split, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Deterministic per-class holdout split keyed by a hash of seed, class and row index.
///
/// Each class contributes `round(n * test_fraction)` rows to the test side,
/// except that a single-row class stays entirely in train and every class
/// keeps at least one training row.
pub fn stratified_split(
    labels: &[f64],
    seed: &str,
    test_fraction: f64,
) -> Result<SplitIndices, DatasetError> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(DatasetError::InvalidSplit(test_fraction));
    }
    let mut by_class: BTreeMap<u64, Vec<(u128, usize)>> = BTreeMap::new();
    for (index, label) in labels.iter().enumerate() {
        let class = label.to_bits();
        let hash = blake3::hash(format!("{seed}|{label}|{index}").as_bytes());
        let mut key = [0u8; 16];
        key.copy_from_slice(&hash.as_bytes()[..16]);
        by_class
            .entry(class)
            .or_default()
            .push((u128::from_le_bytes(key), index));
    }

    let mut split = SplitIndices::default();
    for (_class, mut entries) in by_class {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let n = entries.len();
        let test_n = if n == 1 {
            0
        } else {
            (((n as f64) * test_fraction).round() as usize).min(n - 1)
        };
        for (position, (_hash, index)) in entries.into_iter().enumerate() {
            if position < test_n {
                split.test.push(index);
            } else {
                split.train.push(index);
            }
        }
    }
    split.train.sort_unstable();
    split.test.sort_unstable();
    tracing::debug!(
        "Stratified split: {} train, {} test",
        split.train.len(),
        split.test.len()
    );
    Ok(split)
}
