//! Machine learning for cardiovascular risk scoring.
//!
//! A single decision tree is trained from a labeled clinical matrix and
//! evaluated with plain binary classification metrics. There are no external
//! ML dependencies.

pub mod metrics;
pub mod tree;
