//! Risk categories and the human-readable factors reported with a prediction.

use serde::{Deserialize, Serialize};

use crate::features::ClinicalRecord;

/// Probability at or above which risk is `Medium`.
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.25;
/// Probability at or above which risk is `High`.
pub const HIGH_RISK_THRESHOLD: f64 = 0.5;

/// Maximum number of contributing factors returned with a prediction.
pub const MAX_FACTORS: usize = 3;

/// Factor returned when no specific rule fires.
pub const FALLBACK_FACTOR: &str = "General Health Markers";

/// Coarse risk bucket for a predicted probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= HIGH_RISK_THRESHOLD {
            RiskCategory::High
        } else if probability >= MEDIUM_RISK_THRESHOLD {
            RiskCategory::Medium
        } else {
            RiskCategory::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "Low",
            RiskCategory::Medium => "Medium",
            RiskCategory::High => "High",
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule-based factors shown alongside a prediction. Independent of the tree.
pub fn contributing_factors(record: &ClinicalRecord) -> Vec<&'static str> {
    let rules: [(bool, &'static str); 4] = [
        (record.ap_hi > 140, "High Systolic BP"),
        (record.cholesterol > 1, "Elevated Cholesterol"),
        (record.smoke == 1, "Smoking"),
        (record.age_years > 55, "Age Factor"),
    ];
    let mut factors: Vec<&'static str> = rules
        .into_iter()
        .filter_map(|(fired, factor)| fired.then_some(factor))
        .take(MAX_FACTORS)
        .collect();
    if factors.is_empty() {
        factors.push(FALLBACK_FACTOR);
    }
    factors
}

/// Response payload for a single prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    /// Probability as a percentage with one decimal, e.g. `"42.5"`.
    pub risk_score: String,
    pub risk_category: RiskCategory,
    pub probability: f64,
    pub factors: Vec<String>,
}

impl PredictionResponse {
    pub fn new(probability: f64, record: &ClinicalRecord) -> Self {
        Self {
            risk_score: format!("{:.1}", probability * 100.0),
            risk_category: RiskCategory::from_probability(probability),
            probability,
            factors: contributing_factors(record)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}
