//! Clinical feature derivation shared by training and inference.
//!
//! Raw request fields are first coerced into a fully defaulted
//! [`ClinicalRecord`], which is then expanded into the fixed-order
//! [`FeatureVector`] consumed by the decision tree. Both steps are total: a
//! missing or unparseable field takes its documented default.
//!
//! The vector layout is versioned by [`FEATURE_VERSION`]. Reordering or adding
//! features invalidates every trained model.

use serde::Deserialize;
use serde_json::Value;

/// Feature layout version recorded in trained models.
pub const FEATURE_VERSION: i64 = 1;

/// Number of values in a [`FeatureVector`].
pub const FEATURE_LEN: usize = 15;

/// Column names of the feature vector, in order.
///
/// These match the preprocessed training table headers.
pub const FEATURE_NAMES: [&str; FEATURE_LEN] = [
    "gender",
    "weight",
    "ap_hi",
    "ap_lo",
    "cholesterol",
    "gluc",
    "smoke",
    "alco",
    "active",
    "age_years",
    "bmi",
    "pulse_pressure",
    "health_index",
    "cholesterol_gluc_interaction",
    "bmi_category",
];

const DEFAULT_AGE_YEARS: i64 = 0;
const DEFAULT_GENDER: i64 = 1;
const DEFAULT_HEIGHT_CM: i64 = 160;
const DEFAULT_WEIGHT_KG: f64 = 70.0;
const DEFAULT_AP_HI: i64 = 120;
const DEFAULT_AP_LO: i64 = 80;
const DEFAULT_CHOLESTEROL: i64 = 1;
const DEFAULT_GLUC: i64 = 1;
const DEFAULT_SMOKE: i64 = 0;
const DEFAULT_ALCO: i64 = 0;
const DEFAULT_ACTIVE: i64 = 1;

/// Raw prediction request fields as received from a client.
///
/// Every field is optional and may hold any JSON value; coercion happens in
/// [`ClinicalRecord::from_raw`]. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInputs {
    #[serde(default)]
    pub age: Option<Value>,
    #[serde(default)]
    pub gender: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(default)]
    pub weight: Option<Value>,
    #[serde(default)]
    pub ap_hi: Option<Value>,
    #[serde(default)]
    pub ap_lo: Option<Value>,
    #[serde(default)]
    pub cholesterol: Option<Value>,
    #[serde(default)]
    pub gluc: Option<Value>,
    #[serde(default)]
    pub smoke: Option<Value>,
    #[serde(default)]
    pub alco: Option<Value>,
    #[serde(default)]
    pub active: Option<Value>,
}

/// Clinical measurements with every default applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClinicalRecord {
    pub age_years: i64,
    pub gender: i64,
    pub height_cm: i64,
    pub weight_kg: f64,
    pub ap_hi: i64,
    pub ap_lo: i64,
    pub cholesterol: i64,
    pub gluc: i64,
    pub smoke: i64,
    pub alco: i64,
    pub active: i64,
}

impl Default for ClinicalRecord {
    fn default() -> Self {
        Self {
            age_years: DEFAULT_AGE_YEARS,
            gender: DEFAULT_GENDER,
            height_cm: DEFAULT_HEIGHT_CM,
            weight_kg: DEFAULT_WEIGHT_KG,
            ap_hi: DEFAULT_AP_HI,
            ap_lo: DEFAULT_AP_LO,
            cholesterol: DEFAULT_CHOLESTEROL,
            gluc: DEFAULT_GLUC,
            smoke: DEFAULT_SMOKE,
            alco: DEFAULT_ALCO,
            active: DEFAULT_ACTIVE,
        }
    }
}

impl ClinicalRecord {
    /// Coerce raw request fields, substituting defaults for anything missing
    /// or unparseable.
    pub fn from_raw(raw: &RawInputs) -> Self {
        Self {
            age_years: int_or(raw.age.as_ref(), DEFAULT_AGE_YEARS),
            gender: int_or(raw.gender.as_ref(), DEFAULT_GENDER),
            height_cm: int_or(raw.height.as_ref(), DEFAULT_HEIGHT_CM),
            weight_kg: float_or(raw.weight.as_ref(), DEFAULT_WEIGHT_KG),
            ap_hi: int_or(raw.ap_hi.as_ref(), DEFAULT_AP_HI),
            ap_lo: int_or(raw.ap_lo.as_ref(), DEFAULT_AP_LO),
            cholesterol: int_or(raw.cholesterol.as_ref(), DEFAULT_CHOLESTEROL),
            gluc: int_or(raw.gluc.as_ref(), DEFAULT_GLUC),
            smoke: int_or(raw.smoke.as_ref(), DEFAULT_SMOKE),
            alco: int_or(raw.alco.as_ref(), DEFAULT_ALCO),
            active: int_or(raw.active.as_ref(), DEFAULT_ACTIVE),
        }
    }

    /// Body mass index, or `0.0` when height is not positive.
    pub fn bmi(&self) -> f64 {
        if self.height_cm <= 0 {
            return 0.0;
        }
        let height_m = self.height_cm as f64 / 100.0;
        self.weight_kg / (height_m * height_m)
    }
}

/// Fixed-order numeric encoding of a [`ClinicalRecord`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_LEN]);

impl FeatureVector {
    /// Derive the feature vector for a record.
    pub fn from_record(record: &ClinicalRecord) -> Self {
        let bmi = record.bmi();
        Self([
            record.gender as f64,
            record.weight_kg,
            record.ap_hi as f64,
            record.ap_lo as f64,
            record.cholesterol as f64,
            record.gluc as f64,
            record.smoke as f64,
            record.alco as f64,
            record.active as f64,
            record.age_years as f64,
            bmi,
            record.ap_hi as f64 - record.ap_lo as f64,
            record.active as f64 - record.smoke as f64 - record.alco as f64,
            record.cholesterol as f64 * record.gluc as f64,
            bmi_category(bmi) as f64,
        ])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Look up a value by its column name.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|idx| self.0[idx])
    }
}

/// Derive the feature vector for raw request fields. Never fails.
pub fn derive(raw: &RawInputs) -> FeatureVector {
    FeatureVector::from_record(&ClinicalRecord::from_raw(raw))
}

/// Bucket a BMI value: underweight 0, normal 1, overweight 2, obese 3.
pub fn bmi_category(bmi: f64) -> u8 {
    if bmi < 18.5 {
        0
    } else if bmi < 25.0 {
        1
    } else if bmi < 30.0 {
        2
    } else {
        3
    }
}

fn int_or(value: Option<&Value>, default: i64) -> i64 {
    let parsed = match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(truncate_finite)),
        Some(Value::Bool(flag)) => Some(i64::from(*flag)),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.unwrap_or(default)
}

fn float_or(value: Option<&Value>, default: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::Bool(flag)) => Some(if *flag { 1.0 } else { 0.0 }),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(default)
}

fn truncate_finite(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawInputs {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn derives_reference_patient() {
        let inputs = raw(json!({
            "age": 55, "gender": 1, "height": 170, "weight": 85,
            "ap_hi": 150, "ap_lo": 95, "cholesterol": 2, "gluc": 1,
            "smoke": 1, "alco": 0, "active": 0
        }));
        let features = derive(&inputs);
        assert!((features.get("bmi").unwrap() - 29.41).abs() < 0.01);
        assert_eq!(features.get("bmi_category"), Some(2.0));
        assert_eq!(features.get("pulse_pressure"), Some(55.0));
        assert_eq!(features.get("health_index"), Some(-1.0));
        assert_eq!(features.get("cholesterol_gluc_interaction"), Some(2.0));
        assert_eq!(features.get("age_years"), Some(55.0));
        assert_eq!(features.as_slice().len(), FEATURE_LEN);
    }

    #[test]
    fn empty_request_uses_defaults() {
        let features = derive(&RawInputs::default());
        let expected_bmi = 70.0 / (1.6 * 1.6);
        assert_eq!(
            &features.as_slice()[..10],
            &[1.0, 70.0, 120.0, 80.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0]
        );
        assert!((features.as_slice()[10] - expected_bmi).abs() < 1e-12);
        assert_eq!(features.get("pulse_pressure"), Some(40.0));
        assert_eq!(features.get("health_index"), Some(1.0));
        assert_eq!(features.get("bmi_category"), Some(2.0));
    }

    #[test]
    fn missing_height_defaults_to_160cm() {
        let record = ClinicalRecord::from_raw(&raw(json!({ "weight": 64 })));
        assert_eq!(record.height_cm, 160);
        assert!((record.bmi() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn non_positive_height_zeroes_bmi() {
        for height in [json!(0), json!(-20), json!("0")] {
            let features = derive(&raw(json!({ "height": height, "weight": 90 })));
            assert_eq!(features.get("bmi"), Some(0.0));
            assert_eq!(features.get("bmi_category"), Some(0.0));
        }
    }

    #[test]
    fn unparseable_fields_fall_back() {
        let record = ClinicalRecord::from_raw(&raw(json!({
            "age": "", "gender": null, "height": "tall", "weight": "heavy",
            "ap_hi": "140.5", "ap_lo": [80], "cholesterol": {"v": 2},
            "gluc": "abc", "smoke": "", "alco": null, "active": "yes"
        })));
        assert_eq!(record, ClinicalRecord::default());
    }

    #[test]
    fn coerces_strings_floats_and_bools() {
        let record = ClinicalRecord::from_raw(&raw(json!({
            "age": " 61 ", "height": 172.9, "weight": "81.5",
            "smoke": true, "active": false, "ap_hi": -130.7
        })));
        assert_eq!(record.age_years, 61);
        assert_eq!(record.height_cm, 172);
        assert_eq!(record.weight_kg, 81.5);
        assert_eq!(record.smoke, 1);
        assert_eq!(record.active, 0);
        assert_eq!(record.ap_hi, -130);
    }

    #[test]
    fn non_finite_weight_string_is_rejected() {
        let record = ClinicalRecord::from_raw(&raw(json!({ "weight": "NaN" })));
        assert_eq!(record.weight_kg, DEFAULT_WEIGHT_KG);
        let record = ClinicalRecord::from_raw(&raw(json!({ "weight": "inf" })));
        assert_eq!(record.weight_kg, DEFAULT_WEIGHT_KG);
    }

    #[test]
    fn bmi_category_boundaries_are_half_open() {
        assert_eq!(bmi_category(18.499), 0);
        assert_eq!(bmi_category(18.5), 1);
        assert_eq!(bmi_category(24.999), 1);
        assert_eq!(bmi_category(25.0), 2);
        assert_eq!(bmi_category(29.999), 2);
        assert_eq!(bmi_category(30.0), 3);
    }

    #[test]
    fn derived_bmi_on_boundaries() {
        // 2m tall keeps the arithmetic exact: weight / 4.
        for (weight, category) in [(74.0, 1.0), (100.0, 2.0), (120.0, 3.0)] {
            let features = derive(&raw(json!({ "height": 200, "weight": weight })));
            assert_eq!(features.get("bmi_category"), Some(category));
        }
    }

    #[test]
    fn extreme_magnitudes_do_not_overflow() {
        let features = derive(&raw(json!({ "ap_hi": 1e19, "ap_lo": -1 })));
        assert_eq!(features.get("ap_hi"), Some(i64::MAX as f64));
        let pulse = features.get("pulse_pressure").unwrap();
        assert!(pulse.is_finite() && pulse > 9.0e18);

        let features = derive(&raw(json!({
            "cholesterol": "9999999999", "gluc": "9999999999"
        })));
        assert_eq!(
            features.get("cholesterol_gluc_interaction"),
            Some(9_999_999_999.0 * 9_999_999_999.0)
        );

        let features = derive(&raw(json!({
            "active": i64::MIN, "smoke": i64::MAX, "alco": i64::MAX
        })));
        let health = features.get("health_index").unwrap();
        assert!(health.is_finite() && health < 0.0);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let inputs = raw(json!({ "userId": 7, "age": 40 }));
        assert_eq!(ClinicalRecord::from_raw(&inputs).age_years, 40);
    }
}
