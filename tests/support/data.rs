use std::path::Path;

use cardiorisk::features::{FEATURE_NAMES, derive};
use serde_json::json;

/// One synthetic patient: raw request fields plus a label that is 1 exactly
/// when systolic pressure exceeds 140.
pub fn synthetic_patient(i: usize) -> (serde_json::Value, u8) {
    let ap_hi = 100 + (i * 7) % 80;
    let raw = json!({
        "age": 30 + i % 40,
        "gender": 1 + i % 2,
        "height": 150 + i % 41,
        "weight": 55 + i % 53,
        "ap_hi": ap_hi,
        "ap_lo": 70 + i % 25,
        "cholesterol": 1 + i % 3,
        "gluc": 1 + (i / 3) % 3,
        "smoke": i % 5 == 0,
        "alco": i % 11 == 0,
        "active": i % 4 != 0,
    });
    (raw, u8::from(ap_hi > 140))
}

/// Write `count` synthetic patients as a preprocessed training CSV, including
/// the leading index and `id` columns an exported table carries.
pub fn write_training_csv(path: &Path, count: usize) {
    let mut text = format!(",id,{},cardio\n", FEATURE_NAMES.join(","));
    for i in 0..count {
        let (raw, label) = synthetic_patient(i);
        let features = derive(&serde_json::from_value(raw).unwrap());
        let cells: Vec<String> = features.as_slice().iter().map(|v| v.to_string()).collect();
        text.push_str(&format!("{i},{},{},{label}\n", 1000 + i, cells.join(",")));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create csv parent dirs");
    }
    std::fs::write(path, text).expect("write training csv");
}
