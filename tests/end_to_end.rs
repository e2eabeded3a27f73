mod support;

use std::sync::Arc;

use cardiorisk::dataset::{LoadOptions, load_csv, stratified_split};
use cardiorisk::features::{FEATURE_LEN, RawInputs};
use cardiorisk::ml::metrics::{FitDiagnosis, ModelReport};
use cardiorisk::ml::tree::{DecisionTree, TrainOptions, build_tree};
use cardiorisk::predictor::{self, RiskPredictor};
use cardiorisk::risk::RiskCategory;
use serde_json::json;
use support::data::{synthetic_patient, write_training_csv};

const ROWS: usize = 400;

fn train_from_csv(dir: &std::path::Path) -> (DecisionTree, Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let csv_path = dir.join("cardio_train.csv");
    write_training_csv(&csv_path, ROWS);
    let dataset = load_csv(&csv_path, &LoadOptions::default()).expect("load csv");
    assert_eq!(dataset.rows.len(), ROWS);
    assert_eq!(dataset.duplicates_removed, 0);
    assert!(dataset.rows.iter().all(|row| row.len() == FEATURE_LEN + 1));

    let split = stratified_split(&dataset.labels(), "cardiorisk-holdout-v1", 0.2).expect("split");
    assert_eq!(split.train.len() + split.test.len(), ROWS);
    let train = dataset.select(&split.train);
    let test = dataset.select(&split.test);
    let options = TrainOptions {
        max_depth: 6,
        min_leaf_size: 5,
        ..TrainOptions::default()
    };
    let tree = build_tree(&train, &options).expect("build tree");
    (tree, train, test)
}

#[test]
fn csv_to_prediction_pipeline() {
    let temp = tempfile::tempdir().expect("create tempdir");
    let (tree, train, test) = train_from_csv(temp.path());

    let report = ModelReport::build(&tree, &train, &test, 0.5).expect("evaluate");
    assert!(report.train.metrics.accuracy >= 0.9, "{report:?}");
    assert!(report.test.metrics.accuracy >= 0.8, "{report:?}");
    assert_ne!(report.diagnosis, FitDiagnosis::Underfitting);

    let model_path = temp.path().join("models").join("cardio_model.json");
    tree.save_json(&model_path).expect("save model");
    report
        .save_json(&ModelReport::path_for_model(&model_path))
        .expect("save report");
    assert!(temp.path().join("models/cardio_model.metrics.json").is_file());

    let reloaded = DecisionTree::load_json(&model_path).expect("reload model");
    assert_eq!(reloaded, tree);
    for row in train.iter().chain(&test) {
        let features = &row[..FEATURE_LEN];
        assert_eq!(
            reloaded.predict(features).unwrap().to_bits(),
            tree.predict(features).unwrap().to_bits()
        );
    }

    let predictor = RiskPredictor::new(Arc::new(reloaded)).expect("compatible model");
    let raw: RawInputs = serde_json::from_value(json!({
        "age": 55, "gender": 1, "height": 170, "weight": 85,
        "ap_hi": 150, "ap_lo": 95, "cholesterol": 2, "gluc": 1,
        "smoke": 1, "alco": 0, "active": 0
    }))
    .unwrap();
    let response = predictor.predict(&raw).expect("predict");
    assert!(response.probability >= 0.5, "{response:?}");
    assert_eq!(response.risk_category, RiskCategory::High);
    assert_eq!(
        response.factors,
        vec!["High Systolic BP", "Elevated Cholesterol", "Smoking"]
    );
}

#[test]
fn predictions_track_the_training_rule() {
    let temp = tempfile::tempdir().expect("create tempdir");
    let (tree, _, _) = train_from_csv(temp.path());
    let predictor = RiskPredictor::new(Arc::new(tree)).expect("compatible model");

    let mut agree = 0;
    for i in ROWS..ROWS + 100 {
        let (raw, label) = synthetic_patient(i);
        let response = predictor
            .predict(&serde_json::from_value(raw).unwrap())
            .expect("predict");
        assert!((0.0..=1.0).contains(&response.probability));
        if (response.probability >= 0.5) == (label == 1) {
            agree += 1;
        }
    }
    assert!(agree >= 80, "only {agree}/100 unseen patients agree");
}

#[test]
fn active_model_serves_requests_after_load() {
    let temp = tempfile::tempdir().expect("create tempdir");
    let (tree, _, _) = train_from_csv(temp.path());
    let model_path = temp.path().join("cardio_model.json");
    tree.save_json(&model_path).expect("save model");

    let active = predictor::load_model(&model_path).expect("load active model");
    assert_eq!(*active, tree);
    let response = predictor::predict(&RawInputs::default()).expect("predict defaults");
    assert_eq!(response.probability, tree.predict(&defaults_features()).unwrap());
}

fn defaults_features() -> Vec<f64> {
    cardiorisk::features::derive(&RawInputs::default())
        .as_slice()
        .to_vec()
}

#[test]
fn missing_model_file_is_reported() {
    let temp = tempfile::tempdir().expect("create tempdir");
    let err = predictor::load_model(&temp.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().contains("absent.json"), "{err}");
}
