//! Train the cardiovascular risk tree from a preprocessed CSV and report metrics.

use std::path::PathBuf;

use cardiorisk::config::{self, RiskConfig};
use cardiorisk::dataset::{load_csv, stratified_split};
use cardiorisk::logging;
use cardiorisk::ml::metrics::{ModelReport, SplitReport};
use cardiorisk::ml::tree::build_tree;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let mut config = match &options.config_path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    options.apply(&mut config);
    config.validate().map_err(|err| err.to_string())?;
    let training = &config.training;

    let dataset =
        load_csv(&options.data_path, &training.load_options()).map_err(|err| err.to_string())?;
    let split = stratified_split(&dataset.labels(), &training.seed, training.test_fraction)
        .map_err(|err| err.to_string())?;
    let train_rows = dataset.select(&split.train);
    let test_rows = dataset.select(&split.test);
    if train_rows.is_empty() {
        return Err("Training split is empty".to_string());
    }

    let tree = build_tree(&train_rows, &training.train_options()).map_err(|err| err.to_string())?;
    let report = ModelReport::build(&tree, &train_rows, &test_rows, training.decision_threshold)
        .map_err(|err| err.to_string())?;

    tree.save_json(&config.model.path)
        .map_err(|err| err.to_string())?;
    let report_path = ModelReport::path_for_model(&config.model.path);
    report.save_json(&report_path).map_err(|err| err.to_string())?;

    print_report(&report);
    println!("model written to {}", config.model.path.display());
    println!("metrics written to {}", report_path.display());
    Ok(())
}

fn print_report(report: &ModelReport) {
    println!(
        "rows: train={} test={}  tree: leaves={} depth={}  training gini={:.4}",
        report.train_rows, report.test_rows, report.leaf_count, report.depth, report.training_gini
    );
    println!("{:<6} {:>9} {:>10} {:>8} {:>8}", "split", "accuracy", "precision", "recall", "f1");
    print_split("train", &report.train);
    print_split("test", &report.test);
    println!("confusion matrix (test, rows=true, cols=pred):");
    let cm = &report.test.confusion;
    println!("{:6}{:6}", cm.true_negative, cm.false_positive);
    println!("{:6}{:6}", cm.false_negative, cm.true_positive);
    println!("{}", report.diagnosis.as_str());
}

fn print_split(name: &str, split: &SplitReport) {
    let m = &split.metrics;
    println!(
        "{:<6} {:>9.4} {:>10.4} {:>8.4} {:>8.4}",
        name, m.accuracy, m.precision, m.recall, m.f1
    );
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    data_path: PathBuf,
    config_path: Option<PathBuf>,
    model_out: Option<PathBuf>,
    max_depth: Option<usize>,
    min_leaf_size: Option<usize>,
    test_fraction: Option<f64>,
    seed: Option<String>,
    threshold: Option<f64>,
    keep_duplicates: bool,
}

impl CliOptions {
    fn apply(&self, config: &mut RiskConfig) {
        let training = &mut config.training;
        if let Some(path) = &self.model_out {
            config.model.path = path.clone();
        }
        if let Some(value) = self.max_depth {
            training.max_depth = value;
        }
        if let Some(value) = self.min_leaf_size {
            training.min_leaf_size = value;
        }
        if let Some(value) = self.test_fraction {
            training.test_fraction = value;
        }
        if let Some(value) = &self.seed {
            training.seed = value.clone();
        }
        if let Some(value) = self.threshold {
            training.decision_threshold = value;
        }
        if self.keep_duplicates {
            training.deduplicate = false;
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut data_path: Option<PathBuf> = None;
    let mut options = CliOptions::default();

    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        match flag {
            "-h" | "--help" => return Err(help_text()),
            "--keep-duplicates" => options.keep_duplicates = true,
            "--data" | "--config" | "--out" | "--max-depth" | "--min-leaf-size"
            | "--test-fraction" | "--seed" | "--threshold" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| format!("{flag} requires a value"))?;
                match flag {
                    "--data" => data_path = Some(PathBuf::from(value)),
                    "--config" => options.config_path = Some(PathBuf::from(value)),
                    "--out" => options.model_out = Some(PathBuf::from(value)),
                    "--max-depth" => options.max_depth = Some(parse_value(flag, value)?),
                    "--min-leaf-size" => options.min_leaf_size = Some(parse_value(flag, value)?),
                    "--test-fraction" => options.test_fraction = Some(parse_value(flag, value)?),
                    "--threshold" => options.threshold = Some(parse_value(flag, value)?),
                    _ => options.seed = Some(value.clone()),
                }
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    options.data_path = data_path.ok_or_else(help_text)?;
    Ok(options)
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("Invalid {flag} value: {value}"))
}

fn help_text() -> String {
    [
        "cardiorisk-train",
        "",
        "Trains the cardiovascular risk decision tree from a preprocessed CSV.",
        "",
        "Usage:",
        "  cardiorisk-train --data <file.csv> [options]",
        "",
        "Options:",
        "  --data <file>           Training CSV with feature columns and a 0/1 label (required).",
        "  --config <file>         Config TOML (default: config.toml in the app directory).",
        "  --out <file>            Model output path (default from config: models/cardio_model.json).",
        "  --max-depth <n>         Maximum tree depth, 1..=64 (default: 12).",
        "  --min-leaf-size <n>     Rows at or below which a child becomes a leaf (default: 50).",
        "  --test-fraction <f64>   Holdout share per class, in [0, 1) (default: 0.2).",
        "  --seed <text>           Split seed (default: cardiorisk-holdout-v1).",
        "  --threshold <f64>       Decision threshold for metrics (default: 0.5).",
        "  --keep-duplicates       Keep exact duplicate rows.",
    ]
    .join("\n")
}
