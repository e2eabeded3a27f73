//! Score one patient record with the trained cardiovascular risk tree.
//!
//! Reads a JSON request from `--input` or stdin and prints the JSON response.

use std::io::Read;
use std::path::PathBuf;

use cardiorisk::config;
use cardiorisk::features::RawInputs;
use cardiorisk::logging::{self, Console};
use cardiorisk::predictor;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init_with(Console::Stderr) {
        eprintln!("Logging disabled: {err}");
    }

    let model_path = match options.model_path {
        Some(path) => path,
        None => {
            let config = match &options.config_path {
                Some(path) => config::load_from(path),
                None => config::load_or_default(),
            }
            .map_err(|err| err.to_string())?;
            config.model.path
        }
    };
    predictor::load_model(&model_path).map_err(|err| err.to_string())?;

    let request = match &options.input_path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| format!("Failed to read {}: {err}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|err| format!("Failed to read stdin: {err}"))?;
            text
        }
    };
    let raw: RawInputs =
        serde_json::from_str(&request).map_err(|err| format!("Invalid request JSON: {err}"))?;
    let response = predictor::predict(&raw).map_err(|err| err.to_string())?;
    let json = serde_json::to_string_pretty(&response).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    model_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    input_path: Option<PathBuf>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        match flag {
            "-h" | "--help" => return Err(help_text()),
            "--model" | "--config" | "--input" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .map(PathBuf::from)
                    .ok_or_else(|| format!("{flag} requires a value"))?;
                match flag {
                    "--model" => options.model_path = Some(value),
                    "--config" => options.config_path = Some(value),
                    _ => options.input_path = Some(value),
                }
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "cardiorisk",
        "",
        "Predicts cardiovascular disease risk for one patient record.",
        "",
        "Usage:",
        "  cardiorisk [--model <file>] [--input <request.json>]",
        "",
        "Options:",
        "  --model <file>    Trained tree JSON (default from config: models/cardio_model.json).",
        "  --config <file>   Config TOML (default: config.toml in the app directory).",
        "  --input <file>    Request JSON; reads stdin when omitted.",
    ]
    .join("\n")
}
