use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use plpred::calibration::{PublishedPrediction, backtest};
use plpred::logging;
use plpred::strengths::read_results_csv;

// Either a full run report or a bare list of predictions.
#[derive(Deserialize)]
#[serde(untagged)]
enum PredictionFile {
    Report { predictions: Vec<PublishedPrediction> },
    List(Vec<PublishedPrediction>),
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init();

    let mut args = std::env::args().skip(1);
    let predictions_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/report.json"));
    let results_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/results.csv"));

    let raw = fs::read_to_string(&predictions_path)
        .with_context(|| format!("read predictions {}", predictions_path.display()))?;
    let predictions = match serde_json::from_str::<PredictionFile>(&raw).context("parse predictions json")? {
        PredictionFile::Report { predictions } | PredictionFile::List(predictions) => predictions,
    };
    let file = File::open(&results_path)
        .with_context(|| format!("open results {}", results_path.display()))?;
    let results = read_results_csv(file)?;

    let report = backtest(&predictions, &results);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
