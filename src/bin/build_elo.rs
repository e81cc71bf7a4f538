use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use plpred::elo::{EloConfig, build_elo};
use plpred::logging;
use plpred::strengths::read_results_csv;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/results.csv"));
    let output = args.next().map(PathBuf::from);

    let half_life_days = std::env::var("PLPRED_ELO_HALF_LIFE_DAYS")
        .ok()
        .and_then(|val| val.trim().parse::<f64>().ok())
        .unwrap_or(EloConfig::default().half_life_days);
    let cfg = EloConfig {
        half_life_days,
        ..EloConfig::default()
    };

    let file = File::open(&input).with_context(|| format!("open results {}", input.display()))?;
    let results = read_results_csv(file)?;
    let table = build_elo(&results, cfg, Utc::now());

    let json = serde_json::to_string_pretty(&table)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, json).with_context(|| format!("write elo ratings {}", path.display()))?;
            println!("Wrote {} teams to {}", table.teams.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
