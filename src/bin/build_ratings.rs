use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};

use plpred::logging;
use plpred::strengths::{FitOptions, fit_from_results, read_results_csv};

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

    let file = File::open(&input).with_context(|| format!("open results {}", input.display()))?;
    let results = read_results_csv(file)?;
    let fitted = fit_from_results(&results, FitOptions::default())?;
    // Fails here rather than at prediction time if two names collide.
    fitted.rating_store()?;

    let json = serde_json::to_string_pretty(&fitted)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, json).with_context(|| format!("write ratings {}", path.display()))?;
            println!("Wrote {} teams to {}", fitted.teams.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
