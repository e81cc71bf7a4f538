use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use plpred::config::ModelConfig;
use plpred::elo::EloTable;
use plpred::fixtures::parse_fixture_records;
use plpred::logging;
use plpred::pipeline::{self, RunReport};
use plpred::ratings::RatingStore;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output<'a> {
    generated_utc: String,
    #[serde(flatten)]
    report: &'a RunReport,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init();

    let mut args = std::env::args().skip(1);
    let ratings_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/ratings.json"));
    let fixtures_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/fixtures.json"));

    let elo_path = args.next().map(PathBuf::from);

    let mut store = RatingStore::load_path(&ratings_path)?;
    // Fitted league constants apply unless PLPRED_BASE_GOALS / PLPRED_HOME_ADVANTAGE say otherwise.
    let base = ModelConfig::default().with_league(store.league());
    let cfg = ModelConfig::from_env_over(base).context("read model config from environment")?;
    if let Some(path) = elo_path {
        let table = EloTable::load_path(&path)?;
        info!(teams = table.teams.len(), path = %path.display(), "loaded elo ratings");
        store = store.with_elo(table.model());
    }
    let raw = fs::read_to_string(&fixtures_path)
        .with_context(|| format!("read fixtures {}", fixtures_path.display()))?;
    let records = parse_fixture_records(&raw)?;

    let report = pipeline::run(&store, records, &cfg).context("prediction run")?;
    let out = Output {
        generated_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        report: &report,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);

    info!(
        predictions = report.predictions.len(),
        bets = report.bets(),
        "wrote run report"
    );
    Ok(())
}
