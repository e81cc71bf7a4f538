use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::error::{ConfigError, SkipReason};
use crate::fixtures::{FixtureEntry, FixtureRecord};
use crate::prediction::{Prediction, predict_fixture_with_elo};
use crate::ratings::RatingStore;
use crate::tips::{RejectedSelection, Tip, select_tip};

/// Published tip row: the fixture's teams plus either a pick or `"No Bet"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TipEntry {
    pub home_team: String,
    pub away_team: String,
    #[serde(flatten)]
    pub tip: Tip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFixture {
    /// Position in the input batch.
    pub index: usize,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedOdds {
    pub index: usize,
    pub home_team: String,
    pub away_team: String,
    #[serde(flatten)]
    pub rejected: RejectedSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureOutput {
    pub prediction: Prediction,
    pub tip: TipEntry,
    pub rejected: Vec<RejectedSelection>,
    pub clamped_cells: usize,
}

#[derive(Debug)]
pub enum FixtureError {
    Skip(SkipReason),
    Config(ConfigError),
}

impl From<SkipReason> for FixtureError {
    fn from(value: SkipReason) -> Self {
        Self::Skip(value)
    }
}

impl From<ConfigError> for FixtureError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Everything one run produces, in input fixture order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub predictions: Vec<Prediction>,
    pub tips: Vec<TipEntry>,
    pub skipped: Vec<SkippedFixture>,
    pub rejected_odds: Vec<RejectedOdds>,
    /// Scoreline cells clamped to zero by the low-score correction.
    pub anomalies: usize,
}

impl RunReport {
    pub fn bets(&self) -> usize {
        self.tips.iter().filter(|t| !t.tip.is_no_bet()).count()
    }
}

pub fn process_fixture(
    store: &RatingStore,
    record: FixtureRecord,
    cfg: &ModelConfig,
) -> Result<FixtureOutput, FixtureError> {
    let fixture = record.validate()?;
    let home = store.lookup(&fixture.home_team)?;
    let away = store.lookup(&fixture.away_team)?;

    let elo = store
        .elo()
        .map(|model| model.match_probs(&fixture.home_team, &fixture.away_team));

    let (prediction, clamped_cells) = predict_fixture_with_elo(&fixture, home, away, elo, cfg)?;
    let decision = select_tip(&prediction, &fixture.odds, cfg.edge_threshold);

    Ok(FixtureOutput {
        tip: TipEntry {
            home_team: fixture.home_team.clone(),
            away_team: fixture.away_team.clone(),
            tip: decision.tip,
        },
        prediction,
        rejected: decision.rejected,
        clamped_cells,
    })
}

fn process_entry(
    store: &RatingStore,
    entry: FixtureEntry,
    cfg: &ModelConfig,
) -> Result<FixtureOutput, FixtureError> {
    match entry {
        FixtureEntry::Record(record) => process_fixture(store, record, cfg),
        FixtureEntry::Malformed { reason, .. } => Err(FixtureError::Skip(reason)),
    }
}

/// Run every fixture through the model on a bounded worker pool.
///
/// Per-fixture data problems skip that fixture only. A configuration error from
/// any fixture fails the whole run with no partial report.
pub fn run<R>(store: &RatingStore, records: Vec<R>, cfg: &ModelConfig) -> Result<RunReport, ConfigError>
where
    R: Into<FixtureEntry> + Send,
{
    cfg.validate()?;
    if cfg.elo_blend > 0.0 && store.elo().is_none() {
        warn!(
            elo_blend = cfg.elo_blend,
            "elo blend configured but no elo ratings loaded; match result stays poisson-only"
        );
    }
    info!(
        fixtures = records.len(),
        teams = store.len(),
        markets = cfg.markets.len(),
        "starting prediction run"
    );

    let pool = build_pool(cfg.parallelism);
    let results: Vec<(usize, Option<String>, Option<String>, Result<FixtureOutput, FixtureError>)> =
        with_pool(&pool, || {
            records
                .into_par_iter()
                .enumerate()
                .map(|(idx, record)| {
                    let entry: FixtureEntry = record.into();
                    let home = entry.home_team().map(str::to_string);
                    let away = entry.away_team().map(str::to_string);
                    (idx, home, away, process_entry(store, entry, cfg))
                })
                .collect()
        });

    let mut report = RunReport::default();
    for (index, home_team, away_team, result) in results {
        match result {
            Ok(out) => {
                report.anomalies += out.clamped_cells;
                for rejected in out.rejected {
                    report.rejected_odds.push(RejectedOdds {
                        index,
                        home_team: out.tip.home_team.clone(),
                        away_team: out.tip.away_team.clone(),
                        rejected,
                    });
                }
                report.predictions.push(out.prediction);
                report.tips.push(out.tip);
            }
            Err(FixtureError::Skip(reason)) => {
                warn!(
                    index,
                    home = home_team.as_deref().unwrap_or("?"),
                    away = away_team.as_deref().unwrap_or("?"),
                    %reason,
                    "skipping fixture"
                );
                report.skipped.push(SkippedFixture {
                    index,
                    home_team,
                    away_team,
                    reason,
                });
            }
            Err(FixtureError::Config(err)) => return Err(err),
        }
    }

    info!(
        predictions = report.predictions.len(),
        bets = report.bets(),
        skipped = report.skipped.len(),
        rejected_odds = report.rejected_odds.len(),
        anomalies = report.anomalies,
        "prediction run finished"
    );
    Ok(report)
}

fn build_pool(threads: Option<usize>) -> Option<rayon::ThreadPool> {
    let threads = threads?;
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .ok()
}

fn with_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elo::EloTable;
    use crate::fixtures::parse_fixture_records;
    use crate::ratings::TeamRating;

    fn store() -> RatingStore {
        RatingStore::from_records([
            TeamRating {
                team: "Arsenal".to_string(),
                attack: 1.3,
                defense: 0.9,
            },
            TeamRating {
                team: "Chelsea".to_string(),
                attack: 0.8,
                defense: 1.1,
            },
        ])
        .unwrap()
    }

    fn record(home: &str, away: &str) -> FixtureRecord {
        FixtureRecord {
            home_team: Some(home.to_string()),
            away_team: Some(away.to_string()),
            kickoff: Some("2025-08-17T13:00:00Z".to_string()),
            odds: None,
        }
    }

    #[test]
    fn unknown_team_is_skipped_not_fatal() {
        let report = run(
            &store(),
            vec![record("Arsenal", "Chelsea"), record("Arsenal", "Everton")],
            &ModelConfig::default(),
        )
        .unwrap();
        assert_eq!(report.predictions.len(), 1);
        assert_eq!(report.tips.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::UnknownTeam {
                team: "Everton".to_string()
            }
        );
    }

    #[test]
    fn invalid_config_fails_the_run() {
        let cfg = ModelConfig {
            edge_threshold: -0.1,
            ..ModelConfig::default()
        };
        assert!(run(&store(), vec![record("Arsenal", "Chelsea")], &cfg).is_err());
    }

    #[test]
    fn fixture_without_odds_gets_no_bet_row() {
        let report = run(&store(), vec![record("Arsenal", "Chelsea")], &ModelConfig::default()).unwrap();
        assert!(report.tips[0].tip.is_no_bet());
        let json = serde_json::to_value(&report.tips[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"homeTeam": "Arsenal", "awayTeam": "Chelsea", "tip": "No Bet"})
        );
    }

    #[test]
    fn malformed_entries_are_skipped_by_index() {
        let raw = r#"[{"homeTeam":"Arsenal","awayTeam":"Chelsea","kickoff":"2025-08-17T13:00:00Z"},
            {"homeTeam":"Arsenal","awayTeam":"Chelsea","kickoff":1755435600}]"#;
        let entries = parse_fixture_records(raw).unwrap();
        let report = run(&store(), entries, &ModelConfig::default()).unwrap();
        assert_eq!(report.predictions.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.skipped[0].home_team.as_deref(), Some("Arsenal"));
        assert!(matches!(report.skipped[0].reason, SkipReason::Malformed { .. }));
    }

    #[test]
    fn loaded_elo_reaches_the_match_result() {
        let raw = r#"{"teams":{"Arsenal":{"elo":1400,"games":10},"Chelsea":{"elo":1700,"games":10}}}"#;
        let table: EloTable = serde_json::from_str(raw).unwrap();
        let with_elo = store().with_elo(table.model());
        let cfg = ModelConfig {
            elo_blend: 0.5,
            ..ModelConfig::default()
        };

        let plain = run(&store(), vec![record("Arsenal", "Chelsea")], &cfg).unwrap();
        let mixed = run(&with_elo, vec![record("Arsenal", "Chelsea")], &cfg).unwrap();
        let home = |r: &RunReport| r.predictions[0].markets[0].get(crate::markets::Selection::Home).unwrap();
        assert!(home(&mixed) < home(&plain));
        assert!(plain.predictions[0].elo_match_result.is_none());
        assert!(mixed.predictions[0].elo_match_result.is_some());
    }
}
