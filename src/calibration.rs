use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fixtures::parse_kickoff;
use crate::markets::{MarketSpec, Selection};
use crate::prediction::Prediction;
use crate::strengths::MatchResult;
use crate::team_names::canonical_key;

pub const DEFAULT_BINS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub hit_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

impl Prob3 {
    pub fn from_prediction(prediction: &Prediction) -> Option<Self> {
        let m = MarketSpec::MatchResult;
        Some(Self {
            home: prediction.probability(&m, Selection::Home)?,
            draw: prediction.probability(&m, Selection::Draw)?,
            away: prediction.probability(&m, Selection::Away)?,
        })
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    /// Most likely outcome; ties go home, then draw.
    pub fn top_pick(&self) -> (Outcome, f64) {
        let mut best = (Outcome::Home, self.home);
        for outcome in [Outcome::Draw, Outcome::Away] {
            let p = self.get(outcome);
            if p > best.1 {
                best = (outcome, p);
            }
        }
        best
    }
}

pub fn classify_outcome(home_goals: u32, away_goals: u32) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

pub fn evaluate_probs(predictions: &[Prob3], outcomes: &[Outcome]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            hit_rate: 0.0,
        };
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut hits = 0usize;

    for (p, outcome) in predictions.iter().zip(outcomes) {
        for candidate in [Outcome::Home, Outcome::Draw, Outcome::Away] {
            let y = if candidate == *outcome { 1.0 } else { 0.0 };
            brier_sum += (p.get(candidate) - y).powi(2);
        }
        log_loss_sum += -p.get(*outcome).clamp(1e-12, 1.0).ln();
        if p.top_pick().0 == *outcome {
            hits += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        hit_rate: hits as f64 / n,
    }
}

/// Reliability of the top pick: bucket by its probability, compare with how
/// often it actually came in.
pub fn calibration_bins(predictions: &[Prob3], outcomes: &[Outcome], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let (pick, prob) = p.top_pick();
        let prob = prob.clamp(0.0, 1.0);
        let idx = ((prob * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += prob;
        if pick == *outcome {
            actual_sum[idx] += 1.0;
        }
    }

    (0..bins)
        .map(|i| {
            let count = counts[i];
            let (avg_pred, actual_rate) = if count > 0 {
                (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
            } else {
                (0.0, 0.0)
            };
            CalibrationBin {
                bucket_start: i as f64 / bins as f64,
                bucket_end: (i + 1) as f64 / bins as f64,
                count,
                avg_pred,
                actual_rate,
            }
        })
        .collect()
}

/// A published prediction read back from a run report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedPrediction {
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    #[serde(default)]
    pub markets: BTreeMap<String, BTreeMap<String, f64>>,
}

impl PublishedPrediction {
    pub fn match_result(&self) -> Option<Prob3> {
        let m = self.markets.get(&MarketSpec::MatchResult.key())?;
        Some(Prob3 {
            home: *m.get("home")?,
            draw: *m.get("draw")?,
            away: *m.get("away")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestReport {
    pub metrics: Metrics,
    pub bins: Vec<CalibrationBin>,
    pub unmatched_predictions: usize,
}

type MatchKey = (String, String, NaiveDate);

fn result_key(result: &MatchResult) -> Option<MatchKey> {
    let date = parse_kickoff(result.kickoff.as_deref()?)?.date_naive();
    Some((canonical_key(&result.home), canonical_key(&result.away), date))
}

/// Pair predictions with finished matches by canonical team names and kickoff
/// date, then score the match-result probabilities.
///
/// Results without a parseable kickoff cannot be matched and are ignored.
pub fn backtest(predictions: &[PublishedPrediction], results: &[MatchResult]) -> BacktestReport {
    let by_key: HashMap<MatchKey, &MatchResult> = results
        .iter()
        .filter_map(|r| result_key(r).map(|k| (k, r)))
        .collect();

    let mut probs = Vec::new();
    let mut outcomes = Vec::new();
    let mut unmatched = 0usize;

    for pred in predictions {
        let key = (
            canonical_key(&pred.home_team),
            canonical_key(&pred.away_team),
            pred.kickoff.date_naive(),
        );
        let (Some(result), Some(p)) = (by_key.get(&key), pred.match_result()) else {
            debug!(home = %pred.home_team, away = %pred.away_team, "no result for prediction");
            unmatched += 1;
            continue;
        };
        probs.push(p);
        outcomes.push(classify_outcome(result.home_goals, result.away_goals));
    }

    let metrics = evaluate_probs(&probs, &outcomes);
    info!(
        samples = metrics.samples,
        unmatched,
        brier = metrics.brier,
        log_loss = metrics.log_loss,
        hit_rate = metrics.hit_rate,
        "backtest scored"
    );
    BacktestReport {
        metrics,
        bins: calibration_bins(&probs, &outcomes, DEFAULT_BINS),
        unmatched_predictions: unmatched,
    }
}
