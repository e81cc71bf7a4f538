use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::calibration::Prob3;
use crate::config::ModelConfig;
use crate::error::ConfigError;
use crate::fixtures::Fixture;
use crate::goal_model::{self, ExpectedGoals};
use crate::markets::{self, MarketProbabilities, MarketSpec, Selection};
use crate::ratings::TeamRating;
use crate::scoreline::{ScorelineDistribution, ScorelineProb};

/// Published per-fixture probabilities.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub expected_goals: ExpectedGoals,
    /// Mean goals per side over the truncated, corrected grid.
    pub grid_expected_goals: ExpectedGoals,
    #[serde(serialize_with = "serialize_markets")]
    pub markets: Vec<MarketProbabilities>,
    pub top_scorelines: Vec<ScorelineProb>,
    /// Elo 1X2 view of the fixture, when Elo ratings were loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elo_match_result: Option<Prob3>,
}

impl Prediction {
    pub fn market(&self, spec: &MarketSpec) -> Option<&MarketProbabilities> {
        self.markets.iter().find(|m| m.market == *spec)
    }

    pub fn probability(&self, spec: &MarketSpec, selection: Selection) -> Option<f64> {
        self.market(spec).and_then(|m| m.get(selection))
    }
}

/// Ratings -> goal rates -> scoreline grid -> every configured market.
///
/// Also returns how many grid cells the low-score correction clamped.
pub fn predict_fixture(
    fixture: &Fixture,
    home: &TeamRating,
    away: &TeamRating,
    cfg: &ModelConfig,
) -> Result<(Prediction, usize), ConfigError> {
    predict_fixture_with_elo(fixture, home, away, None, cfg)
}

/// As [`predict_fixture`], mixing `elo` into the match-result market with
/// weight `cfg.elo_blend`. Other markets stay purely Poisson.
pub fn predict_fixture_with_elo(
    fixture: &Fixture,
    home: &TeamRating,
    away: &TeamRating,
    elo: Option<Prob3>,
    cfg: &ModelConfig,
) -> Result<(Prediction, usize), ConfigError> {
    let xg = goal_model::estimate(home, away, &cfg.params())?;
    let dist = ScorelineDistribution::build(&xg, cfg.max_goals, cfg.rho);

    let mut markets = cfg
        .markets
        .iter()
        .map(|spec| markets::aggregate(&dist, spec))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(elo) = elo
        && cfg.elo_blend > 0.0
    {
        for m in markets.iter_mut().filter(|m| m.market == MarketSpec::MatchResult) {
            blend_match_result(m, &elo, cfg.elo_blend);
        }
    }

    let prediction = Prediction {
        home_team: fixture.home_team.clone(),
        away_team: fixture.away_team.clone(),
        kickoff: fixture.kickoff,
        expected_goals: xg,
        grid_expected_goals: dist.mean_goals(),
        markets,
        top_scorelines: dist.top_scorelines(cfg.top_scorelines),
        elo_match_result: elo,
    };
    Ok((prediction, dist.clamped_cells()))
}

fn blend_match_result(market: &mut MarketProbabilities, elo: &Prob3, weight: f64) {
    let w = weight.clamp(0.0, 1.0);
    for (selection, p) in market.selections.iter_mut() {
        let other = match selection {
            Selection::Home => elo.home,
            Selection::Draw => elo.draw,
            Selection::Away => elo.away,
            _ => *p,
        };
        *p = (1.0 - w) * *p + w * other;
    }
    let total = market.total();
    if total > 0.0 {
        for (_, p) in market.selections.iter_mut() {
            *p /= total;
        }
    }
}

fn serialize_markets<S: Serializer>(
    markets: &[MarketProbabilities],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(markets.len()))?;
    for m in markets {
        map.serialize_entry(&m.market.key(), m)?;
    }
    map.end()
}
