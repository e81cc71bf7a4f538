use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ratings::TeamRating;

/// League-level constants shared by every fixture in a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParams {
    /// League-average goals per team per match.
    pub base_goals: f64,
    /// Multiplicative boost applied to the home side.
    pub home_advantage: f64,
    /// Dixon-Coles low-score dependence (typically slightly negative).
    pub rho: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            base_goals: 1.35,
            home_advantage: 1.10,
            rho: -0.10,
        }
    }
}

/// Poisson means for each side of one fixture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedGoals {
    pub home: f64,
    pub away: f64,
}

pub fn estimate(
    home: &TeamRating,
    away: &TeamRating,
    params: &ModelParams,
) -> Result<ExpectedGoals, ConfigError> {
    let lambda_home = params.base_goals * home.attack * away.defense * params.home_advantage;
    let lambda_away = params.base_goals * away.attack * home.defense;

    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(lambda_home) || !valid(lambda_away) {
        return Err(ConfigError::NonPositiveRate {
            home: lambda_home,
            away: lambda_away,
        });
    }

    Ok(ExpectedGoals {
        home: lambda_home,
        away: lambda_away,
    })
}
