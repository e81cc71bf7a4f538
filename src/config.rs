use std::collections::HashSet;
use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::goal_model::ModelParams;
use crate::markets::MarketSpec;
use crate::ratings::LeagueConstants;

const DEFAULT_EDGE_THRESHOLD: f64 = 0.02;
const DEFAULT_MAX_GOALS: u32 = 10;
const DEFAULT_TOP_SCORELINES: usize = 3;
const MIN_MAX_GOALS: u32 = 4;
const MAX_MAX_GOALS: u32 = 30;
const MAX_PARALLELISM: usize = 32;

/// Everything a run needs besides its input records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    pub base_goals: f64,
    pub home_advantage: f64,
    pub rho: f64,
    pub edge_threshold: f64,
    pub max_goals: u32,
    pub markets: Vec<MarketSpec>,
    pub top_scorelines: usize,
    /// Worker threads for the fixture pool; `None` uses every core.
    pub parallelism: Option<usize>,
    /// Weight of the Elo 1X2 probabilities mixed into the match-result market.
    pub elo_blend: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let params = ModelParams::default();
        Self {
            base_goals: params.base_goals,
            home_advantage: params.home_advantage,
            rho: params.rho,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            max_goals: DEFAULT_MAX_GOALS,
            markets: vec![
                MarketSpec::MatchResult,
                MarketSpec::Totals {
                    goals_below_line: 2,
                },
                MarketSpec::BothTeamsToScore,
            ],
            top_scorelines: DEFAULT_TOP_SCORELINES,
            parallelism: None,
            elo_blend: 0.0,
        }
    }
}

impl ModelConfig {
    /// Read `PLPRED_*` variables from the process environment. Unset variables
    /// keep their defaults; set-but-unparseable ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_over(Self::default())
    }

    /// Like [`ModelConfig::from_env`], but unset variables keep `base`'s values.
    pub fn from_env_over(base: Self) -> Result<Self, ConfigError> {
        Self::from_lookup_over(base, |name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup_over(Self::default(), lookup)
    }

    pub fn from_lookup_over(
        base: Self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut cfg = base;
        let get = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        };

        if let Some((name, raw)) = get("PLPRED_BASE_GOALS") {
            cfg.base_goals = parse_num(name, &raw)?;
        }
        if let Some((name, raw)) = get("PLPRED_HOME_ADVANTAGE") {
            cfg.home_advantage = parse_num(name, &raw)?;
        }
        if let Some((name, raw)) = get("PLPRED_RHO") {
            cfg.rho = parse_num(name, &raw)?;
        }
        if let Some((name, raw)) = get("PLPRED_EDGE_THRESHOLD") {
            cfg.edge_threshold = parse_num(name, &raw)?;
        }
        if let Some((name, raw)) = get("PLPRED_MAX_GOALS") {
            cfg.max_goals = parse_num(name, &raw)?;
        }
        if let Some((name, raw)) = get("PLPRED_TOP_SCORELINES") {
            cfg.top_scorelines = parse_num(name, &raw)?;
        }
        if let Some((name, raw)) = get("PLPRED_ELO_BLEND") {
            cfg.elo_blend = parse_num(name, &raw)?;
        }
        if let Some((name, raw)) = get("PLPRED_PARALLELISM") {
            let threads: usize = parse_num(name, &raw)?;
            cfg.parallelism = Some(threads.clamp(1, MAX_PARALLELISM));
        }
        if let Some((_, raw)) = get("PLPRED_MARKETS") {
            cfg.markets = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<MarketSpec>)
                .collect::<Result<Vec<MarketSpec>, _>>()?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check(
            "baseGoals",
            "a positive number",
            self.base_goals,
            self.base_goals > 0.0,
        )?;
        check(
            "homeAdvantage",
            "at least 1.0",
            self.home_advantage,
            self.home_advantage >= 1.0,
        )?;
        check("rho", "a finite number", self.rho, true)?;
        check(
            "edgeThreshold",
            "zero or more",
            self.edge_threshold,
            self.edge_threshold >= 0.0,
        )?;
        check(
            "eloBlend",
            "between 0 and 1",
            self.elo_blend,
            (0.0..=1.0).contains(&self.elo_blend),
        )?;
        if !(MIN_MAX_GOALS..=MAX_MAX_GOALS).contains(&self.max_goals) {
            return Err(ConfigError::OutOfRange {
                name: "maxGoals",
                expected: "an integer between 4 and 30",
                value: self.max_goals as f64,
            });
        }

        if self.markets.is_empty() {
            return Err(ConfigError::NoMarkets);
        }
        let mut seen = HashSet::new();
        for market in &self.markets {
            if !seen.insert(*market) {
                return Err(ConfigError::DuplicateMarket(market.key()));
            }
            market.validate(self.max_goals)?;
        }
        Ok(())
    }

    /// Take base goals and home advantage from a fitted ratings file.
    pub fn with_league(mut self, league: LeagueConstants) -> Self {
        if let Some(base_goals) = league.base_goals {
            self.base_goals = base_goals;
        }
        if let Some(home_advantage) = league.home_advantage {
            self.home_advantage = home_advantage;
        }
        self
    }

    pub fn params(&self) -> ModelParams {
        ModelParams {
            base_goals: self.base_goals,
            home_advantage: self.home_advantage,
            rho: self.rho,
        }
    }
}

fn check(name: &'static str, expected: &'static str, value: f64, ok: bool) -> Result<(), ConfigError> {
    if value.is_finite() && ok {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            expected,
            value,
        })
    }
}

fn parse_num<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::Unparseable {
        name,
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = ModelConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, ModelConfig::default());
        assert_eq!(cfg.edge_threshold, 0.02);
        assert_eq!(cfg.markets.len(), 3);
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = ModelConfig::from_lookup(lookup(&[
            ("PLPRED_BASE_GOALS", "1.4"),
            ("PLPRED_RHO", " -0.13 "),
            ("PLPRED_MARKETS", "1x2, totals:3.5"),
            ("PLPRED_PARALLELISM", "500"),
        ]))
        .unwrap();
        assert_eq!(cfg.base_goals, 1.4);
        assert_eq!(cfg.rho, -0.13);
        assert_eq!(
            cfg.markets,
            vec![
                MarketSpec::MatchResult,
                MarketSpec::Totals {
                    goals_below_line: 3
                }
            ]
        );
        assert_eq!(cfg.parallelism, Some(32));
    }

    #[test]
    fn bad_values_are_fatal() {
        let err = ModelConfig::from_lookup(lookup(&[("PLPRED_EDGE_THRESHOLD", "two")])).unwrap_err();
        assert!(matches!(err, ConfigError::Unparseable { .. }));

        let err = ModelConfig::from_lookup(lookup(&[("PLPRED_HOME_ADVANTAGE", "0.9")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "homeAdvantage", .. }));

        let err = ModelConfig::from_lookup(lookup(&[("PLPRED_MAX_GOALS", "3")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "maxGoals", .. }));

        let err = ModelConfig::from_lookup(lookup(&[("PLPRED_MARKETS", "corners")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMarket(_)));
    }

    #[test]
    fn env_beats_fitted_league_constants() {
        let league = LeagueConstants {
            base_goals: Some(1.6),
            home_advantage: Some(1.25),
        };
        let base = ModelConfig::default().with_league(league);

        let cfg = ModelConfig::from_lookup_over(base.clone(), lookup(&[])).unwrap();
        assert_eq!(cfg.base_goals, 1.6);
        assert_eq!(cfg.home_advantage, 1.25);

        let cfg = ModelConfig::from_lookup_over(base, lookup(&[("PLPRED_BASE_GOALS", "1.4")])).unwrap();
        assert_eq!(cfg.base_goals, 1.4);
        assert_eq!(cfg.home_advantage, 1.25);

        let cfg = ModelConfig::default().with_league(LeagueConstants::default());
        assert_eq!(cfg, ModelConfig::default());
    }

    #[test]
    fn elo_blend_is_a_weight() {
        let cfg = ModelConfig::from_lookup(lookup(&[("PLPRED_ELO_BLEND", "0.4")])).unwrap();
        assert_eq!(cfg.elo_blend, 0.4);
        let err = ModelConfig::from_lookup(lookup(&[("PLPRED_ELO_BLEND", "1.5")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "eloBlend", .. }));
    }

    #[test]
    fn max_goals_is_capped() {
        let cfg = ModelConfig::from_lookup(lookup(&[("PLPRED_MAX_GOALS", "30")])).unwrap();
        assert_eq!(cfg.max_goals, 30);

        for raw in ["31", "4294967295"] {
            let err = ModelConfig::from_lookup(lookup(&[("PLPRED_MAX_GOALS", raw)])).unwrap_err();
            assert!(matches!(err, ConfigError::OutOfRange { name: "maxGoals", .. }));
        }
    }

    #[test]
    fn market_list_must_be_unique_and_fit_grid() {
        let cfg = ModelConfig {
            markets: vec![MarketSpec::MatchResult, MarketSpec::MatchResult],
            ..ModelConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateMarket(_))));

        let cfg = ModelConfig {
            max_goals: 4,
            markets: vec![MarketSpec::Totals {
                goals_below_line: 4,
            }],
            ..ModelConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::TotalsBeyondGrid { .. })));
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let cfg: ModelConfig =
            serde_json::from_str(r#"{"baseGoals":1.5,"markets":["1x2","btts"]}"#).unwrap();
        assert_eq!(cfg.base_goals, 1.5);
        assert_eq!(cfg.max_goals, 10);
        assert_eq!(cfg.markets, vec![MarketSpec::MatchResult, MarketSpec::BothTeamsToScore]);
        cfg.validate().unwrap();
    }
}
