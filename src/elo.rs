use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibration::Prob3;
use crate::fixtures::parse_kickoff;
use crate::strengths::MatchResult;
use crate::team_names::canonical_key;

const DRAW_RATE_MIN: f64 = 0.15;
const DRAW_RATE_MAX: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloConfig {
    pub init: f64,
    pub k: f64,
    pub scale: f64,
    pub home_adv_pts: f64,
    /// Age at which a result counts half as much. Zero or less disables decay.
    pub half_life_days: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            init: 1500.0,
            k: 20.0,
            scale: 400.0,
            home_adv_pts: 60.0,
            half_life_days: 365.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EloTeam {
    pub elo: f64,
    pub games: u32,
}

/// Fitted Elo ratings plus the constants needed to turn them into 1X2 odds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EloTable {
    pub init: f64,
    pub scale: f64,
    #[serde(alias = "home_adv_points")]
    pub home_adv_points: f64,
    #[serde(alias = "draw_nu")]
    pub draw_nu: f64,
    pub teams: BTreeMap<String, EloTeam>,
}

impl Default for EloTable {
    fn default() -> Self {
        let cfg = EloConfig::default();
        Self {
            init: cfg.init,
            scale: cfg.scale,
            home_adv_points: cfg.home_adv_pts,
            draw_nu: 1.0,
            teams: BTreeMap::new(),
        }
    }
}

impl EloTable {
    pub fn load_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read elo ratings {}", path.display()))?;
        serde_json::from_str(&raw).context("parse elo ratings json")
    }

    pub fn model(&self) -> EloModel {
        EloModel {
            init: self.init,
            scale: self.scale,
            home_adv_points: self.home_adv_points,
            draw_nu: self.draw_nu,
            by_key: self
                .teams
                .iter()
                .map(|(team, t)| (canonical_key(team), t.elo))
                .collect(),
        }
    }
}

/// Lookup side of an [`EloTable`], keyed by canonical team name.
#[derive(Debug, Clone, PartialEq)]
pub struct EloModel {
    init: f64,
    scale: f64,
    home_adv_points: f64,
    draw_nu: f64,
    by_key: HashMap<String, f64>,
}

impl EloModel {
    /// Teams never seen in the results sit at the initial rating.
    pub fn rating(&self, team: &str) -> f64 {
        self.by_key
            .get(&canonical_key(team))
            .copied()
            .unwrap_or(self.init)
    }

    pub fn match_probs(&self, home: &str, away: &str) -> Prob3 {
        match_probs(
            self.rating(home),
            self.rating(away),
            self.home_adv_points,
            self.scale,
            self.draw_nu,
        )
    }
}

/// Davidson-style three-way split of the rating gap. `draw_nu` scales the draw
/// mass relative to the geometric mean of the two win terms.
pub fn match_probs(elo_home: f64, elo_away: f64, home_adv_points: f64, scale: f64, draw_nu: f64) -> Prob3 {
    let delta = (elo_home + home_adv_points) - elo_away;
    let r = 10.0_f64.powf(delta / scale.max(1e-6));
    let r_sqrt = r.sqrt();
    let denom = r + 1.0 + draw_nu * r_sqrt;
    if !(denom.is_finite() && denom > 0.0) {
        return Prob3 {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        };
    }
    Prob3 {
        home: r / denom,
        draw: draw_nu * r_sqrt / denom,
        away: 1.0 / denom,
    }
}

pub fn draw_nu_for_rate(draw_rate: f64) -> f64 {
    let rate = draw_rate.clamp(DRAW_RATE_MIN, DRAW_RATE_MAX);
    2.0 * rate / (1.0 - rate)
}

/// Replay `results` in kickoff order. Results without a readable kickoff are
/// treated as played at `now`.
pub fn build_elo(results: &[MatchResult], cfg: EloConfig, now: DateTime<Utc>) -> EloTable {
    if results.is_empty() {
        return EloTable {
            init: cfg.init,
            scale: cfg.scale,
            home_adv_points: cfg.home_adv_pts,
            draw_nu: 1.0,
            teams: BTreeMap::new(),
        };
    }

    let mut ordered: Vec<(DateTime<Utc>, &MatchResult)> = results
        .iter()
        .map(|m| {
            let kickoff = m.kickoff.as_deref().and_then(parse_kickoff).unwrap_or(now);
            (kickoff, m)
        })
        .collect();
    ordered.sort_by_key(|(kickoff, _)| *kickoff);

    let draws = results.iter().filter(|m| m.home_goals == m.away_goals).count();
    let draw_nu = draw_nu_for_rate(draws as f64 / results.len() as f64);

    // canonical key -> (display name, rating, games)
    let mut table: HashMap<String, (String, f64, u32)> = HashMap::new();
    for (kickoff, m) in ordered {
        let age_days = ((now - kickoff).num_seconds() as f64 / 86_400.0).max(0.0);
        let k = cfg.k * half_life_weight(age_days, cfg.half_life_days);

        let home_key = canonical_key(&m.home);
        let away_key = canonical_key(&m.away);
        let rh = table.get(&home_key).map_or(cfg.init, |t| t.1);
        let ra = table.get(&away_key).map_or(cfg.init, |t| t.1);

        let delta = (rh + cfg.home_adv_pts) - ra;
        let expected_home = expected_score(delta, cfg.scale);
        let s_home = if m.home_goals > m.away_goals {
            1.0
        } else if m.home_goals < m.away_goals {
            0.0
        } else {
            0.5
        };
        let gd = m.home_goals.abs_diff(m.away_goals);
        let change = k * goal_diff_factor(gd, delta.abs()) * (s_home - expected_home);

        for (key, name, rating) in [(home_key, &m.home, rh + change), (away_key, &m.away, ra - change)] {
            let entry = table
                .entry(key)
                .or_insert_with(|| (name.trim().to_string(), cfg.init, 0));
            entry.1 = rating;
            entry.2 += 1;
        }
    }

    let teams: BTreeMap<String, EloTeam> = table
        .into_values()
        .map(|(name, elo, games)| (name, EloTeam { elo, games }))
        .collect();
    info!(matches = results.len(), teams = teams.len(), draw_nu, "fitted elo ratings");

    EloTable {
        init: cfg.init,
        scale: cfg.scale,
        home_adv_points: cfg.home_adv_pts,
        draw_nu,
        teams,
    }
}

fn expected_score(delta_points: f64, scale: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-delta_points / scale))
}

fn half_life_weight(age_days: f64, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        return 1.0;
    }
    0.5_f64.powf(age_days / half_life_days)
}

// Bigger wins move ratings more, damped when the gap was already large.
fn goal_diff_factor(goal_diff: u32, delta_abs: f64) -> f64 {
    let g = match goal_diff {
        0 | 1 => 1.0,
        2 => 1.5,
        n => (11.0 + n as f64) / 8.0,
    };
    g * (2.2 / (0.001 * delta_abs + 2.2))
}
