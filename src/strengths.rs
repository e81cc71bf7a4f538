use std::collections::BTreeMap;
use std::io::Read;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ratings::{RatingStore, TeamRating};
use crate::team_names::canonical_key;

const HOME_ADV_MIN: f64 = 1.0;
const HOME_ADV_MAX: f64 = 1.3;

/// One finished match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(default, alias = "utc_date", alias = "date")]
    pub kickoff: Option<String>,
    pub home: String,
    pub away: String,
    #[serde(alias = "goals_h")]
    pub home_goals: u32,
    #[serde(alias = "goals_a")]
    pub away_goals: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// League-average pseudo-games blended into every team. Keeps a team that
    /// has not scored yet from getting a zero attack rating.
    pub prior_games: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self { prior_games: 2.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStrength {
    pub attack: f64,
    pub defense: f64,
    pub games: u32,
}

/// Ratings plus the league constants they were normalised against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FittedStrengths {
    pub base_goals: f64,
    pub home_advantage: f64,
    pub matches: usize,
    pub teams: BTreeMap<String, TeamStrength>,
}

impl FittedStrengths {
    pub fn rating_store(&self) -> Result<RatingStore> {
        let records = self.teams.iter().map(|(team, s)| TeamRating {
            team: team.clone(),
            attack: s.attack,
            defense: s.defense,
        });
        Ok(RatingStore::from_records(records)?)
    }
}

#[derive(Default)]
struct Tally {
    name: String,
    scored: f64,
    conceded: f64,
    games: u32,
}

/// Attack and defense as goals for/against per game over the league's goals
/// per team per game. Home advantage is home goals per game over away goals per
/// game, kept inside `[1.0, 1.3]`.
pub fn fit_from_results(results: &[MatchResult], opts: FitOptions) -> Result<FittedStrengths> {
    let n = results.len();
    if n == 0 {
        bail!("no finished matches to fit strengths from");
    }

    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
    let mut home_total = 0.0_f64;
    let mut away_total = 0.0_f64;

    for m in results {
        let hg = m.home_goals as f64;
        let ag = m.away_goals as f64;
        home_total += hg;
        away_total += ag;

        for (team, scored, conceded) in [(&m.home, hg, ag), (&m.away, ag, hg)] {
            let t = tallies.entry(canonical_key(team)).or_default();
            if t.name.is_empty() {
                t.name = team.trim().to_string();
            }
            t.scored += scored;
            t.conceded += conceded;
            t.games += 1;
        }
    }

    let league_pg = (home_total + away_total) / (2.0 * n as f64);
    if league_pg <= 0.0 {
        bail!("results contain no goals; strengths are undefined");
    }
    let home_pg = home_total / n as f64;
    let away_pg = away_total / n as f64;
    let home_advantage = (home_pg / away_pg.max(1e-9)).clamp(HOME_ADV_MIN, HOME_ADV_MAX);

    let k = opts.prior_games.max(0.0);
    let mut teams = BTreeMap::new();
    for t in tallies.into_values() {
        let denom = t.games as f64 + k;
        let attack = (t.scored + k * league_pg) / denom / league_pg;
        let defense = (t.conceded + k * league_pg) / denom / league_pg;
        teams.insert(
            t.name,
            TeamStrength {
                attack,
                defense,
                games: t.games,
            },
        );
    }

    info!(
        matches = n,
        teams = teams.len(),
        base_goals = league_pg,
        home_advantage,
        "fitted team strengths"
    );

    Ok(FittedStrengths {
        base_goals: league_pg,
        home_advantage,
        matches: n,
        teams,
    })
}

pub fn read_results_csv<R: Read>(reader: R) -> Result<Vec<MatchResult>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut out = Vec::new();
    for (idx, row) in rdr.deserialize::<MatchResult>().enumerate() {
        out.push(row.with_context(|| format!("results csv row {}", idx + 1))?);
    }
    Ok(out)
}
