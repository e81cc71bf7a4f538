use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::elo::EloModel;
use crate::error::{ConfigError, SkipReason};
use crate::team_names::canonical_key;

/// League-average-normalised strengths for one team. Defense above 1.0 concedes
/// more than the league average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRating {
    pub team: String,
    pub attack: f64,
    pub defense: f64,
}

// Strength files written by older tooling carry both long and short keys.
#[derive(Debug, Deserialize)]
struct StrengthEntry {
    attack: Option<f64>,
    att: Option<f64>,
    defense: Option<f64>,
    #[serde(rename = "def")]
    def_short: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RatingFile {
    Records(Vec<TeamRating>),
    Strengths {
        teams: BTreeMap<String, StrengthEntry>,
        #[serde(rename = "baseGoals", alias = "league_avg_gpg")]
        base_goals: Option<f64>,
        #[serde(rename = "homeAdvantage", alias = "home_adv")]
        home_advantage: Option<f64>,
    },
}

/// League constants a fitted strengths file was normalised against.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LeagueConstants {
    pub base_goals: Option<f64>,
    pub home_advantage: Option<f64>,
}

/// Immutable per-run table of team ratings, keyed by canonical team name.
#[derive(Debug, Clone, Default)]
pub struct RatingStore {
    by_key: HashMap<String, TeamRating>,
    league: LeagueConstants,
    elo: Option<EloModel>,
}

impl RatingStore {
    pub fn from_records(records: impl IntoIterator<Item = TeamRating>) -> Result<Self, ConfigError> {
        let mut by_key: HashMap<String, TeamRating> = HashMap::new();
        for record in records {
            validate_strength(&record.team, "attack", record.attack)?;
            validate_strength(&record.team, "defense", record.defense)?;
            let key = canonical_key(&record.team);
            if let Some(existing) = by_key.get(&key) {
                return Err(ConfigError::DuplicateRating {
                    team: record.team,
                    existing: existing.team.clone(),
                });
            }
            by_key.insert(key, record);
        }
        Ok(Self {
            by_key,
            ..Self::default()
        })
    }

    pub fn with_elo(mut self, elo: EloModel) -> Self {
        self.elo = Some(elo);
        self
    }

    pub fn elo(&self) -> Option<&EloModel> {
        self.elo.as_ref()
    }

    /// Constants stored alongside the ratings, if the source carried any.
    pub fn league(&self) -> LeagueConstants {
        self.league
    }

    pub fn lookup(&self, team: &str) -> Result<&TeamRating, SkipReason> {
        self.by_key
            .get(&canonical_key(team))
            .ok_or_else(|| SkipReason::UnknownTeam {
                team: team.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Ratings sorted by display name, for stable output.
    pub fn ratings(&self) -> Vec<&TeamRating> {
        let mut out: Vec<&TeamRating> = self.by_key.values().collect();
        out.sort_by(|a, b| a.team.cmp(&b.team));
        out
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut records = Vec::new();
        for (idx, row) in rdr.deserialize::<TeamRating>().enumerate() {
            let row = row.with_context(|| format!("ratings csv row {}", idx + 1))?;
            records.push(row);
        }
        Ok(Self::from_records(records)?)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: RatingFile = serde_json::from_str(raw).context("parse ratings json")?;
        let mut league = LeagueConstants::default();
        let records = match file {
            RatingFile::Records(records) => records,
            RatingFile::Strengths {
                teams,
                base_goals,
                home_advantage,
            } => {
                league = LeagueConstants {
                    base_goals,
                    home_advantage,
                };
                let mut records = Vec::with_capacity(teams.len());
                for (team, s) in teams {
                    let Some(attack) = s.attack.or(s.att) else {
                        bail!("strengths entry '{team}' has no attack value");
                    };
                    let Some(defense) = s.defense.or(s.def_short) else {
                        bail!("strengths entry '{team}' has no defense value");
                    };
                    records.push(TeamRating {
                        team,
                        attack,
                        defense,
                    });
                }
                records
            }
        };
        let mut store = Self::from_records(records)?;
        store.league = league;
        Ok(store)
    }

    pub fn load_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => {
                let file = fs::File::open(path)
                    .with_context(|| format!("open ratings {}", path.display()))?;
                Self::from_csv_reader(file)
            }
            Some("json") => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("read ratings {}", path.display()))?;
                Self::from_json_str(&raw)
            }
            _ => bail!("ratings file {} must be .csv or .json", path.display()),
        }
    }
}

fn validate_strength(team: &str, field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidRating {
            team: team.to_string(),
            field,
            value,
        })
    }
}
