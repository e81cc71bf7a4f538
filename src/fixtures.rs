use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OddsRejection, SkipReason};

/// `{market: {selection: price}}` exactly as a provider quoted it.
pub type FixtureOdds = BTreeMap<String, MarketQuotes>;

/// One market's quotes. Anything other than an object is kept as-is so the
/// tip selector can reject that market without losing the fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarketQuotes {
    Prices(BTreeMap<String, PriceValue>),
    Malformed(serde_json::Value),
}

impl MarketQuotes {
    pub fn prices(&self) -> Option<&BTreeMap<String, PriceValue>> {
        match self {
            Self::Prices(prices) => Some(prices),
            Self::Malformed(_) => None,
        }
    }
}

/// A quoted decimal price. Providers occasionally send strings or nulls, so the
/// raw value is kept and checked per selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceValue {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl PriceValue {
    pub fn decimal(&self) -> Result<f64, OddsRejection> {
        let v = match self {
            Self::Number(v) => *v,
            Self::Text(s) => s.trim().parse::<f64>().map_err(|_| OddsRejection::NotNumeric)?,
            Self::Other(_) => return Err(OddsRejection::NotNumeric),
        };
        if !v.is_finite() {
            return Err(OddsRejection::NotFinite);
        }
        if v <= 1.0 {
            return Err(OddsRejection::NotAboveOne);
        }
        Ok(v)
    }
}

impl From<f64> for PriceValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Fixture as supplied by the data layer, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureRecord {
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
    #[serde(default)]
    pub kickoff: Option<String>,
    #[serde(default)]
    pub odds: Option<FixtureOdds>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub odds: FixtureOdds,
}

impl Fixture {
    pub fn new(home_team: impl Into<String>, away_team: impl Into<String>, kickoff: DateTime<Utc>) -> Self {
        Self {
            home_team: home_team.into(),
            away_team: away_team.into(),
            kickoff,
            odds: FixtureOdds::new(),
        }
    }

    pub fn with_odds(
        mut self,
        market: impl Into<String>,
        selection: impl Into<String>,
        price: impl Into<PriceValue>,
    ) -> Self {
        let quotes = self
            .odds
            .entry(market.into())
            .or_insert_with(|| MarketQuotes::Prices(BTreeMap::new()));
        if let MarketQuotes::Malformed(_) = quotes {
            *quotes = MarketQuotes::Prices(BTreeMap::new());
        }
        if let MarketQuotes::Prices(prices) = quotes {
            prices.insert(selection.into(), price.into());
        }
        self
    }
}

impl FixtureRecord {
    pub fn validate(self) -> Result<Fixture, SkipReason> {
        let home_team = required(self.home_team, "homeTeam")?;
        let away_team = required(self.away_team, "awayTeam")?;
        let raw_kickoff = required(self.kickoff, "kickoff")?;
        let kickoff =
            parse_kickoff(&raw_kickoff).ok_or(SkipReason::InvalidKickoff { raw: raw_kickoff })?;
        Ok(Fixture {
            home_team,
            away_team,
            kickoff,
            odds: self.odds.unwrap_or_default(),
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, SkipReason> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(SkipReason::MissingField { field })
}

/// RFC 3339 (`2025-08-17T13:00:00Z`) or a bare `YYYY-MM-DD HH:MM[:SS]` taken as UTC.
pub fn parse_kickoff(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// One element of a fixtures file: a record, or the reason it could not be read.
#[derive(Debug, Clone)]
pub enum FixtureEntry {
    Record(FixtureRecord),
    Malformed {
        home_team: Option<String>,
        away_team: Option<String>,
        reason: SkipReason,
    },
}

impl FixtureEntry {
    /// Decode one element on its own so a bad record only costs itself.
    pub fn from_value(value: serde_json::Value) -> Self {
        let name = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let home_team = name("homeTeam");
        let away_team = name("awayTeam");
        match serde_json::from_value::<FixtureRecord>(value) {
            Ok(record) => Self::Record(record),
            Err(err) => Self::Malformed {
                home_team,
                away_team,
                reason: SkipReason::Malformed {
                    detail: err.to_string(),
                },
            },
        }
    }

    pub fn home_team(&self) -> Option<&str> {
        match self {
            Self::Record(r) => r.home_team.as_deref(),
            Self::Malformed { home_team, .. } => home_team.as_deref(),
        }
    }

    pub fn away_team(&self) -> Option<&str> {
        match self {
            Self::Record(r) => r.away_team.as_deref(),
            Self::Malformed { away_team, .. } => away_team.as_deref(),
        }
    }
}

impl From<FixtureRecord> for FixtureEntry {
    fn from(value: FixtureRecord) -> Self {
        Self::Record(value)
    }
}

/// A JSON array of fixtures, or an object carrying one under `fixtures`.
///
/// Only the outer shape is fatal. Each element is decoded separately.
pub fn parse_fixture_records(raw: &str) -> Result<Vec<FixtureEntry>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FixtureFile {
        List(Vec<serde_json::Value>),
        Wrapped { fixtures: Vec<serde_json::Value> },
    }

    let file: FixtureFile = serde_json::from_str(raw).context("parse fixtures json")?;
    let values = match file {
        FixtureFile::List(list) => list,
        FixtureFile::Wrapped { fixtures } => fixtures,
    };
    Ok(values.into_iter().map(FixtureEntry::from_value).collect())
}
