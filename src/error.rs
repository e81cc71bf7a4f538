use serde::Serialize;
use thiserror::Error;

/// Fatal for the whole run. Nothing is published when one of these surfaces.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value}")]
    OutOfRange {
        name: &'static str,
        expected: &'static str,
        value: f64,
    },

    #[error("unknown market spec '{0}'")]
    UnknownMarket(String),

    #[error("totals line {line} must be a positive half-goal line such as 2.5")]
    InvalidTotalsLine { line: f64 },

    #[error("totals line {line} does not fit inside a grid capped at {max_goals} goals")]
    TotalsBeyondGrid { line: f64, max_goals: u32 },

    #[error("market '{0}' is configured more than once")]
    DuplicateMarket(String),

    #[error("no markets configured")]
    NoMarkets,

    #[error("rating for '{team}' has invalid {field} {value}")]
    InvalidRating {
        team: String,
        field: &'static str,
        value: f64,
    },

    #[error("rating for '{team}' collides with '{existing}' after name normalisation")]
    DuplicateRating { team: String, existing: String },

    #[error("expected goals must be positive, got home {home} away {away}")]
    NonPositiveRate { home: f64, away: f64 },

    #[error("invalid value '{raw}' for {name}")]
    Unparseable { name: &'static str, raw: String },
}

/// Why a single fixture was left out of the published collections.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SkipReason {
    #[error("no rating for team '{team}'")]
    UnknownTeam { team: String },

    #[error("fixture is missing {field}")]
    MissingField { field: &'static str },

    #[error("kickoff '{raw}' is not a valid timestamp")]
    InvalidKickoff { raw: String },

    #[error("fixture record could not be read: {detail}")]
    Malformed { detail: String },
}

/// Why one quoted price was excluded from edge comparison.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OddsRejection {
    #[error("price is not a number")]
    NotNumeric,

    #[error("price is not finite")]
    NotFinite,

    #[error("decimal price must be above 1.0")]
    NotAboveOne,

    #[error("market quotes are not an object of prices")]
    NotAMarket,
}
