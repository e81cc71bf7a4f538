use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ConfigError;
use crate::scoreline::ScorelineDistribution;

/// A market the model prices. Totals lines are always half-goal lines, stored
/// as the whole number below the line (`2` is over/under 2.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MarketSpec {
    MatchResult,
    Totals { goals_below_line: u32 },
    BothTeamsToScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    Home,
    Draw,
    Away,
    Over,
    Under,
    Yes,
    No,
}

impl MarketSpec {
    pub fn totals(line: f64) -> Result<Self, ConfigError> {
        let below = line - 0.5;
        if !(line.is_finite() && line > 0.0 && below.fract() == 0.0) {
            return Err(ConfigError::InvalidTotalsLine { line });
        }
        Ok(Self::Totals {
            goals_below_line: below as u32,
        })
    }

    pub fn key(&self) -> String {
        match self {
            Self::MatchResult => "match_result".to_string(),
            Self::Totals { .. } => format!("totals_{}", self.line().unwrap_or_default()),
            Self::BothTeamsToScore => "btts".to_string(),
        }
    }

    pub fn line(&self) -> Option<f64> {
        match self {
            Self::Totals { goals_below_line } => Some(*goals_below_line as f64 + 0.5),
            _ => None,
        }
    }

    /// Lower wins when two candidate tips are otherwise tied.
    pub fn priority(&self) -> u8 {
        match self {
            Self::MatchResult => 0,
            Self::Totals { .. } => 1,
            Self::BothTeamsToScore => 2,
        }
    }

    pub fn selections(&self) -> &'static [Selection] {
        match self {
            Self::MatchResult => &[Selection::Home, Selection::Draw, Selection::Away],
            Self::Totals { .. } => &[Selection::Over, Selection::Under],
            Self::BothTeamsToScore => &[Selection::Yes, Selection::No],
        }
    }

    /// Map a bookmaker's selection label onto this market's selections.
    pub fn parse_selection(&self, label: &str) -> Option<Selection> {
        let label = label.trim().to_ascii_lowercase();
        let sel = match (self, label.as_str()) {
            (Self::MatchResult, "home" | "1" | "h") => Selection::Home,
            (Self::MatchResult, "draw" | "x" | "d" | "tie") => Selection::Draw,
            (Self::MatchResult, "away" | "2" | "a") => Selection::Away,
            (Self::Totals { .. }, "over" | "o") => Selection::Over,
            (Self::Totals { .. }, "under" | "u") => Selection::Under,
            (Self::BothTeamsToScore, "yes" | "y") => Selection::Yes,
            (Self::BothTeamsToScore, "no" | "n") => Selection::No,
            _ => return None,
        };
        Some(sel)
    }

    /// Reject markets the scoreline grid cannot price.
    pub fn validate(&self, max_goals: u32) -> Result<(), ConfigError> {
        if let Self::Totals { goals_below_line } = self
            && *goals_below_line >= max_goals
        {
            return Err(ConfigError::TotalsBeyondGrid {
                line: *goals_below_line as f64 + 0.5,
                max_goals,
            });
        }
        Ok(())
    }
}

impl fmt::Display for MarketSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for MarketSpec {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim().to_ascii_lowercase();
        match s.as_str() {
            "match_result" | "1x2" | "h2h" | "result" => return Ok(Self::MatchResult),
            "btts" | "both_teams_to_score" => return Ok(Self::BothTeamsToScore),
            _ => {}
        }
        let line = ["totals:", "totals_", "over_under_", "ou_"]
            .iter()
            .find_map(|prefix| s.strip_prefix(prefix));
        let Some(line) = line else {
            return Err(ConfigError::UnknownMarket(raw.to_string()));
        };
        let line = line
            .parse::<f64>()
            .map_err(|_| ConfigError::UnknownMarket(raw.to_string()))?;
        Self::totals(line)
    }
}

impl TryFrom<String> for MarketSpec {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MarketSpec> for String {
    fn from(value: MarketSpec) -> Self {
        value.key()
    }
}

impl Selection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Draw => "draw",
            Self::Away => "away",
            Self::Over => "over",
            Self::Under => "under",
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One market's probability partition, in the market's fixed selection order.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketProbabilities {
    pub market: MarketSpec,
    pub selections: Vec<(Selection, f64)>,
}

impl MarketProbabilities {
    pub fn get(&self, selection: Selection) -> Option<f64> {
        self.selections
            .iter()
            .find(|(s, _)| *s == selection)
            .map(|(_, p)| *p)
    }

    pub fn total(&self) -> f64 {
        self.selections.iter().map(|(_, p)| p).sum()
    }
}

impl Serialize for MarketProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.selections.len()))?;
        for (sel, p) in &self.selections {
            map.serialize_entry(sel.as_str(), p)?;
        }
        map.end()
    }
}

pub fn aggregate(
    dist: &ScorelineDistribution,
    market: &MarketSpec,
) -> Result<MarketProbabilities, ConfigError> {
    market.validate(dist.max_goals())?;

    let selections = match market {
        MarketSpec::MatchResult => {
            let (mut home, mut draw, mut away) = (0.0, 0.0, 0.0);
            for (h, a, p) in dist.iter() {
                if h > a {
                    home += p;
                } else if h == a {
                    draw += p;
                } else {
                    away += p;
                }
            }
            vec![
                (Selection::Home, home),
                (Selection::Draw, draw),
                (Selection::Away, away),
            ]
        }
        MarketSpec::Totals { goals_below_line } => {
            let (mut over, mut under) = (0.0, 0.0);
            for (h, a, p) in dist.iter() {
                if h + a > *goals_below_line {
                    over += p;
                } else {
                    under += p;
                }
            }
            vec![(Selection::Over, over), (Selection::Under, under)]
        }
        MarketSpec::BothTeamsToScore => {
            let (mut yes, mut no) = (0.0, 0.0);
            for (h, a, p) in dist.iter() {
                if h > 0 && a > 0 {
                    yes += p;
                } else {
                    no += p;
                }
            }
            vec![(Selection::Yes, yes), (Selection::No, no)]
        }
    };

    Ok(MarketProbabilities {
        market: *market,
        selections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal_model::ExpectedGoals;

    fn dist() -> ScorelineDistribution {
        ScorelineDistribution::build(
            &ExpectedGoals {
                home: 1.93,
                away: 0.97,
            },
            10,
            -0.1,
        )
    }

    #[test]
    fn parses_market_aliases() {
        assert_eq!("1X2".parse::<MarketSpec>().unwrap(), MarketSpec::MatchResult);
        assert_eq!("btts".parse::<MarketSpec>().unwrap(), MarketSpec::BothTeamsToScore);
        assert_eq!(
            "totals:2.5".parse::<MarketSpec>().unwrap(),
            MarketSpec::Totals { goals_below_line: 2 }
        );
        assert_eq!(
            "over_under_3.5".parse::<MarketSpec>().unwrap(),
            MarketSpec::Totals { goals_below_line: 3 }
        );
        assert_eq!(MarketSpec::Totals { goals_below_line: 2 }.key(), "totals_2.5");
    }

    #[test]
    fn unknown_and_whole_lines_fail_loudly() {
        assert!(matches!(
            "asian_handicap".parse::<MarketSpec>(),
            Err(ConfigError::UnknownMarket(_))
        ));
        assert!(matches!(
            "totals:2".parse::<MarketSpec>(),
            Err(ConfigError::InvalidTotalsLine { .. })
        ));
        assert!(matches!(
            "totals:-0.5".parse::<MarketSpec>(),
            Err(ConfigError::InvalidTotalsLine { .. })
        ));
        assert!(matches!(
            "totals:abc".parse::<MarketSpec>(),
            Err(ConfigError::UnknownMarket(_))
        ));
    }

    #[test]
    fn line_beyond_grid_is_rejected() {
        let err = aggregate(&dist(), &MarketSpec::Totals { goals_below_line: 10 }).unwrap_err();
        assert!(matches!(err, ConfigError::TotalsBeyondGrid { max_goals: 10, .. }));
    }

    #[test]
    fn every_market_partition_sums_to_one() {
        let d = dist();
        for market in [
            MarketSpec::MatchResult,
            MarketSpec::Totals { goals_below_line: 0 },
            MarketSpec::Totals { goals_below_line: 2 },
            MarketSpec::Totals { goals_below_line: 4 },
            MarketSpec::BothTeamsToScore,
        ] {
            let probs = aggregate(&d, &market).unwrap();
            assert!((probs.total() - 1.0).abs() < 1e-9, "{market}");
            assert_eq!(probs.selections.len(), market.selections().len());
        }
    }

    #[test]
    fn stronger_home_side_is_favoured() {
        let probs = aggregate(&dist(), &MarketSpec::MatchResult).unwrap();
        let home = probs.get(Selection::Home).unwrap();
        let away = probs.get(Selection::Away).unwrap();
        assert!(home > away);
        assert!(home > 0.5);
    }

    #[test]
    fn over_half_goal_is_one_minus_nil_nil() {
        let d = dist();
        let probs = aggregate(&d, &MarketSpec::Totals { goals_below_line: 0 }).unwrap();
        assert!((probs.get(Selection::Under).unwrap() - d.prob(0, 0)).abs() < 1e-12);
    }

    #[test]
    fn selection_labels_are_market_scoped() {
        let m = MarketSpec::MatchResult;
        assert_eq!(m.parse_selection(" X "), Some(Selection::Draw));
        assert_eq!(m.parse_selection("over"), None);
        let t = MarketSpec::Totals { goals_below_line: 2 };
        assert_eq!(t.parse_selection("Under"), Some(Selection::Under));
    }

    #[test]
    fn probabilities_serialize_in_selection_order() {
        let probs = MarketProbabilities {
            market: MarketSpec::MatchResult,
            selections: vec![
                (Selection::Home, 0.5),
                (Selection::Draw, 0.25),
                (Selection::Away, 0.25),
            ],
        };
        let json = serde_json::to_string(&probs).unwrap();
        assert_eq!(json, r#"{"home":0.5,"draw":0.25,"away":0.25}"#);
    }
}
