use std::cmp::Ordering;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::OddsRejection;
use crate::fixtures::FixtureOdds;
use crate::markets::{MarketSpec, Selection};
use crate::prediction::Prediction;

pub const NO_BET: &str = "No Bet";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TipPick {
    pub market: MarketSpec,
    pub selection: Selection,
    pub edge: f64,
    pub model_probability: f64,
    pub implied_probability: f64,
    pub odds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tip {
    Bet(TipPick),
    NoBet,
}

impl Tip {
    pub fn pick(&self) -> Option<&TipPick> {
        match self {
            Self::Bet(pick) => Some(pick),
            Self::NoBet => None,
        }
    }

    pub fn is_no_bet(&self) -> bool {
        matches!(self, Self::NoBet)
    }
}

impl Serialize for Tip {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bet(pick) => pick.serialize(serializer),
            Self::NoBet => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("tip", NO_BET)?;
                map.end()
            }
        }
    }
}

/// A quoted selection that could not take part in the edge comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedSelection {
    pub market: String,
    /// `None` when the whole market entry was unusable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
    pub reason: OddsRejection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TipDecision {
    pub tip: Tip,
    pub rejected: Vec<RejectedSelection>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    market: MarketSpec,
    selection: Selection,
    model_probability: f64,
    implied_probability: f64,
    edge: f64,
    odds: f64,
}

pub fn implied_probability(decimal_odds: f64) -> f64 {
    1.0 / decimal_odds
}

/// Pick the single best-value selection, or abstain.
///
/// Only selections with both a model probability and a usable decimal price
/// compete. The winner needs an edge strictly above `edge_threshold`.
pub fn select_tip(prediction: &Prediction, odds: &FixtureOdds, edge_threshold: f64) -> TipDecision {
    let mut rejected = Vec::new();
    let mut candidates = Vec::new();

    for (market_label, quotes) in odds {
        let Ok(market) = market_label.parse::<MarketSpec>() else {
            debug!(market = %market_label, "ignoring odds for unrecognised market");
            continue;
        };
        let Some(probs) = prediction.market(&market) else {
            debug!(market = %market, "ignoring odds for a market this run does not price");
            continue;
        };
        let Some(quotes) = quotes.prices() else {
            debug!(market = %market, "excluding market whose quotes are not an object");
            rejected.push(RejectedSelection {
                market: market_label.clone(),
                selection: None,
                reason: OddsRejection::NotAMarket,
            });
            continue;
        };

        for (selection_label, price) in quotes {
            let Some(selection) = market.parse_selection(selection_label) else {
                debug!(market = %market, selection = %selection_label, "ignoring unrecognised selection");
                continue;
            };
            let Some(model_probability) = probs.get(selection) else {
                continue;
            };
            let odds = match price.decimal() {
                Ok(v) => v,
                Err(reason) => {
                    debug!(market = %market, selection = %selection, %reason, "excluding malformed price");
                    rejected.push(RejectedSelection {
                        market: market_label.clone(),
                        selection: Some(selection_label.clone()),
                        reason,
                    });
                    continue;
                }
            };
            let implied = implied_probability(odds);
            candidates.push(Candidate {
                market,
                selection,
                model_probability,
                implied_probability: implied,
                edge: model_probability - implied,
                odds,
            });
        }
    }

    let best = candidates.into_iter().max_by(rank);
    let tip = match best {
        Some(c) if c.edge > edge_threshold => Tip::Bet(TipPick {
            market: c.market,
            selection: c.selection,
            edge: c.edge,
            model_probability: c.model_probability,
            implied_probability: c.implied_probability,
            odds: c.odds,
        }),
        _ => Tip::NoBet,
    };
    TipDecision { tip, rejected }
}

// Greater is better: edge, then model probability, then the earlier market and
// selection in the fixed ordering.
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    a.edge
        .total_cmp(&b.edge)
        .then(a.model_probability.total_cmp(&b.model_probability))
        .then(b.market.priority().cmp(&a.market.priority()))
        .then(b.market.cmp(&a.market))
        .then(b.selection.cmp(&a.selection))
}
