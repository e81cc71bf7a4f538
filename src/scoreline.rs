use serde::Serialize;
use tracing::warn;

use crate::goal_model::ExpectedGoals;

/// Joint probability over final scores `0..=max_goals` for each side.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorelineDistribution {
    max_goals: u32,
    // Row-major by home goals.
    cells: Vec<f64>,
    clamped_cells: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorelineProb {
    pub home_goals: u32,
    pub away_goals: u32,
    pub probability: f64,
}

impl ScorelineDistribution {
    /// Independent Poisson grid with the Dixon-Coles low-score correction applied.
    pub fn build(xg: &ExpectedGoals, max_goals: u32, rho: f64) -> Self {
        let pmf_h = truncated_poisson(xg.home, max_goals);
        let pmf_a = truncated_poisson(xg.away, max_goals);

        let mut cells = Vec::with_capacity(pmf_h.len() * pmf_a.len());
        for p_h in &pmf_h {
            for p_a in &pmf_a {
                cells.push(p_h * p_a);
            }
        }
        let mut dist = Self {
            max_goals,
            cells,
            clamped_cells: 0,
        };
        dist.normalize();
        dist.apply_dixon_coles(xg, rho);
        dist.normalize();
        dist
    }

    /// Uncorrected product of the two truncated marginals.
    pub fn independent(xg: &ExpectedGoals, max_goals: u32) -> Self {
        Self::build(xg, max_goals, 0.0)
    }

    pub fn max_goals(&self) -> u32 {
        self.max_goals
    }

    pub fn prob(&self, home_goals: u32, away_goals: u32) -> f64 {
        if home_goals > self.max_goals || away_goals > self.max_goals {
            return 0.0;
        }
        self.cells[self.index(home_goals, away_goals)]
    }

    /// Cells the correction pushed below zero and that were clamped.
    pub fn clamped_cells(&self) -> usize {
        self.clamped_cells
    }

    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, f64)> + '_ {
        let side = self.max_goals + 1;
        self.cells
            .iter()
            .enumerate()
            .map(move |(idx, p)| (idx as u32 / side, idx as u32 % side, *p))
    }

    /// Most likely scorelines, highest first. Equal probabilities keep grid order.
    pub fn top_scorelines(&self, k: usize) -> Vec<ScorelineProb> {
        let mut all: Vec<ScorelineProb> = self
            .iter()
            .map(|(h, a, p)| ScorelineProb {
                home_goals: h,
                away_goals: a,
                probability: p,
            })
            .collect();
        // Stable sort keeps (home, away) ascending among ties.
        all.sort_by(|x, y| y.probability.total_cmp(&x.probability));
        all.truncate(k);
        all
    }

    /// Mean goals per side under the corrected, truncated grid.
    pub fn mean_goals(&self) -> ExpectedGoals {
        let mut home = 0.0;
        let mut away = 0.0;
        for (h, a, p) in self.iter() {
            home += h as f64 * p;
            away += a as f64 * p;
        }
        ExpectedGoals { home, away }
    }

    fn index(&self, home_goals: u32, away_goals: u32) -> usize {
        (home_goals * (self.max_goals + 1) + away_goals) as usize
    }

    fn apply_dixon_coles(&mut self, xg: &ExpectedGoals, rho: f64) {
        if rho == 0.0 {
            return;
        }
        let low = self.max_goals.min(1);
        for h in 0..=low {
            for a in 0..=low {
                let idx = self.index(h, a);
                let corrected = self.cells[idx] * dc_tau(h, a, xg.home, xg.away, rho);
                if corrected < 0.0 {
                    warn!(
                        home_goals = h,
                        away_goals = a,
                        rho,
                        lambda_home = xg.home,
                        lambda_away = xg.away,
                        "dixon-coles correction went negative; clamping cell to zero"
                    );
                    self.cells[idx] = 0.0;
                    self.clamped_cells += 1;
                } else {
                    self.cells[idx] = corrected;
                }
            }
        }
    }

    fn normalize(&mut self) {
        let sum = self.total();
        if sum > 0.0 {
            for p in &mut self.cells {
                *p /= sum;
            }
        }
    }
}

fn dc_tau(home_goals: u32, away_goals: u32, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    match (home_goals, away_goals) {
        (0, 0) => 1.0 - lambda_home * lambda_away * rho,
        (0, 1) => 1.0 + lambda_home * rho,
        (1, 0) => 1.0 + lambda_away * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}

// Computed in log space and rescaled by the largest term so large rates don't
// underflow to an all-zero row. The truncated pmf sums to 1.
fn truncated_poisson(lambda: f64, max_k: u32) -> Vec<f64> {
    let ln_lambda = lambda.ln();
    let mut ln_fact = 0.0_f64;
    let mut logs = Vec::with_capacity(max_k as usize + 1);
    for k in 0..=max_k {
        if k > 0 {
            ln_fact += (k as f64).ln();
        }
        logs.push(k as f64 * ln_lambda - ln_fact);
    }

    let peak = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut out: Vec<f64> = logs.iter().map(|l| (l - peak).exp()).collect();
    let sum: f64 = out.iter().sum();
    for p in &mut out {
        *p /= sum;
    }
    out
}
