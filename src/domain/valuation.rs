//! Total-value estimation for the valuation history.
//!
//! Holdings are valued at cost basis and perturbed by a bounded
//! multiplicative drift to stand in for unmodeled price movement between
//! cycles. Cash is never perturbed. The random source is injected so runs can
//! be reproduced from a seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::portfolio::PortfolioState;

#[derive(Debug, Clone, PartialEq)]
pub struct ValuationConfig {
    /// Half-width of the drift band: factors are drawn from `[1 - drift, 1 + drift]`.
    pub drift: f64,
    pub seed: Option<u64>,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        ValuationConfig {
            drift: 0.01,
            seed: None,
        }
    }
}

pub struct ValuationEstimator<R: Rng = StdRng> {
    rng: R,
    drift: f64,
}

impl ValuationEstimator<StdRng> {
    pub fn from_config(config: &ValuationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        ValuationEstimator::new(rng, config.drift)
    }
}

impl<R: Rng> ValuationEstimator<R> {
    pub fn new(rng: R, drift: f64) -> Self {
        ValuationEstimator {
            rng,
            drift: drift.abs(),
        }
    }

    pub fn drift_factor(&mut self) -> f64 {
        if self.drift == 0.0 {
            return 1.0;
        }
        self.rng.gen_range((1.0 - self.drift)..=(1.0 + self.drift))
    }

    pub fn estimate(&mut self, state: &PortfolioState) -> f64 {
        let holdings = state.holdings_value();
        let perturbed = if holdings > 0.0 {
            holdings * self.drift_factor()
        } else {
            0.0
        };
        state.cash + perturbed
    }
}
