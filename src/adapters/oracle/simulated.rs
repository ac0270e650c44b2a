//! Offline oracle proposing random trades over a fixed universe.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::domain::error::PaperledgerError;
use crate::domain::proposal::{Action, AssetClass, Proposal};
use crate::ports::oracle_port::{DecisionOracle, OracleRequest};

const UNIVERSE: &[&str] = &[
    "NVDA",
    "TSLA",
    "AAPL",
    "MSFT",
    "BTC-USD",
    "ETH-USD",
    "SOL-USD",
    "POLY:fed-rate-cut:Yes",
    "POLY:btc-above-100k:No",
];

const ACTIONS: &[Action] = &[Action::Buy, Action::Hold, Action::Sell, Action::Watch];

pub struct SimulatedOracle {
    rng: Mutex<StdRng>,
}

impl SimulatedOracle {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        SimulatedOracle {
            rng: Mutex::new(rng),
        }
    }
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl DecisionOracle for SimulatedOracle {
    fn name(&self) -> &str {
        "simulated"
    }

    fn propose(&self, request: &OracleRequest<'_>) -> Result<Proposal, PaperledgerError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| PaperledgerError::OracleUnavailable {
                reason: e.to_string(),
            })?;

        let action = *ACTIONS.choose(&mut *rng).unwrap_or(&Action::Hold);

        // Sells target something actually held, near its cost basis.
        if action == Action::Sell {
            let held: Vec<_> = request.positions.values().collect();
            if let Some(position) = held.choose(&mut *rng) {
                let price = round_cents(position.avg_price * rng.gen_range(0.9..=1.1)).max(0.01);
                // Shaved so amount / price never exceeds the held shares.
                let max_amount = position.shares * price * (1.0 - 1e-12);
                let amount = round_cents(rng.gen_range(0.25..=1.0) * max_amount).min(max_amount);
                return Ok(Proposal::new(
                    Action::Sell,
                    &position.asset,
                    amount,
                    price,
                    &format!("Simulated take-profit check on {}.", position.asset),
                ));
            }
        }

        let allowed: Vec<&str> = UNIVERSE
            .iter()
            .copied()
            .filter(|a| request.preferences.allows(AssetClass::of(a)))
            .collect();
        let Some(asset) = allowed.choose(&mut *rng).copied() else {
            return Ok(Proposal::new(
                Action::Hold,
                "",
                0.0,
                1.0,
                "All asset classes disabled.",
            ));
        };

        let price = match AssetClass::of(asset) {
            AssetClass::PredictionMarket => round_cents(rng.gen_range(0.01..=0.99)),
            AssetClass::Stock | AssetClass::Crypto => round_cents(rng.gen_range(100.0..=3000.0)),
        };
        let amount = round_cents(rng.gen_range(5.0..=50.0));
        let action = if action == Action::Sell {
            Action::Watch
        } else {
            action
        };

        Ok(Proposal::new(
            action,
            asset,
            amount,
            price,
            &format!("Simulated momentum read on {asset}."),
        ))
    }
}
