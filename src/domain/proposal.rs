//! Trade proposals flowing from the oracle through the guardrails to the executor.

use std::fmt;
use std::str::FromStr;

use super::transaction::Category;

/// Symbol prefix of prediction-market instruments: `POLY:<slug>[:<outcome>]`.
pub const PREDICTION_PREFIX: &str = "POLY:";

pub const ORACLE_UNAVAILABLE: &str = "oracle unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Buy,
    Sell,
    Hold,
    Watch,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
            Action::Watch => "WATCH",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Action::Buy => Category::Buy,
            Action::Sell => Category::Sell,
            Action::Hold => Category::Hold,
            Action::Watch => Category::Watch,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Action::Buy),
            "SELL" => Ok(Action::Sell),
            "HOLD" => Ok(Action::Hold),
            "WATCH" => Ok(Action::Watch),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// A trade as proposed by the oracle, or as finalized by the guardrails.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub action: Action,
    pub asset: String,
    /// Dollar amount, never a share count.
    pub amount: f64,
    pub price: f64,
    pub reasoning: String,
}

impl Proposal {
    pub fn new(action: Action, asset: &str, amount: f64, price: f64, reasoning: &str) -> Self {
        Proposal {
            action,
            asset: asset.to_string(),
            amount,
            price,
            reasoning: reasoning.to_string(),
        }
    }

    /// What the core proceeds with when the oracle fails in any way.
    pub fn oracle_unavailable() -> Self {
        Proposal::new(Action::Hold, "", 0.0, 1.0, ORACLE_UNAVAILABLE)
    }

    /// Rewrite into a zero-amount informational action.
    pub fn rewritten(&self, action: Action, reasoning: String) -> Self {
        Proposal {
            action,
            asset: self.asset.clone(),
            amount: 0.0,
            price: self.price,
            reasoning,
        }
    }

    /// Clamp malformed numerics: negative or non-finite amounts become 0.
    pub fn normalized(mut self) -> Self {
        if !self.amount.is_finite() || self.amount < 0.0 {
            self.amount = 0.0;
        }
        if !self.price.is_finite() {
            self.price = 0.0;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Stock,
    Crypto,
    PredictionMarket,
}

impl AssetClass {
    /// Classify by naming convention alone: `POLY:` prefix, `BASE-QUOTE` crypto
    /// pairs, bare tickers otherwise.
    pub fn of(asset: &str) -> Self {
        if asset.starts_with(PREDICTION_PREFIX) {
            AssetClass::PredictionMarket
        } else if asset.contains('-') {
            AssetClass::Crypto
        } else {
            AssetClass::Stock
        }
    }
}
