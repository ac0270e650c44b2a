//! Guardrail arbitration of proposed trades.
//!
//! Rules run in a fixed order:
//! 1. Diversification cap (BUY): one asset may not exceed `max_position_pct`
//!    of total value. Buys are capped to the remaining room, or rewritten to
//!    WATCH when less than `min_trade_usd` of room is left.
//! 2. Prediction-market price ceiling (BUY): instruments named with the
//!    prediction prefix, or quoted below the sub-dollar heuristic, are
//!    rewritten to HOLD when priced above the ceiling.
//! 3. Funds (BUY) and 4. shares (SELL) sufficiency: hard rejections that
//!    execute nothing.
//!
//! Rewrites are successful outcomes with an altered action; rejections are
//! not errors either, just a negative verdict.

use std::fmt;

use tracing::{info, warn};

use super::portfolio::PortfolioState;
use super::position::effective_price;
use super::proposal::{Action, PREDICTION_PREFIX, Proposal};

pub const DIVERSIFICATION_REASON: &str = "diversification limit reached";

#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailConfig {
    pub max_position_pct: f64,
    pub min_trade_usd: f64,
    pub prediction_price_ceiling: f64,
    pub prediction_price_heuristic: f64,
    pub prediction_prefix: String,
    /// Record hard rejections as zero-amount WATCH markers.
    pub audit_rejections: bool,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        GuardrailConfig {
            max_position_pct: 0.40,
            min_trade_usd: 2.0,
            prediction_price_ceiling: 0.75,
            prediction_price_heuristic: 0.99,
            prediction_prefix: PREDICTION_PREFIX.to_string(),
            audit_rejections: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rewrite {
    Capped { requested: f64, allowed: f64 },
    DiversificationBlocked { current: f64, limit: f64 },
    PriceCeiling { price: f64, ceiling: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    InsufficientFunds { required: f64, available: f64 },
    InsufficientShares { required: f64, held: f64 },
    NonPositiveAmount { amount: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InsufficientFunds {
                required,
                available,
            } => write!(
                f,
                "insufficient funds: need ${required:.2}, have ${available:.2}"
            ),
            Rejection::InsufficientShares { required, held } => write!(
                f,
                "insufficient shares: need {required:.6}, hold {held:.6}"
            ),
            Rejection::NonPositiveAmount { amount } => {
                write!(f, "non-positive trade amount ${amount:.2}")
            }
        }
    }
}

/// The arbiter's answer: the action to execute plus what happened to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub action: Proposal,
    pub rewrites: Vec<Rewrite>,
    pub rejection: Option<Rejection>,
}

impl Verdict {
    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GuardrailArbiter {
    config: GuardrailConfig,
}

impl GuardrailArbiter {
    pub fn new(config: GuardrailConfig) -> Self {
        GuardrailArbiter { config }
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Prediction-market instruments by name, or by a probability-style quote.
    pub fn is_prediction_market(&self, asset: &str, price: f64) -> bool {
        asset.starts_with(&self.config.prediction_prefix)
            || price < self.config.prediction_price_heuristic
    }

    pub fn arbitrate(&self, proposal: Proposal, state: &PortfolioState) -> Verdict {
        let mut action = proposal.normalized();
        let mut rewrites = Vec::new();

        if action.action == Action::Buy {
            if let Some(rewrite) = self.apply_diversification(&mut action, state) {
                rewrites.push(rewrite);
            }
        }

        if action.action == Action::Buy {
            if let Some(rewrite) = self.apply_price_ceiling(&mut action) {
                rewrites.push(rewrite);
            }
        }

        let rejection = match action.action {
            Action::Buy => check_funds(&action, state),
            Action::Sell => check_shares(&action, state),
            Action::Hold | Action::Watch => None,
        };

        if let Some(ref r) = rejection {
            warn!(action = %action.action, asset = %action.asset, reason = %r, "trade rejected");
        }

        Verdict {
            action,
            rewrites,
            rejection,
        }
    }

    fn apply_diversification(
        &self,
        action: &mut Proposal,
        state: &PortfolioState,
    ) -> Option<Rewrite> {
        let current = state.asset_value(&action.asset);
        let limit = self.config.max_position_pct * state.total_value();

        if current + action.amount <= limit {
            return None;
        }

        let allowed = limit - current;
        if allowed < self.config.min_trade_usd {
            warn!(
                asset = %action.asset,
                current, limit, "buy blocked: position limit reached"
            );
            *action = action.rewritten(Action::Watch, DIVERSIFICATION_REASON.to_string());
            Some(Rewrite::DiversificationBlocked { current, limit })
        } else {
            info!(
                asset = %action.asset,
                requested = action.amount,
                allowed,
                "capping buy to diversification limit"
            );
            let requested = action.amount;
            action.amount = allowed;
            Some(Rewrite::Capped { requested, allowed })
        }
    }

    fn apply_price_ceiling(&self, action: &mut Proposal) -> Option<Rewrite> {
        let price = action.price;
        let ceiling = self.config.prediction_price_ceiling;
        if !self.is_prediction_market(&action.asset, price) || price <= ceiling {
            return None;
        }
        warn!(
            asset = %action.asset,
            price, ceiling, "buy blocked: prediction market price above ceiling"
        );
        *action = action.rewritten(
            Action::Hold,
            format!("blocked: price exceeds {ceiling} ceiling for prediction markets"),
        );
        Some(Rewrite::PriceCeiling { price, ceiling })
    }
}

fn check_funds(action: &Proposal, state: &PortfolioState) -> Option<Rejection> {
    if action.amount <= 0.0 {
        return Some(Rejection::NonPositiveAmount {
            amount: action.amount,
        });
    }
    if state.cash < action.amount {
        return Some(Rejection::InsufficientFunds {
            required: action.amount,
            available: state.cash,
        });
    }
    None
}

/// Amount is already normalized to a finite value >= 0, so a $0 sell of a
/// held asset passes.
fn check_shares(action: &Proposal, state: &PortfolioState) -> Option<Rejection> {
    let required = action.amount / effective_price(Some(action.price));
    let held = state.shares(&action.asset);
    if !state.has_position(&action.asset) || held < required {
        return Some(Rejection::InsufficientShares { required, held });
    }
    None
}
