//! Trade execution against live state and the ledger.
//!
//! Every branch mutates the in-memory [`PortfolioState`] first and then
//! appends the matching ledger row. A failed append does not roll the state
//! back: the running process keeps trading from memory, and the failure is
//! surfaced as [`Persistence::Degraded`] for the caller to act on.

use tracing::{info, warn};

use super::error::PaperledgerError;
use super::guardrail::Rejection;
use super::portfolio::PortfolioState;
use super::position::effective_price;
use super::proposal::{Action, Proposal};
use super::transaction::{Category, NewTransaction, Transaction};
use crate::ports::ledger_port::LedgerPort;

#[derive(Debug, Clone, PartialEq)]
pub enum Persistence {
    Durable,
    /// The ledger could not be written; state advanced in memory only.
    Degraded { reason: String },
}

impl Persistence {
    pub fn is_durable(&self) -> bool {
        matches!(self, Persistence::Durable)
    }

    pub fn degraded(err: &PaperledgerError) -> Self {
        Persistence::Degraded {
            reason: err.to_string(),
        }
    }

    /// Keep the first degradation seen across several ledger writes.
    pub fn and(self, other: Persistence) -> Persistence {
        match self {
            Persistence::Durable => other,
            degraded => degraded,
        }
    }
}

/// The outcome of one executed action.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub category: Category,
    pub amount: f64,
    pub asset: String,
    pub gain: f64,
    /// The persisted row, when the ledger accepted it.
    pub transaction: Option<Transaction>,
    pub persistence: Persistence,
}

pub struct TradeExecutor<'a> {
    ledger: &'a dyn LedgerPort,
}

impl<'a> TradeExecutor<'a> {
    pub fn new(ledger: &'a dyn LedgerPort) -> Self {
        TradeExecutor { ledger }
    }

    /// Apply an arbiter-approved action. Must not be called with a rejected verdict.
    pub fn execute(&self, state: &mut PortfolioState, action: &Proposal) -> Execution {
        let price = effective_price(Some(action.price));
        let tx = match action.action {
            Action::Buy => {
                state.buy(&action.asset, action.amount, Some(price));
                info!(asset = %action.asset, amount = action.amount, price, "executed buy");
                NewTransaction::new(Category::Buy, action.amount, &action.asset, &action.reasoning)
                    .with_price(price)
            }
            Action::Sell => {
                let gain = state
                    .get_position(&action.asset)
                    .map_or(0.0, |p| p.realized_gain_pct(price));
                state.sell(&action.asset, action.amount, Some(price));
                info!(
                    asset = %action.asset,
                    amount = action.amount,
                    price,
                    gain_pct = gain,
                    "executed sell"
                );
                NewTransaction::new(Category::Sell, action.amount, &action.asset, &action.reasoning)
                    .with_price(price)
                    .with_gain(gain)
            }
            Action::Hold if state.has_position(&action.asset) => {
                info!(asset = %action.asset, reasoning = %action.reasoning, "holding position");
                NewTransaction::new(Category::Hold, 0.0, &action.asset, &action.reasoning)
                    .with_price(price)
            }
            Action::Hold | Action::Watch => {
                info!(asset = %action.asset, reasoning = %action.reasoning, "watching");
                NewTransaction::new(Category::Watch, 0.0, &action.asset, &action.reasoning)
                    .with_price(price)
            }
        };
        self.append(tx)
    }

    /// Record a hard rejection as a state-neutral WATCH marker.
    pub fn record_rejection(&self, action: &Proposal, rejection: &Rejection) -> Execution {
        let detail = format!("rejected {} {}: {rejection}", action.action, action.asset);
        let tx = NewTransaction::new(Category::Watch, 0.0, &action.asset, &detail)
            .with_price(effective_price(Some(action.price)));
        self.append(tx)
    }

    /// Credit cash and record the DEPOSIT.
    pub fn deposit(&self, state: &mut PortfolioState, amount: f64, detail: &str) -> Execution {
        state.deposit(amount);
        info!(amount, cash = state.cash, "deposited funds");
        let tx = NewTransaction::new(Category::Deposit, amount, "USD", detail).with_price(1.0);
        self.append(tx)
    }

    fn append(&self, tx: NewTransaction) -> Execution {
        let category = tx.category;
        let amount = tx.amount;
        let asset = tx.asset.clone();
        let gain = tx.gain;
        match self.ledger.append(tx) {
            Ok(persisted) => Execution {
                category,
                amount,
                asset,
                gain,
                transaction: Some(persisted),
                persistence: Persistence::Durable,
            },
            Err(e) => {
                warn!(error = %e, category = %category, "ledger append failed; continuing in memory");
                Execution {
                    category,
                    amount,
                    asset,
                    gain,
                    transaction: None,
                    persistence: Persistence::degraded(&e),
                }
            }
        }
    }
}
