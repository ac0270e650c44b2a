#![allow(dead_code)]

use paperledger::adapters::memory_ledger::MemoryLedger;
use paperledger::domain::engine::{EngineConfig, PortfolioEngine};
use paperledger::domain::error::PaperledgerError;
use paperledger::domain::proposal::{Action, Proposal};
use paperledger::domain::transaction::{NewTransaction, Transaction, ValuationPoint};
use paperledger::domain::valuation::ValuationConfig;
use paperledger::ports::ledger_port::{LedgerPort, Order};
use paperledger::ports::oracle_port::{DecisionOracle, OracleRequest};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A ledger whose store is unreachable for every call.
pub struct FailingLedger;

fn unreachable_store() -> PaperledgerError {
    PaperledgerError::Database {
        reason: "connection refused".to_string(),
    }
}

impl LedgerPort for FailingLedger {
    fn append(&self, _tx: NewTransaction) -> Result<Transaction, PaperledgerError> {
        Err(unreachable_store())
    }

    fn list(&self, _order: Order, _limit: Option<usize>) -> Result<Vec<Transaction>, PaperledgerError> {
        Err(unreachable_store())
    }

    fn append_value(&self, _point: ValuationPoint) -> Result<(), PaperledgerError> {
        Err(unreachable_store())
    }

    fn list_values(&self) -> Result<Vec<ValuationPoint>, PaperledgerError> {
        Err(unreachable_store())
    }

    fn reset(&self) -> Result<(), PaperledgerError> {
        Err(unreachable_store())
    }
}

/// Wraps a memory ledger; writes fail while `down` is set, and valuation
/// writes alone fail while `values_down` is set.
pub struct SwitchableLedger {
    pub inner: MemoryLedger,
    down: AtomicBool,
    values_down: AtomicBool,
}

impl SwitchableLedger {
    pub fn new() -> Self {
        Self {
            inner: MemoryLedger::new(),
            down: AtomicBool::new(false),
            values_down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_values_down(&self, down: bool) {
        self.values_down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), PaperledgerError> {
        if self.down.load(Ordering::SeqCst) {
            Err(unreachable_store())
        } else {
            Ok(())
        }
    }
}

impl LedgerPort for SwitchableLedger {
    fn append(&self, tx: NewTransaction) -> Result<Transaction, PaperledgerError> {
        self.check()?;
        self.inner.append(tx)
    }

    fn list(&self, order: Order, limit: Option<usize>) -> Result<Vec<Transaction>, PaperledgerError> {
        self.inner.list(order, limit)
    }

    fn append_value(&self, point: ValuationPoint) -> Result<(), PaperledgerError> {
        self.check()?;
        if self.values_down.load(Ordering::SeqCst) {
            return Err(unreachable_store());
        }
        self.inner.append_value(point)
    }

    fn list_values(&self) -> Result<Vec<ValuationPoint>, PaperledgerError> {
        self.inner.list_values()
    }

    fn reset(&self) -> Result<(), PaperledgerError> {
        self.check()?;
        self.inner.reset()
    }
}

/// Returns queued replies in order, then HOLD forever.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<Proposal, PaperledgerError>>>,
    pub calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn then(self, proposal: Proposal) -> Self {
        self.replies.lock().unwrap().push_back(Ok(proposal));
        self
    }

    pub fn then_fail(self, reason: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(PaperledgerError::OracleUnavailable {
                reason: reason.to_string(),
            }));
        self
    }
}

impl DecisionOracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    fn propose(&self, _request: &OracleRequest<'_>) -> Result<Proposal, PaperledgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Proposal::new(Action::Hold, "", 0.0, 1.0, "nothing queued")))
    }
}

/// Engine config with a drift-free valuation so values are exact.
pub fn exact_config() -> EngineConfig {
    EngineConfig {
        valuation: ValuationConfig {
            drift: 0.0,
            seed: Some(7),
        },
        ..EngineConfig::default()
    }
}

pub fn memory_engine() -> (Arc<MemoryLedger>, PortfolioEngine) {
    let ledger = Arc::new(MemoryLedger::new());
    let engine = PortfolioEngine::open(ledger.clone(), exact_config());
    (ledger, engine)
}

pub fn buy(asset: &str, amount: f64, price: f64) -> Proposal {
    Proposal::new(Action::Buy, asset, amount, price, "test buy")
}

pub fn sell(asset: &str, amount: f64, price: f64) -> Proposal {
    Proposal::new(Action::Sell, asset, amount, price, "test sell")
}

pub fn hold(asset: &str) -> Proposal {
    Proposal::new(Action::Hold, asset, 0.0, 1.0, "test hold")
}
