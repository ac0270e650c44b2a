//! The portfolio engine: one owner for live state, serializing every
//! read-decide-write sequence behind a single mutex.
//!
//! Live state is rebuilt by replaying the ledger at startup and advanced in
//! memory afterwards. Ledger failures never abort an operation; they are
//! reported as [`Persistence::Degraded`] on the result.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::error::PaperledgerError;
use super::executor::{Persistence, TradeExecutor};
use super::guardrail::{GuardrailArbiter, GuardrailConfig, Rejection, Rewrite};
use super::portfolio::{PortfolioState, reduce, total_deposited};
use super::position::{DUST_SHARES, Position};
use super::preferences::{PreferencesUpdate, TradingPreferences};
use super::proposal::{Action, Proposal};
use super::transaction::{GENESIS_DEPOSIT, Transaction, ValuationPoint};
use super::valuation::{ValuationConfig, ValuationEstimator};
use crate::ports::ledger_port::{LedgerPort, Order};
use crate::ports::oracle_port::{DecisionOracle, OracleRequest};

pub const DEFAULT_RECENT_LIMIT: usize = 50;
pub const DEFAULT_DEPOSIT: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineConfig {
    pub guardrails: GuardrailConfig,
    pub valuation: ValuationConfig,
    pub preferences: TradingPreferences,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub action: Action,
    pub amount: f64,
    pub asset: String,
    pub rejected: bool,
    pub rejection: Option<Rejection>,
    pub rewrites: Vec<Rewrite>,
    /// The ledger row written this cycle, if any was written.
    pub transaction: Option<Transaction>,
    /// Value point computed at the end of the cycle.
    pub total_value: f64,
    pub persistence: Persistence,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
    pub holdings: f64,
    pub total_value: f64,
    pub total_deposited: f64,
    pub performance_pct: f64,
    /// Asset → value at cost basis, in the same order as `positions`.
    pub holdings_by_asset: BTreeMap<String, f64>,
}

impl Snapshot {
    fn of(state: &PortfolioState, deposited: f64) -> Self {
        let holdings = state.holdings_value();
        let total_value = state.cash + holdings;
        let performance_pct = if deposited > 0.0 {
            (total_value - deposited) / deposited * 100.0
        } else {
            0.0
        };
        Snapshot {
            cash: state.cash,
            positions: state.positions.clone(),
            holdings,
            total_value,
            total_deposited: deposited,
            performance_pct,
            holdings_by_asset: state.flat_holdings(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepositResult {
    pub cash: f64,
    pub persistence: Persistence,
}

/// Live state compared with a fresh reduction of the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayCheck {
    pub live: PortfolioState,
    pub replayed: PortfolioState,
}

impl ReplayCheck {
    pub fn is_consistent(&self) -> bool {
        if self.live.cash != self.replayed.cash
            || self.live.positions.len() != self.replayed.positions.len()
        {
            return false;
        }
        self.live.positions.iter().all(|(asset, live)| {
            self.replayed.positions.get(asset).is_some_and(|r| {
                (live.shares - r.shares).abs() < DUST_SHARES
                    && (live.avg_price - r.avg_price).abs() < 1e-9
            })
        })
    }
}

struct EngineState {
    portfolio: PortfolioState,
    deposited: f64,
    valuation: ValuationEstimator,
    preferences: TradingPreferences,
}

pub struct PortfolioEngine {
    ledger: Arc<dyn LedgerPort>,
    arbiter: GuardrailArbiter,
    inner: Mutex<EngineState>,
}

impl PortfolioEngine {
    /// Rebuild live state from the ledger, seeding genesis on an empty store,
    /// and record the startup valuation.
    ///
    /// Emptiness is judged by the transaction log, not the valuation history:
    /// a ledger that kept its genesis DEPOSIT but lost the genesis point is
    /// not seeded again.
    pub fn open(ledger: Arc<dyn LedgerPort>, config: EngineConfig) -> Self {
        let mut persistence = Persistence::Durable;

        let seeded = match ledger.list(Order::Ascending, Some(1)) {
            Ok(rows) if rows.is_empty() => match ledger.seed_genesis() {
                Ok(()) => {
                    info!("empty ledger seeded with genesis deposit");
                    true
                }
                Err(e) => {
                    persistence = persistence.and(Persistence::degraded(&e));
                    false
                }
            },
            Ok(_) => false,
            Err(e) => {
                persistence = persistence.and(Persistence::degraded(&e));
                false
            }
        };

        let (portfolio, deposited) = match replay(ledger.as_ref()) {
            Ok(replayed) => replayed,
            Err(e) => {
                persistence = persistence.and(Persistence::degraded(&e));
                genesis_state()
            }
        };

        let mut state = EngineState {
            portfolio,
            deposited,
            valuation: ValuationEstimator::from_config(&config.valuation),
            preferences: config.preferences,
        };

        if !seeded {
            let value = state.valuation.estimate(&state.portfolio);
            if let Err(e) = ledger.append_value(ValuationPoint::now(value)) {
                persistence = persistence.and(Persistence::degraded(&e));
            }
        }

        if let Persistence::Degraded { reason } = &persistence {
            warn!(%reason, "ledger unavailable at startup; running from memory");
        }
        info!(
            cash = state.portfolio.cash,
            positions = state.portfolio.positions.len(),
            "portfolio state loaded"
        );

        PortfolioEngine {
            ledger,
            arbiter: GuardrailArbiter::new(config.guardrails),
            inner: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arbitrate and execute one proposal, then record a valuation point.
    pub fn evaluate_and_execute(&self, proposal: Proposal) -> ExecutionResult {
        let mut state = self.lock();
        self.evaluate_locked(&mut state, proposal)
    }

    /// One full decision cycle. The lock is held across the oracle call so
    /// the proposal is arbitrated against the same state it was made from.
    pub fn run_cycle(&self, oracle: &dyn DecisionOracle) -> ExecutionResult {
        let mut state = self.lock();
        info!(oracle = oracle.name(), "running decision cycle");
        let request = OracleRequest {
            cash: state.portfolio.cash,
            positions: &state.portfolio.positions,
            preferences: &state.preferences,
        };
        let proposal = match oracle.propose(&request) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "oracle failed; holding");
                Proposal::oracle_unavailable()
            }
        };
        self.evaluate_locked(&mut state, proposal)
    }

    fn evaluate_locked(&self, state: &mut EngineState, proposal: Proposal) -> ExecutionResult {
        debug!(?proposal, "evaluating proposal");
        let verdict = self.arbiter.arbitrate(proposal, &state.portfolio);
        let executor = TradeExecutor::new(self.ledger.as_ref());

        let execution = match &verdict.rejection {
            Some(rejection) if self.arbiter.config().audit_rejections => {
                Some(executor.record_rejection(&verdict.action, rejection))
            }
            Some(_) => None,
            None => Some(executor.execute(&mut state.portfolio, &verdict.action)),
        };

        let mut persistence = execution
            .as_ref()
            .map_or(Persistence::Durable, |e| e.persistence.clone());

        let total_value = state.valuation.estimate(&state.portfolio);
        if let Err(e) = self.ledger.append_value(ValuationPoint::now(total_value)) {
            warn!(error = %e, "valuation point not recorded");
            persistence = persistence.and(Persistence::degraded(&e));
        }
        info!(total_value, "estimated portfolio value");

        let rejected = verdict.is_rejected();
        let (amount, transaction) = match execution {
            Some(e) if !rejected => (e.amount, e.transaction),
            Some(e) => (0.0, e.transaction),
            None => (0.0, None),
        };

        ExecutionResult {
            action: verdict.action.action,
            amount,
            asset: verdict.action.asset,
            rejected,
            rejection: verdict.rejection,
            rewrites: verdict.rewrites,
            transaction,
            total_value,
            persistence,
        }
    }

    /// Current state at cost basis, without drift.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot::of(&state.portfolio, state.deposited)
    }

    /// Wipe the ledger back to genesis and rebuild live state from it.
    pub fn reset(&self) -> Persistence {
        let mut state = self.lock();
        let mut persistence = match self.ledger.reset() {
            Ok(()) => Persistence::Durable,
            Err(e) => Persistence::degraded(&e),
        };

        let (portfolio, deposited) = if persistence.is_durable() {
            replay(self.ledger.as_ref()).unwrap_or_else(|e| {
                persistence = Persistence::degraded(&e);
                genesis_state()
            })
        } else {
            genesis_state()
        };
        state.portfolio = portfolio;
        state.deposited = deposited;

        match &persistence {
            Persistence::Durable => info!("system reset: ledger wiped and reseeded"),
            Persistence::Degraded { reason } => {
                warn!(%reason, "system reset in memory only")
            }
        }
        persistence
    }

    /// Credit cash. Negative and non-finite amounts are refused before any
    /// state or ledger change.
    pub fn deposit(&self, amount: f64) -> Result<DepositResult, PaperledgerError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(PaperledgerError::InvalidAmount { amount });
        }
        let mut state = self.lock();
        let executor = TradeExecutor::new(self.ledger.as_ref());
        let execution = executor.deposit(&mut state.portfolio, amount, "Test Deposit");
        state.deposited += amount;
        Ok(DepositResult {
            cash: state.portfolio.cash,
            persistence: execution.persistence,
        })
    }

    pub fn history(&self) -> Result<Vec<ValuationPoint>, PaperledgerError> {
        self.ledger.list_values()
    }

    /// Most recent transactions first.
    pub fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, PaperledgerError> {
        self.ledger.list(Order::Descending, Some(limit))
    }

    pub fn preferences(&self) -> TradingPreferences {
        self.lock().preferences
    }

    pub fn update_preferences(&self, update: PreferencesUpdate) -> TradingPreferences {
        let mut state = self.lock();
        state.preferences.apply(update);
        info!(preferences = ?state.preferences, "trading preferences updated");
        state.preferences
    }

    /// Replay the full ledger and compare it against live state.
    pub fn verify_replay(&self) -> Result<ReplayCheck, PaperledgerError> {
        let state = self.lock();
        let (replayed, _) = replay(self.ledger.as_ref())?;
        Ok(ReplayCheck {
            live: state.portfolio.clone(),
            replayed,
        })
    }
}

fn replay(ledger: &dyn LedgerPort) -> Result<(PortfolioState, f64), PaperledgerError> {
    let transactions = ledger.list(Order::Ascending, None)?;
    debug!(rows = transactions.len(), "replaying ledger");
    Ok((reduce(&transactions), total_deposited(&transactions)))
}

fn genesis_state() -> (PortfolioState, f64) {
    (PortfolioState::new(GENESIS_DEPOSIT), GENESIS_DEPOSIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_ledger::MemoryLedger;
    use approx::assert_relative_eq;

    fn engine() -> (Arc<MemoryLedger>, PortfolioEngine) {
        let ledger = Arc::new(MemoryLedger::new());
        let config = EngineConfig {
            valuation: ValuationConfig {
                drift: 0.01,
                seed: Some(9),
            },
            ..EngineConfig::default()
        };
        let engine = PortfolioEngine::open(ledger.clone(), config);
        (ledger, engine)
    }

    #[test]
    fn open_seeds_empty_ledger_once() {
        let (ledger, engine) = engine();
        assert_eq!(ledger.list(Order::Ascending, None).unwrap().len(), 1);
        assert_eq!(ledger.list_values().unwrap().len(), 1);
        assert_eq!(engine.snapshot().cash, 100.0);
    }

    #[test]
    fn reopen_replays_and_logs_value() {
        let (ledger, engine) = engine();
        engine.evaluate_and_execute(Proposal::new(Action::Buy, "X", 20.0, 2.0, ""));
        drop(engine);

        let values_before = ledger.list_values().unwrap().len();
        let reopened = PortfolioEngine::open(ledger.clone(), EngineConfig::default());
        assert_eq!(ledger.list_values().unwrap().len(), values_before + 1);
        let snap = reopened.snapshot();
        assert_relative_eq!(snap.cash, 80.0);
        assert_relative_eq!(snap.positions["X"].shares, 10.0);
    }

    #[test]
    fn executed_cycle_appends_transaction_and_value() {
        let (ledger, engine) = engine();
        let result = engine.evaluate_and_execute(Proposal::new(Action::Buy, "X", 30.0, 2.0, ""));
        assert!(!result.rejected);
        assert_eq!(result.action, Action::Buy);
        assert!(result.transaction.is_some());
        assert!(result.persistence.is_durable());
        assert_eq!(ledger.list(Order::Ascending, None).unwrap().len(), 2);
        assert_eq!(ledger.list_values().unwrap().len(), 2);
    }

    #[test]
    fn hard_rejection_writes_no_transaction_by_default() {
        let (ledger, engine) = engine();
        let result = engine.evaluate_and_execute(Proposal::new(Action::Sell, "X", 30.0, 2.0, ""));
        assert!(result.rejected);
        assert_eq!(result.amount, 0.0);
        assert!(result.transaction.is_none());
        assert_eq!(ledger.list(Order::Ascending, None).unwrap().len(), 1);
    }

    #[test]
    fn snapshot_reports_performance() {
        let (_ledger, engine) = engine();
        engine.deposit(100.0).unwrap();
        let snap = engine.snapshot();
        assert_relative_eq!(snap.cash, 200.0);
        assert_relative_eq!(snap.total_deposited, 200.0);
        assert_relative_eq!(snap.performance_pct, 0.0);
    }

    #[test]
    fn preferences_update_is_visible() {
        let (_ledger, engine) = engine();
        let prefs = engine.update_preferences(PreferencesUpdate {
            stocks: Some(false),
            ..PreferencesUpdate::default()
        });
        assert!(!prefs.stocks);
        assert_eq!(engine.preferences(), prefs);
    }

    #[test]
    fn replay_matches_live_state() {
        let (_ledger, engine) = engine();
        engine.evaluate_and_execute(Proposal::new(Action::Buy, "X", 30.0, 3.0, ""));
        engine.evaluate_and_execute(Proposal::new(Action::Buy, "Y", 7.5, 0.5, ""));
        engine.evaluate_and_execute(Proposal::new(Action::Sell, "X", 12.0, 4.0, ""));
        let check = engine.verify_replay().unwrap();
        assert!(check.is_consistent(), "{check:?}");
    }
}
