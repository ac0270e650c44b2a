//! Volatile in-process ledger.
//!
//! Implements the full ledger contract without durability. Used for
//! memory-only operation and as the test double for the engine.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::domain::error::PaperledgerError;
use crate::domain::transaction::{NewTransaction, Transaction, ValuationPoint, sort_for_replay};
use crate::ports::ledger_port::{LedgerPort, Order};

#[derive(Default)]
struct Rows {
    next_id: i64,
    transactions: Vec<Transaction>,
    values: Vec<ValuationPoint>,
}

#[derive(Default)]
pub struct MemoryLedger {
    rows: Mutex<Rows>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, Rows> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LedgerPort for MemoryLedger {
    fn append(&self, tx: NewTransaction) -> Result<Transaction, PaperledgerError> {
        let mut rows = self.rows();
        rows.next_id += 1;
        let persisted = tx.into_transaction(rows.next_id, Utc::now());
        rows.transactions.push(persisted.clone());
        Ok(persisted)
    }

    fn list(&self, order: Order, limit: Option<usize>) -> Result<Vec<Transaction>, PaperledgerError> {
        let mut out = self.rows().transactions.clone();
        sort_for_replay(&mut out);
        if order == Order::Descending {
            out.reverse();
        }
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn append_value(&self, point: ValuationPoint) -> Result<(), PaperledgerError> {
        self.rows().values.push(point);
        Ok(())
    }

    fn list_values(&self) -> Result<Vec<ValuationPoint>, PaperledgerError> {
        let mut values = self.rows().values.clone();
        values.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(values)
    }

    fn reset(&self) -> Result<(), PaperledgerError> {
        {
            let mut rows = self.rows();
            rows.transactions.clear();
            rows.values.clear();
        }
        self.seed_genesis()
    }
}
