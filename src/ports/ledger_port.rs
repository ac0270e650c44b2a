//! Event ledger port trait.
//!
//! The ledger is append-only: transactions and valuation points are only
//! ever added, except by [`LedgerPort::reset`], which wipes both collections
//! and reseeds the genesis rows. Implementations report an unreachable store
//! as an `Err`; the engine decides whether to continue in memory.

use crate::domain::error::PaperledgerError;
use crate::domain::transaction::{GENESIS_DEPOSIT, NewTransaction, Transaction, ValuationPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Replay order: timestamp ascending, then id ascending.
    Ascending,
    /// Most recent first.
    Descending,
}

pub trait LedgerPort: Send + Sync {
    /// Persist a transaction, assigning its id and (if absent) its timestamp.
    fn append(&self, tx: NewTransaction) -> Result<Transaction, PaperledgerError>;

    fn list(&self, order: Order, limit: Option<usize>) -> Result<Vec<Transaction>, PaperledgerError>;

    fn append_value(&self, point: ValuationPoint) -> Result<(), PaperledgerError>;

    /// Valuation history, oldest first.
    fn list_values(&self) -> Result<Vec<ValuationPoint>, PaperledgerError>;

    /// Delete every transaction and valuation point, then seed genesis.
    fn reset(&self) -> Result<(), PaperledgerError>;

    /// Append the genesis DEPOSIT and its matching valuation point.
    fn seed_genesis(&self) -> Result<(), PaperledgerError> {
        self.append(NewTransaction::genesis())?;
        self.append_value(ValuationPoint::now(GENESIS_DEPOSIT))
    }
}
