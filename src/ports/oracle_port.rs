//! Decision oracle port trait.

use std::collections::BTreeMap;

use crate::domain::error::PaperledgerError;
use crate::domain::position::Position;
use crate::domain::preferences::TradingPreferences;
use crate::domain::proposal::Proposal;

/// What the oracle is shown when asked for a decision.
#[derive(Debug, Clone, Copy)]
pub struct OracleRequest<'a> {
    pub cash: f64,
    pub positions: &'a BTreeMap<String, Position>,
    pub preferences: &'a TradingPreferences,
}

/// Proposes one action per cycle. Failures never reach the ledger: the
/// engine degrades any `Err` to a HOLD.
pub trait DecisionOracle: Send + Sync {
    fn name(&self) -> &str;

    fn propose(&self, request: &OracleRequest<'_>) -> Result<Proposal, PaperledgerError>;
}
