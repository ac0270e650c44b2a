//! paperledger: replay-based paper trading portfolio engine.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. Every state change is an
//! append-only ledger row; live state is whatever a replay of that ledger
//! produces.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
