//! Port traits: the collaborators the domain depends on.

pub mod config_port;
pub mod ledger_port;
pub mod oracle_port;
