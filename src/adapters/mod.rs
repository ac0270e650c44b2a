//! Concrete adapter implementations for ports.

#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod memory_ledger;
pub mod oracle;
pub mod file_config_adapter;
