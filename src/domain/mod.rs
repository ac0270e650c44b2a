//! Core domain types and logic.

pub mod transaction;
pub mod position;
pub mod portfolio;
pub mod proposal;
pub mod preferences;
pub mod guardrail;
pub mod executor;
pub mod valuation;
pub mod engine;
pub mod scheduler;
pub mod config_validation;
pub mod error;
