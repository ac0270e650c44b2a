//! Decision oracle adapters.
//!
//! - `simulated`: seeded random proposals, no network
//! - `reply`: model reply parsing and a file-backed source
//!
//! [`FallbackOracle`] chains several sources in priority order.

pub mod reply;
pub mod simulated;

use tracing::{debug, warn};

use crate::domain::config_validation::parse_seed;
use crate::domain::error::PaperledgerError;
use crate::domain::proposal::Proposal;
use crate::ports::config_port::ConfigPort;
use crate::ports::oracle_port::{DecisionOracle, OracleRequest};

pub use reply::{ReplyFileOracle, parse_reply};
pub use simulated::SimulatedOracle;

/// Tries each oracle in order; the first successful proposal wins.
pub struct FallbackOracle {
    chain: Vec<Box<dyn DecisionOracle>>,
}

impl FallbackOracle {
    pub fn new(chain: Vec<Box<dyn DecisionOracle>>) -> Self {
        FallbackOracle { chain }
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl DecisionOracle for FallbackOracle {
    fn name(&self) -> &str {
        "fallback"
    }

    fn propose(&self, request: &OracleRequest<'_>) -> Result<Proposal, PaperledgerError> {
        let mut failures = Vec::new();
        for oracle in &self.chain {
            match oracle.propose(request) {
                Ok(proposal) => {
                    debug!(oracle = oracle.name(), action = %proposal.action, "proposal received");
                    return Ok(proposal);
                }
                Err(e) => {
                    warn!(oracle = oracle.name(), error = %e, "oracle failed, trying next");
                    failures.push(format!("{}: {e}", oracle.name()));
                }
            }
        }
        Err(PaperledgerError::OracleUnavailable {
            reason: if failures.is_empty() {
                "no oracles configured".to_string()
            } else {
                failures.join("; ")
            },
        })
    }
}

/// Build the oracle chain named by `[oracle] strategies` (default `simulated`).
pub fn build_oracle(config: &dyn ConfigPort) -> Result<FallbackOracle, PaperledgerError> {
    let names = config
        .get_string("oracle", "strategies")
        .unwrap_or_else(|| "simulated".to_string());
    let seed = parse_seed(config, "oracle")?;

    let mut chain: Vec<Box<dyn DecisionOracle>> = Vec::new();
    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match name.to_ascii_lowercase().as_str() {
            "simulated" => chain.push(Box::new(SimulatedOracle::new(seed))),
            "file" => {
                let path = config.get_string("oracle", "reply_path").ok_or_else(|| {
                    PaperledgerError::ConfigMissing {
                        section: "oracle".to_string(),
                        key: "reply_path".to_string(),
                    }
                })?;
                chain.push(Box::new(ReplyFileOracle::new(path)));
            }
            other => {
                return Err(PaperledgerError::ConfigInvalid {
                    section: "oracle".to_string(),
                    key: "strategies".to_string(),
                    reason: format!("unknown oracle '{other}'"),
                });
            }
        }
    }

    if chain.is_empty() {
        return Err(PaperledgerError::ConfigInvalid {
            section: "oracle".to_string(),
            key: "strategies".to_string(),
            reason: "at least one oracle must be listed".to_string(),
        });
    }
    Ok(FallbackOracle::new(chain))
}
