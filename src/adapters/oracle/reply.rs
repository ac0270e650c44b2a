//! Parsing of free-text model replies into proposals.
//!
//! Replies are expected to carry one JSON object with keys `action`,
//! `asset`, `amount` (USD), `price` and `reasoning`, optionally wrapped in a
//! fenced code block.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::error::PaperledgerError;
use crate::domain::proposal::{Action, Proposal};
use crate::ports::oracle_port::{DecisionOracle, OracleRequest};

#[derive(Debug, Deserialize)]
struct RawReply {
    action: String,
    #[serde(default)]
    asset: Option<String>,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Strip a ```json (or bare ```) fence if present.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let body = if let Some((_, rest)) = trimmed.split_once("```json") {
        rest
    } else if let Some((_, rest)) = trimmed.split_once("```") {
        rest
    } else {
        return trimmed;
    };
    body.split_once("```").map_or(body, |(inner, _)| inner).trim()
}

pub fn parse_reply(text: &str) -> Result<Proposal, PaperledgerError> {
    let raw: RawReply =
        serde_json::from_str(extract_json(text)).map_err(|e| PaperledgerError::OracleReply {
            reason: e.to_string(),
        })?;
    let action = raw
        .action
        .parse::<Action>()
        .map_err(|reason| PaperledgerError::OracleReply { reason })?;
    let price = match raw.price {
        Some(px) if px != 0.0 => px,
        _ => 1.0,
    };
    Ok(Proposal {
        action,
        asset: raw.asset.unwrap_or_default(),
        amount: raw.amount.unwrap_or(0.0),
        price,
        reasoning: raw.reasoning.unwrap_or_default(),
    }
    .normalized())
}

/// Reads the latest model reply from a file written by an external process.
pub struct ReplyFileOracle {
    path: PathBuf,
}

impl ReplyFileOracle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ReplyFileOracle { path: path.into() }
    }
}

impl DecisionOracle for ReplyFileOracle {
    fn name(&self) -> &str {
        "reply-file"
    }

    fn propose(&self, _request: &OracleRequest<'_>) -> Result<Proposal, PaperledgerError> {
        let text = fs::read_to_string(&self.path).map_err(|e| PaperledgerError::OracleUnavailable {
            reason: format!("{}: {e}", self.path.display()),
        })?;
        parse_reply(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::preferences::TradingPreferences;
    use std::collections::BTreeMap;
    use std::io::Write;

    #[test]
    fn plain_json() {
        let p = parse_reply(
            r#"{"action":"BUY","asset":"NVDA","amount":50.0,"price":140.5,"reasoning":"dip"}"#,
        )
        .unwrap();
        assert_eq!(p.action, Action::Buy);
        assert_eq!(p.asset, "NVDA");
        assert_eq!(p.amount, 50.0);
        assert_eq!(p.price, 140.5);
        assert_eq!(p.reasoning, "dip");
    }

    #[test]
    fn fenced_json_block() {
        let text = "Here you go:\n```json\n{\"action\": \"sell\", \"asset\": \"BTC-USD\", \"amount\": 10, \"price\": 60000}\n```\nGood luck";
        let p = parse_reply(text).unwrap();
        assert_eq!(p.action, Action::Sell);
        assert_eq!(p.asset, "BTC-USD");
    }

    #[test]
    fn bare_fence() {
        let text = "```\n{\"action\": \"WATCH\", \"asset\": \"POLY:x\"}\n```";
        let p = parse_reply(text).unwrap();
        assert_eq!(p.action, Action::Watch);
        assert_eq!(p.amount, 0.0);
        assert_eq!(p.price, 1.0);
    }

    #[test]
    fn missing_price_defaults_to_one() {
        let p = parse_reply(r#"{"action":"HOLD"}"#).unwrap();
        assert_eq!(p.price, 1.0);
        assert_eq!(p.asset, "");
    }

    #[test]
    fn not_json_is_reply_error() {
        let err = parse_reply("I think you should buy NVDA").unwrap_err();
        assert!(matches!(err, PaperledgerError::OracleReply { .. }));
    }

    #[test]
    fn unknown_action_is_reply_error() {
        let err = parse_reply(r#"{"action":"SHORT"}"#).unwrap_err();
        assert!(matches!(err, PaperledgerError::OracleReply { .. }));
    }

    #[test]
    fn reply_file_oracle_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"action":"BUY","asset":"AAPL","amount":5,"price":200}}"#).unwrap();
        let oracle = ReplyFileOracle::new(file.path());
        let positions = BTreeMap::new();
        let prefs = TradingPreferences::default();
        let request = OracleRequest {
            cash: 100.0,
            positions: &positions,
            preferences: &prefs,
        };
        let p = oracle.propose(&request).unwrap();
        assert_eq!(p.asset, "AAPL");
    }

    #[test]
    fn reply_file_oracle_missing_file() {
        let oracle = ReplyFileOracle::new("/nonexistent/reply.json");
        let positions = BTreeMap::new();
        let prefs = TradingPreferences::default();
        let request = OracleRequest {
            cash: 100.0,
            positions: &positions,
            preferences: &prefs,
        };
        assert!(matches!(
            oracle.propose(&request),
            Err(PaperledgerError::OracleUnavailable { .. })
        ));
    }
}
