//! Configuration validation.
//!
//! Reads each section through [`ConfigPort`], applies defaults, and rejects
//! out-of-range values before the engine starts.

use std::time::Duration;

use crate::domain::engine::{DEFAULT_DEPOSIT, EngineConfig};
use crate::domain::error::PaperledgerError;
use crate::domain::guardrail::GuardrailConfig;
use crate::domain::preferences::TradingPreferences;
use crate::domain::proposal::PREDICTION_PREFIX;
use crate::domain::scheduler::SchedulerConfig;
use crate::domain::valuation::ValuationConfig;
use crate::ports::config_port::ConfigPort;

pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, PaperledgerError> {
    Ok(EngineConfig {
        guardrails: build_guardrail_config(config)?,
        valuation: build_valuation_config(config)?,
        preferences: build_preferences(config),
    })
}

pub fn build_guardrail_config(config: &dyn ConfigPort) -> Result<GuardrailConfig, PaperledgerError> {
    let defaults = GuardrailConfig::default();

    let max_position_pct =
        config.get_double("guardrails", "max_position_pct", defaults.max_position_pct);
    if !max_position_pct.is_finite() || max_position_pct <= 0.0 || max_position_pct > 1.0 {
        return Err(invalid(
            "guardrails",
            "max_position_pct",
            "max_position_pct must be in (0, 1]",
        ));
    }

    let min_trade_usd = config.get_double("guardrails", "min_trade_usd", defaults.min_trade_usd);
    if !min_trade_usd.is_finite() || min_trade_usd < 0.0 {
        return Err(invalid(
            "guardrails",
            "min_trade_usd",
            "min_trade_usd must be finite and non-negative",
        ));
    }

    let prediction_price_ceiling = config.get_double(
        "guardrails",
        "prediction_price_ceiling",
        defaults.prediction_price_ceiling,
    );
    if !prediction_price_ceiling.is_finite()
        || prediction_price_ceiling <= 0.0
        || prediction_price_ceiling > 1.0
    {
        return Err(invalid(
            "guardrails",
            "prediction_price_ceiling",
            "prediction_price_ceiling must be in (0, 1]",
        ));
    }

    let prediction_price_heuristic = config.get_double(
        "guardrails",
        "prediction_price_heuristic",
        defaults.prediction_price_heuristic,
    );
    if !prediction_price_heuristic.is_finite() || prediction_price_heuristic < 0.0 {
        return Err(invalid(
            "guardrails",
            "prediction_price_heuristic",
            "prediction_price_heuristic must be finite and non-negative",
        ));
    }

    let prediction_prefix = match config.get_string("guardrails", "prediction_prefix") {
        Some(s) if s.trim().is_empty() => {
            return Err(invalid(
                "guardrails",
                "prediction_prefix",
                "prediction_prefix must not be empty",
            ));
        }
        Some(s) => s.trim().to_string(),
        None => PREDICTION_PREFIX.to_string(),
    };

    Ok(GuardrailConfig {
        max_position_pct,
        min_trade_usd,
        prediction_price_ceiling,
        prediction_price_heuristic,
        prediction_prefix,
        audit_rejections: config.get_bool("guardrails", "audit_rejections", false),
    })
}

pub fn build_valuation_config(config: &dyn ConfigPort) -> Result<ValuationConfig, PaperledgerError> {
    let drift = config.get_double("valuation", "drift", ValuationConfig::default().drift);
    if !drift.is_finite() || !(0.0..1.0).contains(&drift) {
        return Err(invalid("valuation", "drift", "drift must be in [0, 1)"));
    }
    Ok(ValuationConfig {
        drift,
        seed: parse_seed(config, "valuation")?,
    })
}

pub fn build_scheduler_config(config: &dyn ConfigPort) -> Result<SchedulerConfig, PaperledgerError> {
    let interval_secs = config.get_int("scheduler", "interval_secs", 300);
    if interval_secs <= 0 {
        return Err(invalid(
            "scheduler",
            "interval_secs",
            "interval_secs must be positive",
        ));
    }
    let poll_millis = config.get_int("scheduler", "poll_millis", 1000);
    if poll_millis <= 0 {
        return Err(invalid(
            "scheduler",
            "poll_millis",
            "poll_millis must be positive",
        ));
    }
    Ok(SchedulerConfig {
        interval: Duration::from_secs(interval_secs as u64),
        poll: Duration::from_millis(poll_millis as u64),
    })
}

pub fn build_preferences(config: &dyn ConfigPort) -> TradingPreferences {
    let defaults = TradingPreferences::default();
    TradingPreferences {
        stocks: config.get_bool("preferences", "stocks", defaults.stocks),
        crypto: config.get_bool("preferences", "crypto", defaults.crypto),
        polymarket: config.get_bool("preferences", "polymarket", defaults.polymarket),
    }
}

pub fn deposit_amount(config: &dyn ConfigPort) -> Result<f64, PaperledgerError> {
    let amount = config.get_double("deposit", "amount", DEFAULT_DEPOSIT);
    if !amount.is_finite() || amount <= 0.0 {
        return Err(invalid("deposit", "amount", "amount must be positive"));
    }
    Ok(amount)
}

/// Optional non-negative integer seed in `[section] seed`.
pub fn parse_seed(config: &dyn ConfigPort, section: &str) -> Result<Option<u64>, PaperledgerError> {
    match config.get_string(section, "seed") {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| invalid(section, "seed", "seed must be a non-negative integer")),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> PaperledgerError {
    PaperledgerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            MapConfig(
                entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            )
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }
        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    fn expect_invalid(result: Result<impl std::fmt::Debug, PaperledgerError>, expected_key: &str) {
        match result {
            Err(PaperledgerError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = MapConfig::new(&[]);
        let engine = build_engine_config(&cfg).unwrap();
        assert_eq!(engine.guardrails, GuardrailConfig::default());
        assert_eq!(engine.valuation, ValuationConfig::default());
        assert_eq!(engine.preferences, TradingPreferences::default());
        assert_eq!(build_scheduler_config(&cfg).unwrap(), SchedulerConfig::default());
        assert_eq!(deposit_amount(&cfg).unwrap(), 1000.0);
    }

    #[test]
    fn overrides_are_read() {
        let cfg = MapConfig::new(&[
            ("guardrails", "max_position_pct", "0.25"),
            ("guardrails", "audit_rejections", "true"),
            ("guardrails", "prediction_prefix", "KALSHI:"),
            ("valuation", "seed", "17"),
            ("preferences", "crypto", "false"),
            ("scheduler", "interval_secs", "60"),
        ]);
        let engine = build_engine_config(&cfg).unwrap();
        assert_eq!(engine.guardrails.max_position_pct, 0.25);
        assert!(engine.guardrails.audit_rejections);
        assert_eq!(engine.guardrails.prediction_prefix, "KALSHI:");
        assert_eq!(engine.valuation.seed, Some(17));
        assert!(!engine.preferences.crypto);
        assert_eq!(
            build_scheduler_config(&cfg).unwrap().interval,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn rejects_out_of_range_position_pct() {
        let cfg = MapConfig::new(&[("guardrails", "max_position_pct", "1.5")]);
        expect_invalid(build_guardrail_config(&cfg), "max_position_pct");
    }

    #[test]
    fn rejects_bad_ceiling() {
        let cfg = MapConfig::new(&[("guardrails", "prediction_price_ceiling", "0")]);
        expect_invalid(build_guardrail_config(&cfg), "prediction_price_ceiling");
    }

    #[test]
    fn rejects_blank_prefix() {
        let cfg = MapConfig::new(&[("guardrails", "prediction_prefix", "  ")]);
        expect_invalid(build_guardrail_config(&cfg), "prediction_prefix");
    }

    #[test]
    fn rejects_bad_drift() {
        let cfg = MapConfig::new(&[("valuation", "drift", "1.0")]);
        expect_invalid(build_valuation_config(&cfg), "drift");
    }

    #[test]
    fn rejects_bad_seed() {
        let cfg = MapConfig::new(&[("valuation", "seed", "-3")]);
        expect_invalid(build_valuation_config(&cfg), "seed");
    }

    #[test]
    fn rejects_non_positive_interval() {
        let cfg = MapConfig::new(&[("scheduler", "interval_secs", "0")]);
        expect_invalid(build_scheduler_config(&cfg), "interval_secs");
    }

    #[test]
    fn rejects_nan_everywhere() {
        for key in [
            "max_position_pct",
            "min_trade_usd",
            "prediction_price_ceiling",
            "prediction_price_heuristic",
        ] {
            let cfg = MapConfig::new(&[("guardrails", key, "NaN")]);
            expect_invalid(build_guardrail_config(&cfg), key);
        }
        let cfg = MapConfig::new(&[("valuation", "drift", "NaN")]);
        expect_invalid(build_valuation_config(&cfg), "drift");
        let cfg = MapConfig::new(&[("deposit", "amount", "NaN")]);
        expect_invalid(deposit_amount(&cfg), "amount");
    }

    #[test]
    fn rejects_infinite_heuristic() {
        let cfg = MapConfig::new(&[("guardrails", "prediction_price_heuristic", "inf")]);
        expect_invalid(build_guardrail_config(&cfg), "prediction_price_heuristic");
    }

    #[test]
    fn rejects_non_positive_deposit() {
        let cfg = MapConfig::new(&[("deposit", "amount", "-1")]);
        expect_invalid(deposit_amount(&cfg), "amount");
    }
}
