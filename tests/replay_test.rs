//! Replay properties: determinism of the reducer, live state matching a
//! fresh reduction, and serialized concurrent cycles.

mod common;

use chrono::{TimeZone, Utc};
use common::*;
use paperledger::adapters::memory_ledger::MemoryLedger;
use paperledger::domain::engine::{EngineConfig, PortfolioEngine};
use paperledger::domain::guardrail::GuardrailConfig;
use paperledger::domain::portfolio::reduce;
use paperledger::domain::proposal::{Action, Proposal};
use paperledger::domain::transaction::{Category, NewTransaction, Transaction};
use paperledger::ports::ledger_port::{LedgerPort, Order};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

const ASSETS: &[&str] = &["NVDA", "BTC-USD", "POLY:fed-cut:Yes"];

fn arb_transaction() -> impl Strategy<Value = (Category, f64, usize, Option<f64>)> {
    (
        prop_oneof![
            Just(Category::Deposit),
            Just(Category::Buy),
            Just(Category::Sell),
            Just(Category::Hold),
            Just(Category::Watch),
        ],
        0.0f64..500.0,
        0..ASSETS.len(),
        prop_oneof![Just(None), Just(Some(0.0)), (0.01f64..5000.0).prop_map(Some)],
    )
}

fn materialize(rows: &[(Category, f64, usize, Option<f64>)]) -> Vec<Transaction> {
    rows.iter()
        .enumerate()
        .map(|(i, (category, amount, asset, price))| {
            let mut tx = NewTransaction::new(*category, *amount, ASSETS[*asset], "");
            tx.price = *price;
            tx.at(Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap())
                .into_transaction(i as i64 + 1, Utc::now())
        })
        .collect()
}

fn arb_proposal() -> impl Strategy<Value = Proposal> {
    (
        prop_oneof![
            Just(Action::Buy),
            Just(Action::Sell),
            Just(Action::Hold),
            Just(Action::Watch),
        ],
        0..ASSETS.len(),
        -10.0f64..80.0,
        0.05f64..300.0,
    )
        .prop_map(|(action, asset, amount, price)| {
            Proposal::new(action, ASSETS[asset], amount, price, "generated")
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reduce_is_deterministic(rows in prop::collection::vec(arb_transaction(), 0..40)) {
        let txs = materialize(&rows);
        let first = reduce(&txs);
        let second = reduce(&txs);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn positions_never_hold_dust(rows in prop::collection::vec(arb_transaction(), 0..40)) {
        let state = reduce(&materialize(&rows));
        for position in state.positions.values() {
            prop_assert!(position.shares >= 1e-6);
        }
    }

    #[test]
    fn live_state_equals_replay(proposals in prop::collection::vec(arb_proposal(), 1..25)) {
        let ledger = Arc::new(MemoryLedger::new());
        let engine = PortfolioEngine::open(ledger.clone(), exact_config());
        for proposal in proposals {
            let result = engine.evaluate_and_execute(proposal);
            prop_assert!(result.persistence.is_durable());
            prop_assert!(engine.snapshot().cash >= -1e-9);
        }
        let check = engine.verify_replay().unwrap();
        prop_assert!(check.is_consistent(), "live {:?} vs replayed {:?}", check.live, check.replayed);
    }
}

#[test]
fn concurrent_cycles_never_overdraw() {
    let ledger = Arc::new(MemoryLedger::new());
    let config = EngineConfig {
        guardrails: GuardrailConfig {
            max_position_pct: 1.0,
            ..GuardrailConfig::default()
        },
        ..exact_config()
    };
    let engine = Arc::new(PortfolioEngine::open(ledger.clone(), config));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let oracle = ScriptedOracle::new();
                let oracle = (0..5).fold(oracle, |o, i| {
                    o.then(buy(&format!("T{t}-{i}"), 10.0, 1.0))
                });
                for _ in 0..5 {
                    engine.run_cycle(&oracle);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let snapshot = engine.snapshot();
    assert!(snapshot.cash >= 0.0);
    assert_eq!(snapshot.cash, 0.0);
    assert_eq!(snapshot.positions.len(), 10);

    let buys = ledger
        .list(Order::Ascending, None)
        .unwrap()
        .into_iter()
        .filter(|tx| tx.category == Category::Buy)
        .count();
    assert_eq!(buys, 10);
    assert!(engine.verify_replay().unwrap().is_consistent());
}
