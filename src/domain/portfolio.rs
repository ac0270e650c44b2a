//! Portfolio state and the ledger reducer.
//!
//! [`reduce`] is the canonical source of truth: the live state the engine
//! carries between cycles must always equal a fresh reduction of the ledger.
//! Live mutation goes through the same [`PortfolioState::apply`] step, so the
//! two paths cannot drift apart.

use std::collections::BTreeMap;

use super::position::{Position, effective_price};
use super::transaction::{Category, Transaction};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortfolioState {
    pub cash: f64,
    /// Ordered so that valuation sums are bit-for-bit reproducible.
    pub positions: BTreeMap<String, Position>,
}

impl PortfolioState {
    pub fn new(cash: f64) -> Self {
        PortfolioState {
            cash,
            positions: BTreeMap::new(),
        }
    }

    pub fn get_position(&self, asset: &str) -> Option<&Position> {
        self.positions.get(asset)
    }

    pub fn has_position(&self, asset: &str) -> bool {
        self.positions.contains_key(asset)
    }

    pub fn shares(&self, asset: &str) -> f64 {
        self.positions.get(asset).map_or(0.0, |p| p.shares)
    }

    /// Value of one asset at cost basis; zero when not held.
    pub fn asset_value(&self, asset: &str) -> f64 {
        self.positions.get(asset).map_or(0.0, Position::cost_value)
    }

    /// Σ shares × avg_price across all positions.
    pub fn holdings_value(&self) -> f64 {
        self.positions.values().map(Position::cost_value).sum()
    }

    pub fn total_value(&self) -> f64 {
        self.cash + self.holdings_value()
    }

    pub fn deposit(&mut self, amount: f64) {
        self.cash += amount;
    }

    /// Spend `amount` dollars on `asset` at `price`.
    pub fn buy(&mut self, asset: &str, amount: f64, price: Option<f64>) {
        let px = effective_price(price);
        self.cash -= amount;
        let position = self
            .positions
            .entry(asset.to_string())
            .or_insert_with(|| Position::new(asset));
        position.accumulate(amount / px, px);
        if position.is_dust() {
            self.positions.remove(asset);
        }
    }

    /// Sell `amount` dollars' worth of `asset` at `price`. Cash moves even when
    /// the asset is not held.
    pub fn sell(&mut self, asset: &str, amount: f64, price: Option<f64>) {
        let px = effective_price(price);
        self.cash += amount;
        if let Some(position) = self.positions.get_mut(asset) {
            position.reduce(amount / px);
            if position.is_dust() {
                self.positions.remove(asset);
            }
        }
    }

    /// Apply one ledger row.
    pub fn apply(&mut self, category: Category, amount: f64, asset: &str, price: Option<f64>) {
        match category {
            Category::Deposit => self.deposit(amount),
            Category::Buy => self.buy(asset, amount, price),
            Category::Sell => self.sell(asset, amount, price),
            Category::Hold | Category::Watch => {}
        }
    }

    /// Asset → value at cost basis.
    pub fn flat_holdings(&self) -> BTreeMap<String, f64> {
        self.positions
            .iter()
            .map(|(asset, p)| (asset.clone(), p.cost_value()))
            .collect()
    }
}

/// Replay transactions, already in ascending replay order, into a fresh state.
pub fn reduce<'a, I>(transactions: I) -> PortfolioState
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut state = PortfolioState::default();
    for tx in transactions {
        state.apply(tx.category, tx.amount, &tx.asset, tx.price);
    }
    state
}

/// Σ DEPOSIT amounts over a ledger.
pub fn total_deposited<'a, I>(transactions: I) -> f64
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .filter(|tx| tx.category == Category::Deposit)
        .map(|tx| tx.amount)
        .sum()
}
