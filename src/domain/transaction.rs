//! Ledger records: transactions and valuation points.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Cash deposited by the genesis row and by every reset.
pub const GENESIS_DEPOSIT: f64 = 100.0;
pub const GENESIS_ASSET: &str = "USD";
pub const GENESIS_DETAIL: &str = "Initial Deposit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Deposit,
    Buy,
    Sell,
    Hold,
    Watch,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Deposit => "DEPOSIT",
            Category::Buy => "BUY",
            Category::Sell => "SELL",
            Category::Hold => "HOLD",
            Category::Watch => "WATCH",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEPOSIT" => Ok(Category::Deposit),
            "BUY" => Ok(Category::Buy),
            "SELL" => Ok(Category::Sell),
            "HOLD" => Ok(Category::Hold),
            "WATCH" => Ok(Category::Watch),
            other => Err(format!("unknown transaction category '{other}'")),
        }
    }
}

/// A persisted ledger row. Never mutated once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub category: Category,
    pub amount: f64,
    pub asset: String,
    pub detail: String,
    /// Absent on legacy DEPOSIT rows.
    pub price: Option<f64>,
    /// Realized gain in percent; non-zero only on SELL rows.
    pub gain: f64,
}

/// A transaction before the ledger assigns its id (and timestamp, if absent).
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub timestamp: Option<DateTime<Utc>>,
    pub category: Category,
    pub amount: f64,
    pub asset: String,
    pub detail: String,
    pub price: Option<f64>,
    pub gain: f64,
}

impl NewTransaction {
    pub fn new(category: Category, amount: f64, asset: &str, detail: &str) -> Self {
        NewTransaction {
            timestamp: None,
            category,
            amount,
            asset: asset.to_string(),
            detail: detail.to_string(),
            price: None,
            gain: 0.0,
        }
    }

    pub fn genesis() -> Self {
        NewTransaction::new(
            Category::Deposit,
            GENESIS_DEPOSIT,
            GENESIS_ASSET,
            GENESIS_DETAIL,
        )
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Materialize into a persisted row.
    pub fn into_transaction(self, id: i64, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            timestamp: self.timestamp.unwrap_or(now),
            category: self.category,
            amount: self.amount,
            asset: self.asset,
            detail: self.detail,
            price: self.price,
            gain: self.gain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuationPoint {
    pub timestamp: DateTime<Utc>,
    pub total_value: f64,
}

impl ValuationPoint {
    pub fn now(total_value: f64) -> Self {
        ValuationPoint {
            timestamp: Utc::now(),
            total_value,
        }
    }
}

/// Sort into replay order: timestamp ascending, ties broken by id ascending.
pub fn sort_for_replay(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
}
