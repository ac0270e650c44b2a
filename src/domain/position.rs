//! Per-asset holdings under weighted-average cost basis.

/// Positions whose share count falls below this are removed, not kept at ~0.
pub const DUST_SHARES: f64 = 1e-6;

/// Resolve the price a trade settles at. Non-positive or non-finite prices
/// (legacy rows, malformed proposals) clamp to 1.0 so share math never divides by zero.
pub fn effective_price(price: Option<f64>) -> f64 {
    match price {
        Some(px) if px.is_finite() && px > 0.0 => px,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub asset: String,
    pub shares: f64,
    pub avg_price: f64,
}

impl Position {
    pub fn new(asset: &str) -> Self {
        Position {
            asset: asset.to_string(),
            shares: 0.0,
            avg_price: 0.0,
        }
    }

    /// Value at cost basis.
    pub fn cost_value(&self) -> f64 {
        self.shares * self.avg_price
    }

    pub fn is_dust(&self) -> bool {
        self.shares < DUST_SHARES
    }

    /// Add `shares_bought` at `price`, re-weighting the average cost.
    pub fn accumulate(&mut self, shares_bought: f64, price: f64) {
        let total = self.shares + shares_bought;
        self.avg_price = if total > 0.0 {
            (self.shares * self.avg_price + shares_bought * price) / total
        } else {
            price
        };
        self.shares = total;
    }

    /// Remove shares. The average cost is left untouched.
    pub fn reduce(&mut self, shares_sold: f64) {
        self.shares = (self.shares - shares_sold).max(0.0);
    }

    /// Realized gain in percent for a sale at `price`.
    pub fn realized_gain_pct(&self, price: f64) -> f64 {
        if self.avg_price > 0.0 {
            (price - self.avg_price) / self.avg_price * 100.0
        } else {
            0.0
        }
    }
}
