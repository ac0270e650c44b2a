//! Which asset classes the oracle may buy.

use serde::Deserialize;

use super::proposal::AssetClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingPreferences {
    pub stocks: bool,
    pub crypto: bool,
    pub polymarket: bool,
}

impl Default for TradingPreferences {
    fn default() -> Self {
        TradingPreferences {
            stocks: true,
            crypto: true,
            polymarket: true,
        }
    }
}

/// Partial update; unset fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PreferencesUpdate {
    pub stocks: Option<bool>,
    pub crypto: Option<bool>,
    pub polymarket: Option<bool>,
}

impl TradingPreferences {
    pub fn allows(&self, class: AssetClass) -> bool {
        match class {
            AssetClass::Stock => self.stocks,
            AssetClass::Crypto => self.crypto,
            AssetClass::PredictionMarket => self.polymarket,
        }
    }

    pub fn apply(&mut self, update: PreferencesUpdate) {
        if let Some(v) = update.stocks {
            self.stocks = v;
        }
        if let Some(v) = update.crypto {
            self.crypto = v;
        }
        if let Some(v) = update.polymarket {
            self.polymarket = v;
        }
    }
}
