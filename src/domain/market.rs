use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One replayed bar for a single asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub asset: String,
    /// Close price of the bar; may be NaN or non-positive in raw data
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl MarketBar {
    pub fn new(asset: impl Into<String>, price: f64, volume: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            asset: asset.into(),
            price,
            volume,
            timestamp,
        }
    }

    /// A price usable for valuation and execution
    pub fn has_valid_price(&self) -> bool {
        is_valid_price(self.price)
    }
}

/// Portfolio-wide snapshot: every asset of the universe at one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTick {
    /// 1-based tick index
    pub tick_id: u64,
    pub bars: HashMap<String, MarketBar>,
}

impl MarketTick {
    pub fn price(&self, asset: &str) -> Option<f64> {
        self.bars.get(asset).map(|b| b.price)
    }
}

pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}
