use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order status. Simulated fills are immediate and complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Filled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Filled => "FILLED",
        }
    }
}

/// A rebalance action that crossed the execution threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub run_id: String,
    pub tick_id: u64,
    pub asset: String,
    pub side: OrderSide,
    /// Always positive
    pub quantity: f64,
    pub fill_price: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn filled(
        run_id: &str,
        tick_id: u64,
        asset: &str,
        side: OrderSide,
        quantity: f64,
        fill_price: f64,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            tick_id,
            asset: asset.to_string(),
            side,
            quantity,
            fill_price,
            status: OrderStatus::Filled,
            created_at: Utc::now(),
        }
    }

    /// USD notional of the fill
    pub fn notional(&self) -> f64 {
        self.quantity * self.fill_price
    }

    /// Cash impact: negative for buys, positive for sells
    pub fn cash_delta(&self) -> f64 {
        match self.side {
            OrderSide::Buy => -self.notional(),
            OrderSide::Sell => self.notional(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cash_delta_sign_follows_side() {
        let buy = Order::filled("r", 1, "BTC-USD", OrderSide::Buy, 2.0, 100.0);
        let sell = Order::filled("r", 1, "BTC-USD", OrderSide::Sell, 2.0, 100.0);
        assert_eq!(buy.cash_delta(), -200.0);
        assert_eq!(sell.cash_delta(), 200.0);
        assert_eq!(buy.status, OrderStatus::Filled);
    }
}
