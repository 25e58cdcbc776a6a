//! Cash, holdings and equity bookkeeping for one simulation run

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::ExecutionConfig;
use crate::domain::{Order, OrderSide, PortfolioSnapshot};

/// Holdings smaller than this (in units) are treated as flat
const DUST_QUANTITY: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    run_id: String,
    balance: f64,
    holdings: HashMap<String, f64>,
    last_prices: HashMap<String, f64>,
    total_equity: f64,
    peak_equity: f64,
    max_drawdown: f64,
    worst_drawdown: f64,
    threshold_usd: f64,
}

impl PortfolioLedger {
    pub fn new(
        run_id: impl Into<String>,
        initial_capital: f64,
        assets: &[String],
        execution: &ExecutionConfig,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            balance: initial_capital,
            holdings: assets.iter().map(|a| (a.clone(), 0.0)).collect(),
            last_prices: HashMap::new(),
            total_equity: initial_capital,
            peak_equity: initial_capital,
            max_drawdown: 0.0,
            worst_drawdown: 0.0,
            threshold_usd: execution.threshold_usd,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn holdings(&self) -> &HashMap<String, f64> {
        &self.holdings
    }

    pub fn holding(&self, asset: &str) -> f64 {
        self.holdings.get(asset).copied().unwrap_or(0.0)
    }

    pub fn last_price(&self, asset: &str) -> Option<f64> {
        self.last_prices.get(asset).copied()
    }

    pub fn total_equity(&self) -> f64 {
        self.total_equity
    }

    pub fn peak_equity(&self) -> f64 {
        self.peak_equity
    }

    /// Current drawdown from peak
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn worst_drawdown(&self) -> f64 {
        self.worst_drawdown
    }

    /// Mark the book to `prices` and update peak and drawdown.
    ///
    /// Prices must already be sanitized; assets missing from `prices` keep
    /// their previous valuation price.
    pub fn revalue(&mut self, prices: &HashMap<String, f64>) {
        for (asset, price) in prices {
            self.last_prices.insert(asset.clone(), *price);
        }
        self.total_equity = self.mark_to_market();

        if self.total_equity > self.peak_equity {
            self.peak_equity = self.total_equity;
        }
        self.max_drawdown = if self.peak_equity > 0.0 {
            (self.peak_equity - self.total_equity) / self.peak_equity
        } else {
            0.0
        };
        self.worst_drawdown = self.worst_drawdown.max(self.max_drawdown);
    }

    fn mark_to_market(&self) -> f64 {
        let market_value: f64 = self
            .holdings
            .iter()
            .map(|(asset, qty)| qty * self.last_prices.get(asset).copied().unwrap_or(0.0))
            .sum();
        self.balance + market_value
    }

    /// Move every position toward its USD target at the last valuation price.
    ///
    /// Differences at or below the execution threshold are left alone. Sells
    /// settle before buys, and a buy never spends more cash than the ledger
    /// holds. Returns the filled orders in execution order.
    pub fn rebalance(&mut self, tick_id: u64, targets: &HashMap<String, f64>) -> Vec<Order> {
        let mut assets: Vec<&String> = targets.keys().collect();
        assets.sort();

        let mut sells = Vec::new();
        let mut buys = Vec::new();
        for asset in assets {
            let Some(price) = self.last_price(asset).filter(|p| *p > 0.0) else {
                debug!(asset = %asset, "ledger: no valuation price, skipping");
                continue;
            };
            let diff = targets[asset] - self.holding(asset) * price;
            if diff.abs() <= self.threshold_usd {
                continue;
            }
            if diff < 0.0 {
                sells.push((asset.clone(), diff, price));
            } else {
                buys.push((asset.clone(), diff, price));
            }
        }

        let mut orders = Vec::with_capacity(sells.len() + buys.len());

        for (asset, diff, price) in sells {
            let held = self.holding(&asset);
            let mut quantity = (diff.abs() / price).min(held);
            if targets[&asset] <= 0.0 || held - quantity < DUST_QUANTITY {
                quantity = held;
            }
            self.balance += quantity * price;
            self.holdings.insert(asset.clone(), held - quantity);
            orders.push(self.fill(tick_id, &asset, OrderSide::Sell, quantity, price));
        }

        for (asset, diff, price) in buys {
            let notional = diff.min(self.balance.max(0.0));
            if notional <= self.threshold_usd {
                debug!(asset = %asset, wanted = diff, available = self.balance, "ledger: insufficient cash for buy");
                continue;
            }
            let quantity = notional / price;
            self.balance -= notional;
            *self.holdings.entry(asset.clone()).or_insert(0.0) += quantity;
            orders.push(self.fill(tick_id, &asset, OrderSide::Buy, quantity, price));
        }

        self.total_equity = self.mark_to_market();
        orders
    }

    fn fill(&self, tick_id: u64, asset: &str, side: OrderSide, quantity: f64, price: f64) -> Order {
        info!(
            tick_id,
            asset,
            side = %side,
            quantity,
            price,
            "TRADE"
        );
        Order::filled(&self.run_id, tick_id, asset, side, quantity, price)
    }

    pub fn snapshot(&self, tick_id: u64, timestamp: DateTime<Utc>) -> PortfolioSnapshot {
        PortfolioSnapshot {
            run_id: self.run_id.clone(),
            tick_id,
            timestamp,
            balance: self.balance,
            holdings: self.holdings.clone(),
            total_equity: self.total_equity,
            peak_equity: self.peak_equity,
            max_drawdown: self.max_drawdown,
            worst_drawdown: self.worst_drawdown,
        }
    }
}
