use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::{AdviceRecord, MarketBar, Order};

/// Lifecycle of a simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    /// Market series exhausted
    Completed,
    /// Stopped between ticks by a shutdown signal or tick limit
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Interrupted => "INTERRUPTED",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Header row for a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub project: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    /// Full configuration the run was started with
    pub config_snapshot: serde_json::Value,
    pub status: RunStatus,
}

/// Point-in-time copy of the portfolio after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub run_id: String,
    pub tick_id: u64,
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
    pub holdings: HashMap<String, f64>,
    pub total_equity: f64,
    pub peak_equity: f64,
    /// Drawdown from peak at this tick
    pub max_drawdown: f64,
    /// Largest drawdown seen so far in the run
    pub worst_drawdown: f64,
}

/// Everything one tick produced, handed to the run recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub run_id: String,
    pub tick_id: u64,
    pub timestamp: DateTime<Utc>,
    /// Bars as replayed, before sanitization
    pub bars: HashMap<String, MarketBar>,
    /// Prices used for valuation and execution
    pub prices: HashMap<String, f64>,
    pub advice: Vec<AdviceRecord>,
    pub scores: HashMap<String, f64>,
    pub volatilities: HashMap<String, f64>,
    pub targets: HashMap<String, f64>,
    pub orders: Vec<Order>,
    pub snapshot: PortfolioSnapshot,
}
