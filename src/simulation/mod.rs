//! Simulation runtime: market replay and the tick orchestrator

pub mod engine;
pub mod market;

pub use engine::{RunSummary, SimulationEngine};
pub use market::{load_bars_from_csv, MarketReplay, MarketSource};
