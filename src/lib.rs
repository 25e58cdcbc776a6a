pub mod advisors;
pub mod cli;
pub mod config;
pub mod decision;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod portfolio;
pub mod simulation;

pub use advisors::{Advisor, AdvisorOutcome, AdvisorSignal, AdvisoryRequest, AnalystAdvisor, QuantAdvisor};
pub use config::AppConfig;
pub use decision::{CapitalAllocator, SignalArbiter};
pub use domain::{AdviceRecord, MarketBar, MarketTick, Order, OrderSide, Outlook, PortfolioSnapshot, RunStatus, TickReport};
pub use error::{AdvisorError, NexusError, Result};
pub use persistence::{MemoryRecorder, NullRecorder, PostgresRecorder, RunRecorder};
pub use portfolio::PortfolioLedger;
pub use simulation::{MarketReplay, MarketSource, RunSummary, SimulationEngine};
