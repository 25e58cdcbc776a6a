//! Run recording
//!
//! The engine hands every run header and tick report to a [`RunRecorder`].
//! Recording is best effort: the engine logs recorder failures and keeps
//! simulating.
//! - [`MemoryRecorder`]: keeps everything in memory (tests, short runs)
//! - [`NullRecorder`]: discards everything
//! - [`PostgresRecorder`]: one transaction per tick into PostgreSQL

pub mod memory;
pub mod postgres;

pub use memory::{MemoryRecorder, NullRecorder};
pub use postgres::PostgresRecorder;

use async_trait::async_trait;

use crate::domain::{RunRecord, RunStatus, TickReport};
use crate::error::Result;

#[async_trait]
pub trait RunRecorder: Send + Sync {
    async fn start_run(&self, run: &RunRecord) -> Result<()>;

    async fn record_tick(&self, report: &TickReport) -> Result<()>;

    async fn finish_run(&self, run_id: &str, status: RunStatus) -> Result<()>;
}
