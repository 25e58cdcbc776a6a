use async_trait::async_trait;
use tokio::sync::RwLock;

use super::RunRecorder;
use crate::domain::{AdviceRecord, Order, PortfolioSnapshot, RunRecord, RunStatus, TickReport};
use crate::error::{NexusError, Result};

/// In-memory recorder
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    run: RwLock<Option<RunRecord>>,
    ticks: RwLock<Vec<TickReport>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run(&self) -> Option<RunRecord> {
        self.run.read().await.clone()
    }

    pub async fn status(&self) -> Option<RunStatus> {
        self.run.read().await.as_ref().map(|r| r.status)
    }

    pub async fn ticks(&self) -> Vec<TickReport> {
        self.ticks.read().await.clone()
    }

    pub async fn tick_count(&self) -> usize {
        self.ticks.read().await.len()
    }

    pub async fn advice(&self) -> Vec<AdviceRecord> {
        self.ticks
            .read()
            .await
            .iter()
            .flat_map(|t| t.advice.iter().cloned())
            .collect()
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.ticks
            .read()
            .await
            .iter()
            .flat_map(|t| t.orders.iter().cloned())
            .collect()
    }

    pub async fn snapshots(&self) -> Vec<PortfolioSnapshot> {
        self.ticks
            .read()
            .await
            .iter()
            .map(|t| t.snapshot.clone())
            .collect()
    }
}

#[async_trait]
impl RunRecorder for MemoryRecorder {
    async fn start_run(&self, run: &RunRecord) -> Result<()> {
        *self.run.write().await = Some(run.clone());
        self.ticks.write().await.clear();
        Ok(())
    }

    async fn record_tick(&self, report: &TickReport) -> Result<()> {
        self.ticks.write().await.push(report.clone());
        Ok(())
    }

    async fn finish_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        match self.run.write().await.as_mut() {
            Some(run) if run.run_id == run_id => {
                run.status = status;
                Ok(())
            }
            _ => Err(NexusError::Internal(format!("unknown run {}", run_id))),
        }
    }
}

/// Recorder that keeps nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

#[async_trait]
impl RunRecorder for NullRecorder {
    async fn start_run(&self, _run: &RunRecord) -> Result<()> {
        Ok(())
    }

    async fn record_tick(&self, _report: &TickReport) -> Result<()> {
        Ok(())
    }

    async fn finish_run(&self, _run_id: &str, _status: RunStatus) -> Result<()> {
        Ok(())
    }
}
