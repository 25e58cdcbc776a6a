//! Signal arbitration with temporal memory
//!
//! Fuses every advice record of a tick into one sentiment score per asset:
//! - confidence gating (records under the threshold are ignored)
//! - mean of signed confidences, blended into memory with an EMA
//! - hysteresis so that small moves do not churn the portfolio
//! - decay toward neutral for assets that received no usable advice

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::config::ArbiterConfig;
use crate::domain::AdviceRecord;

/// Per-tick multiplier applied to memory of assets without usable advice
pub const DECAY_FACTOR: f64 = 0.8;
/// Minimum change in smoothed score required to update memory
pub const HYSTERESIS_BAND: f64 = 0.1;
/// Scores closer to zero than this always commit (and decay snaps to zero)
pub const NEUTRAL_BAND: f64 = 0.05;

/// Stateful arbiter. One instance per simulation run.
#[derive(Debug, Clone)]
pub struct SignalArbiter {
    config: ArbiterConfig,
    memory: HashMap<String, f64>,
}

impl SignalArbiter {
    pub fn new(config: ArbiterConfig) -> Self {
        Self {
            config,
            memory: HashMap::new(),
        }
    }

    /// Start from previously persisted sentiment
    pub fn with_memory(config: ArbiterConfig, memory: HashMap<String, f64>) -> Self {
        Self { config, memory }
    }

    pub fn memory(&self) -> &HashMap<String, f64> {
        &self.memory
    }

    pub fn score(&self, asset: &str) -> Option<f64> {
        self.memory.get(asset).copied()
    }

    /// Aggregate one tick of advice into a fresh asset -> sentiment map.
    ///
    /// Assets already tracked in memory are always processed, so stale
    /// assets decay even when no advisor mentioned them this tick.
    pub fn aggregate(&mut self, advice: &[AdviceRecord]) -> HashMap<String, f64> {
        let mut grouped: HashMap<&str, Vec<&AdviceRecord>> = HashMap::new();
        for record in advice {
            grouped.entry(record.asset.as_str()).or_default().push(record);
        }

        let assets: BTreeSet<String> = grouped
            .keys()
            .map(|a| a.to_string())
            .chain(self.memory.keys().cloned())
            .collect();

        let mut scores = HashMap::with_capacity(assets.len());

        for asset in assets {
            let signals: Vec<f64> = grouped
                .get(asset.as_str())
                .map(|records| {
                    records
                        .iter()
                        .filter(|r| r.confidence >= self.config.confidence_threshold)
                        .map(|r| r.signed_confidence())
                        .collect()
                })
                .unwrap_or_default();

            let prior = self.memory.get(&asset).copied().unwrap_or(0.0);

            let next = if signals.is_empty() {
                let decayed = prior * DECAY_FACTOR;
                if decayed.abs() < NEUTRAL_BAND {
                    0.0
                } else {
                    decayed
                }
            } else {
                let raw = signals.iter().sum::<f64>() / signals.len() as f64;
                let alpha = self.config.smoothing_factor;
                let smoothed = raw * alpha + prior * (1.0 - alpha);

                if (smoothed - prior).abs() > HYSTERESIS_BAND || smoothed.abs() < NEUTRAL_BAND {
                    smoothed
                } else {
                    debug!(
                        asset = %asset,
                        prior,
                        smoothed,
                        "arbiter: change inside hysteresis band, keeping prior"
                    );
                    prior
                }
            };

            self.memory.insert(asset.clone(), next);
            scores.insert(asset, next);
        }

        scores
    }
}
