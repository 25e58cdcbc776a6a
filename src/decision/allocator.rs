//! Risk-parity capital allocation
//!
//! Maps sentiment scores and rolling volatility to target USD exposure:
//! inverse-volatility weights, scaled by conviction, capped per asset,
//! long-only, with a permanent cash reserve.

use std::collections::HashMap;

use tracing::debug;

use crate::config::AllocatorConfig;

/// Substitute for missing, non-finite or non-positive volatility
pub const MISSING_VOLATILITY: f64 = 0.01;
/// Hard floor applied before inverting
pub const MIN_VOLATILITY: f64 = 0.001;

/// Stateless allocator: every call is a pure function of its inputs
#[derive(Debug, Clone)]
pub struct CapitalAllocator {
    max_position_pct: f64,
    reserve_pct: f64,
}

impl CapitalAllocator {
    pub fn new(config: &AllocatorConfig) -> Self {
        Self {
            max_position_pct: config.max_position_pct,
            reserve_pct: config.cash_reserve_pct,
        }
    }

    /// Largest USD target any single asset can receive at this equity
    pub fn position_limit_usd(&self, total_equity: f64) -> f64 {
        self.max_position_pct * total_equity * (1.0 - self.reserve_pct)
    }

    /// Compute asset -> target USD. Every asset present in `scores` appears in
    /// the result; inactive or non-long assets get exactly 0.0.
    pub fn allocate(
        &self,
        scores: &HashMap<String, f64>,
        volatilities: &HashMap<String, f64>,
        total_equity: f64,
    ) -> HashMap<String, f64> {
        let mut targets: HashMap<String, f64> =
            scores.keys().map(|asset| (asset.clone(), 0.0)).collect();

        if !(total_equity.is_finite() && total_equity > 0.0) {
            debug!(total_equity, "allocator: no deployable equity");
            return targets;
        }

        // W_i = (1/vol_i) / sum(1/vol_k) over active assets
        let inv_vols: HashMap<&str, f64> = scores
            .iter()
            .filter(|(_, score)| **score != 0.0 && score.is_finite())
            .map(|(asset, _)| {
                let vol = effective_volatility(volatilities.get(asset).copied());
                (asset.as_str(), 1.0 / vol)
            })
            .collect();

        if inv_vols.is_empty() {
            return targets;
        }

        let total_inv_vol: f64 = inv_vols.values().sum();
        let deployable = total_equity * (1.0 - self.reserve_pct);

        for (asset, inv_vol) in &inv_vols {
            let score = scores[*asset];
            let weight = inv_vol / total_inv_vol;

            let target_pct = (weight * score.abs()).min(self.max_position_pct);

            // The weighting supports shorts; execution is long-only.
            let direction = if score > 0.0 { 1.0 } else { 0.0 };

            let target_usd = target_pct * deployable * direction;
            debug!(
                asset = %asset,
                score,
                weight,
                target_pct,
                target_usd,
                "allocator: target computed"
            );
            targets.insert(asset.to_string(), target_usd);
        }

        targets
    }
}

impl Default for CapitalAllocator {
    fn default() -> Self {
        Self::new(&AllocatorConfig::default())
    }
}

/// Volatility as used for weighting: substituted when unusable, then floored
pub fn effective_volatility(vol: Option<f64>) -> f64 {
    let vol = match vol {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => MISSING_VOLATILITY,
    };
    vol.max(MIN_VOLATILITY)
}
