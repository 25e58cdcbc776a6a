//! Deterministic RSI mean-reversion advisor

use async_trait::async_trait;

use super::traits::{Advisor, AdvisorSignal, AdvisoryRequest, QuantSignal};
use crate::config::AdvisorConfig;
use crate::domain::{is_valid_price, AdvisorKind, Outlook};
use crate::error::AdvisorError;

const OVERSOLD: f64 = 35.0;
const OVERBOUGHT: f64 = 65.0;
const BASE_CONFIDENCE: f64 = 0.5;

pub struct QuantAdvisor {
    rsi_period: usize,
    min_history: usize,
}

impl QuantAdvisor {
    pub fn new(rsi_period: usize, min_history: usize) -> Self {
        Self {
            rsi_period,
            min_history,
        }
    }

    pub fn from_config(config: &AdvisorConfig) -> Self {
        Self::new(config.rsi_period, config.quant_min_history)
    }

    /// Mean-reversion read of a price series
    pub fn evaluate(&self, closes: &[f64]) -> QuantSignal {
        let closes: Vec<f64> = closes.iter().copied().filter(|p| is_valid_price(*p)).collect();

        let rsi = if closes.len() < self.min_history {
            None
        } else {
            rsi(&closes, self.rsi_period)
        };

        let Some(rsi) = rsi else {
            return QuantSignal {
                outlook: Outlook::Neutral,
                confidence: 0.0,
                reasoning: "Insufficient history".to_string(),
                rsi: None,
            };
        };

        let (outlook, confidence, reasoning) = if rsi < OVERSOLD {
            (
                Outlook::Bullish,
                (OVERSOLD - rsi) / OVERSOLD + BASE_CONFIDENCE,
                format!("RSI oversold ({rsi:.1})"),
            )
        } else if rsi > OVERBOUGHT {
            (
                Outlook::Bearish,
                (rsi - OVERBOUGHT) / OVERSOLD + BASE_CONFIDENCE,
                format!("RSI overbought ({rsi:.1})"),
            )
        } else {
            (
                Outlook::Neutral,
                BASE_CONFIDENCE,
                "RSI is in neutral territory.".to_string(),
            )
        };

        QuantSignal {
            outlook,
            confidence: confidence.min(1.0),
            reasoning,
            rsi: Some(rsi),
        }
    }
}

impl Default for QuantAdvisor {
    fn default() -> Self {
        Self::from_config(&AdvisorConfig::default())
    }
}

#[async_trait]
impl Advisor for QuantAdvisor {
    fn name(&self) -> &str {
        "Quant"
    }

    fn kind(&self) -> AdvisorKind {
        AdvisorKind::Quant
    }

    async fn advise(&self, request: &AdvisoryRequest<'_>) -> Result<AdvisorSignal, AdvisorError> {
        Ok(AdvisorSignal::Quant(self.evaluate(request.history)))
    }
}

/// Latest RSI value with Wilder smoothing (SMA seed over the first `period`
/// changes). `None` when there are not more than `period` prices.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }

    let changes: Vec<(f64, f64)> = closes
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .collect();

    let n = period as f64;
    let mut avg_gain = changes[..period].iter().map(|c| c.0).sum::<f64>() / n;
    let mut avg_loss = changes[..period].iter().map(|c| c.1).sum::<f64>() / n;

    for (gain, loss) in &changes[period..] {
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;
    }

    Some(if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    })
}
