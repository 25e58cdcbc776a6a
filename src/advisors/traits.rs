//! Advisor interface and payload normalization
//!
//! Advisors return a typed [`AdvisorSignal`]. Discretionary advisors hand back
//! whatever JSON the model produced; [`AdviceRecord::from_signal`] reduces
//! both shapes to the canonical record the arbiter consumes.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{AdviceRecord, AdvisorKind, Outlook};
use crate::error::AdvisorError;

/// Rationale used when a payload carries none
pub const NO_RATIONALE: &str = "No rationale";

/// Everything an advisor may look at for one asset on one tick
#[derive(Debug, Clone)]
pub struct AdvisoryRequest<'a> {
    pub run_id: &'a str,
    pub tick_id: u64,
    pub asset: &'a str,
    /// Sanitized price of the current bar
    pub price: f64,
    /// Closes up to and including the current bar
    pub history: &'a [f64],
}

/// Output of the deterministic indicator advisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantSignal {
    pub outlook: Outlook,
    pub confidence: f64,
    pub reasoning: String,
    pub rsi: Option<f64>,
}

/// Unstructured payload from a discretionary advisor
#[derive(Debug, Clone, PartialEq)]
pub struct DiscretionarySignal {
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvisorSignal {
    Quant(QuantSignal),
    Discretionary(DiscretionarySignal),
}

/// Result of consulting an advisor, as seen by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum AdvisorOutcome {
    Advised(AdviceRecord),
    Fallback { reason: String },
}

#[async_trait]
pub trait Advisor: Send + Sync {
    /// Identifier written into every advice record
    fn name(&self) -> &str;

    fn kind(&self) -> AdvisorKind;

    async fn advise(&self, request: &AdvisoryRequest<'_>) -> Result<AdvisorSignal, AdvisorError>;
}

impl AdviceRecord {
    /// Normalize an advisor signal. Missing or malformed fields default to
    /// NEUTRAL, 0.0 and [`NO_RATIONALE`].
    pub fn from_signal(request: &AdvisoryRequest<'_>, advisor: &str, signal: AdvisorSignal) -> Self {
        let (kind, outlook, confidence, rationale, raw) = match signal {
            AdvisorSignal::Quant(q) => {
                let raw = serde_json::json!({
                    "outlook": q.outlook,
                    "confidence": q.confidence,
                    "reasoning": q.reasoning,
                    "indicators": { "rsi": q.rsi },
                });
                (AdvisorKind::Quant, q.outlook, q.confidence, q.reasoning, raw)
            }
            AdvisorSignal::Discretionary(d) => {
                let outlook = d
                    .payload
                    .get("outlook")
                    .and_then(Value::as_str)
                    .and_then(Outlook::parse)
                    .unwrap_or(Outlook::Neutral);
                let confidence = d.payload.get("confidence").map(parse_confidence).unwrap_or(0.0);
                let rationale = ["reasoning", "rationale"]
                    .iter()
                    .find_map(|key| d.payload.get(*key).and_then(Value::as_str))
                    .unwrap_or(NO_RATIONALE)
                    .to_string();
                (AdvisorKind::Discretionary, outlook, confidence, rationale, d.payload)
            }
        };

        Self {
            run_id: request.run_id.to_string(),
            tick_id: request.tick_id,
            asset: request.asset.to_string(),
            advisor: advisor.to_string(),
            kind,
            outlook,
            confidence,
            rationale,
            raw,
            created_at: Utc::now(),
        }
    }
}

/// Accepts numbers and numeric strings; anything else (or non-finite) is 0.0
fn parse_confidence(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|c| c.is_finite()).unwrap_or(0.0)
}
