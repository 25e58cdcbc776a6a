use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Directional view carried by a piece of advice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outlook {
    Bullish,
    Bearish,
    Neutral,
}

impl Outlook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outlook::Bullish => "BULLISH",
            Outlook::Bearish => "BEARISH",
            Outlook::Neutral => "NEUTRAL",
        }
    }

    /// +1 for bullish, -1 for bearish, 0 otherwise
    pub fn direction(&self) -> f64 {
        match self {
            Outlook::Bullish => 1.0,
            Outlook::Bearish => -1.0,
            Outlook::Neutral => 0.0,
        }
    }

    /// Lenient parse used on advisor payloads; unknown values are `None`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BULLISH" => Some(Outlook::Bullish),
            "BEARISH" => Some(Outlook::Bearish),
            "NEUTRAL" => Some(Outlook::Neutral),
            _ => None,
        }
    }
}

impl std::fmt::Display for Outlook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which family of advisor produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorKind {
    /// Deterministic indicator-based advisor, called every tick
    Quant,
    /// Discretionary (LLM) advisor, rate-limited by cooldown
    Discretionary,
}

impl AdvisorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvisorKind::Quant => "quant",
            AdvisorKind::Discretionary => "discretionary",
        }
    }
}

/// Canonical advice record consumed by the arbiter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceRecord {
    pub run_id: String,
    pub tick_id: u64,
    pub asset: String,
    pub advisor: String,
    pub kind: AdvisorKind,
    pub outlook: Outlook,
    /// Conventionally 0.0-1.0, not clamped
    pub confidence: f64,
    pub rationale: String,
    /// Original advisor payload, kept for audit
    pub raw: Value,
    pub created_at: DateTime<Utc>,
}

impl AdviceRecord {
    /// Neutral, zero-confidence record used whenever an advisor cannot answer
    pub fn neutral(
        run_id: &str,
        tick_id: u64,
        asset: &str,
        advisor: &str,
        kind: AdvisorKind,
        rationale: impl Into<String>,
    ) -> Self {
        let rationale = rationale.into();
        Self {
            run_id: run_id.to_string(),
            tick_id,
            asset: asset.to_string(),
            advisor: advisor.to_string(),
            kind,
            outlook: Outlook::Neutral,
            confidence: 0.0,
            raw: serde_json::json!({
                "outlook": "NEUTRAL",
                "confidence": 0.0,
                "reasoning": rationale,
            }),
            rationale,
            created_at: Utc::now(),
        }
    }

    /// Signed magnitude: +confidence, -confidence or 0
    pub fn signed_confidence(&self) -> f64 {
        self.outlook.direction() * self.confidence
    }
}
