//! Advisory layer
//!
//! Two advisor families feed the arbiter:
//! - [`QuantAdvisor`]: deterministic RSI read, consulted every tick
//! - [`AnalystAdvisor`]: LLM analyst, consulted under a per-asset cooldown

pub mod analyst;
pub mod quant;
pub mod traits;

pub use analyst::AnalystAdvisor;
pub use quant::QuantAdvisor;
pub use traits::{
    Advisor, AdvisorOutcome, AdvisorSignal, AdvisoryRequest, DiscretionarySignal, QuantSignal,
    NO_RATIONALE,
};

use tracing::warn;

use crate::domain::AdviceRecord;

/// Ask one advisor for advice. Errors never propagate: they become
/// [`AdvisorOutcome::Fallback`] carrying the failure reason.
pub async fn consult(advisor: &dyn Advisor, request: &AdvisoryRequest<'_>) -> AdvisorOutcome {
    match advisor.advise(request).await {
        Ok(signal) => {
            AdvisorOutcome::Advised(AdviceRecord::from_signal(request, advisor.name(), signal))
        }
        Err(e) => {
            warn!(
                advisor = advisor.name(),
                asset = request.asset,
                tick_id = request.tick_id,
                error = %e,
                "advisor failed, substituting neutral advice"
            );
            AdvisorOutcome::Fallback {
                reason: e.to_string(),
            }
        }
    }
}

impl AdvisorOutcome {
    /// Collapse into a record; fallbacks become NEUTRAL / 0.0
    pub fn into_record(self, request: &AdvisoryRequest<'_>, advisor: &dyn Advisor) -> AdviceRecord {
        match self {
            AdvisorOutcome::Advised(record) => record,
            AdvisorOutcome::Fallback { reason } => AdviceRecord::neutral(
                request.run_id,
                request.tick_id,
                request.asset,
                advisor.name(),
                advisor.kind(),
                reason,
            ),
        }
    }
}
