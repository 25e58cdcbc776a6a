use thiserror::Error;

/// Main error type for the simulator
#[derive(Error, Debug)]
pub enum NexusError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Market data errors
    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for NexusError
pub type Result<T> = std::result::Result<T, NexusError>;

/// Errors raised at the advisor boundary.
///
/// These never reach the arbiter: the engine converts every one of them into
/// a neutral, zero-confidence advice record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvisorError {
    #[error("Advisor not configured: {0}")]
    NotConfigured(String),

    #[error("Advisor request failed: {0}")]
    Request(String),

    #[error("Advisor returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Advisor response unparsable: {0}")]
    Parse(String),

    #[error("Advisor timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_lists_every_problem() {
        let err = NexusError::InvalidConfig(vec![
            "smoothing_factor must be in (0, 1]".to_string(),
            "initial_capital must be positive".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("smoothing_factor"));
        assert!(msg.contains("initial_capital"));
    }

    #[test]
    fn advisor_status_display() {
        let err = AdvisorError::Status {
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "Advisor returned 429: rate limited");
    }
}
