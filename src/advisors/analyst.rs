//! Discretionary LLM advisor over an OpenAI-compatible chat completions API
//!
//! Defaults target Groq's hosted `llama-3.1-8b-instant`. The model is asked
//! for a JSON object with `outlook`, `confidence` and `reasoning`; whatever it
//! returns is handed back untouched and normalized by the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::traits::{Advisor, AdvisorSignal, AdvisoryRequest, DiscretionarySignal};
use crate::config::LlmConfig;
use crate::domain::AdvisorKind;
use crate::error::{AdvisorError, NexusError, Result};

const SYSTEM_PROMPT: &str = "You are a senior macro analyst for a hedge fund. Output valid JSON.";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// LLM analyst client
pub struct AnalystAdvisor {
    config: LlmConfig,
    api_key: Option<String>,
    http: Client,
}

impl AnalystAdvisor {
    /// Create an analyst, reading the API key from `config.api_key_env`
    pub fn new(config: LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::build(config, api_key)
    }

    pub fn with_api_key(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        Self::build(config, Some(api_key.into()))
    }

    fn build(config: LlmConfig, api_key: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NexusError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            api_key,
            http,
        })
    }

    /// Check if an API key is available
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn prompt(asset: &str, price: f64) -> String {
        format!(
            r#"Analyze the current sentiment and outlook for {asset}.
Context: Price: {price}

Return JSON:
{{
    "outlook": "BULLISH" | "BEARISH" | "NEUTRAL",
    "confidence": <float 0.0 to 1.0>,
    "reasoning": "<brief institutional-grade rationale>"
}}"#
        )
    }

    async fn complete(&self, asset: &str, price: f64) -> std::result::Result<Value, AdvisorError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AdvisorError::NotConfigured(format!("{} is not set", self.config.api_key_env))
        })?;

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::prompt(asset, price),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(asset, model = %self.config.model, "analyst: requesting completion");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(asset, status, "analyst: API error");
            return Err(AdvisorError::Status { status, body });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        parse_completion(&body)
    }

    fn transport_error(&self, e: reqwest::Error) -> AdvisorError {
        if e.is_timeout() {
            AdvisorError::Timeout {
                elapsed_ms: self.config.timeout_secs * 1000,
            }
        } else {
            AdvisorError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl Advisor for AnalystAdvisor {
    fn name(&self) -> &str {
        "LLM_Analyst"
    }

    fn kind(&self) -> AdvisorKind {
        AdvisorKind::Discretionary
    }

    async fn advise(
        &self,
        request: &AdvisoryRequest<'_>,
    ) -> std::result::Result<AdvisorSignal, AdvisorError> {
        let payload = self.complete(request.asset, request.price).await?;
        Ok(AdvisorSignal::Discretionary(DiscretionarySignal { payload }))
    }
}

/// Extract the JSON object the model wrote into `choices[0].message.content`
pub fn parse_completion(body: &str) -> std::result::Result<Value, AdvisorError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AdvisorError::Parse(format!("Failed to parse completion: {}", e)))?;

    let content = response
        .choices
        .first()
        .map(|c| c.message.content.as_str())
        .ok_or_else(|| AdvisorError::Parse("Completion has no choices".to_string()))?;

    serde_json::from_str(content.trim())
        .map_err(|e| AdvisorError::Parse(format!("Model content is not JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn completion(content: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
        .to_string()
    }

    /// Serve a single canned HTTP response on localhost
    async fn serve_once(status: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    fn config(base_url: String) -> LlmConfig {
        LlmConfig {
            base_url,
            timeout_secs: 5,
            ..LlmConfig::default()
        }
    }

    fn request() -> AdvisoryRequest<'static> {
        AdvisoryRequest {
            run_id: "r",
            tick_id: 1,
            asset: "BTC-USD",
            price: 65_000.0,
            history: &[],
        }
    }

    #[test]
    fn parse_completion_extracts_content() {
        let body = completion(r#"{"outlook":"BULLISH","confidence":0.8,"reasoning":"ETF flows"}"#);
        let payload = parse_completion(&body).unwrap();
        assert_eq!(payload["outlook"], "BULLISH");
        assert_eq!(payload["confidence"], 0.8);
    }

    #[test]
    fn parse_completion_rejects_prose() {
        let body = completion("I think BTC will go up.");
        assert!(matches!(parse_completion(&body), Err(AdvisorError::Parse(_))));
        assert!(matches!(parse_completion("<html>"), Err(AdvisorError::Parse(_))));
        assert!(matches!(
            parse_completion(r#"{"choices": []}"#),
            Err(AdvisorError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let cfg = LlmConfig {
            api_key_env: "NEXUS_TEST_UNSET_ANALYST_KEY".to_string(),
            ..LlmConfig::default()
        };
        let analyst = AnalystAdvisor::new(cfg).unwrap();
        assert!(!analyst.is_configured());
        let err = analyst.advise(&request()).await.unwrap_err();
        assert!(matches!(err, AdvisorError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn advise_returns_model_payload() {
        let content = r#"{"outlook":"BEARISH","confidence":0.65,"reasoning":"risk-off"}"#;
        let url = serve_once("200 OK", completion(content)).await;
        let analyst = AnalystAdvisor::with_api_key(config(url), "test-key").unwrap();

        let signal = analyst.advise(&request()).await.unwrap();
        match signal {
            AdvisorSignal::Discretionary(d) => {
                assert_eq!(d.payload["outlook"], "BEARISH");
                assert_eq!(d.payload["reasoning"], "risk-off");
            }
            other => panic!("unexpected signal {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let url = serve_once("429 Too Many Requests", r#"{"error":"rate limited"}"#.to_string()).await;
        let analyst = AnalystAdvisor::with_api_key(config(url), "test-key").unwrap();

        let err = analyst.advise(&request()).await.unwrap_err();
        match err {
            AdvisorError::Status { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("rate limited"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
