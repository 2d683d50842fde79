//! Natural-language commentary for the dashboard views.
//!
//! Narrative text is decoration: any failure (no key, network error, timeout,
//! empty reply) turns into [`PLACEHOLDER`] and never fails the request.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::NarrativeConfig;

pub const PLACEHOLDER: &str = "AI analysis unavailable";

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("narrative generation is disabled")]
    Disabled,
    #[error("narrative request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("narrative API returned {0}")]
    Status(u16),
    #[error("narrative request exceeded its timeout")]
    Timeout,
    #[error("narrative API returned no text")]
    Empty,
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Produce commentary for `prompt` given the serialized report `data`.
    async fn generate(&self, prompt: &str, data: &Value) -> Result<String, NarrativeError>;
}

pub async fn narrate_or_placeholder(generator: &dyn NarrativeGenerator, prompt: &str, data: &Value) -> String {
    match generator.generate(prompt, data).await {
        Ok(text) => text,
        Err(NarrativeError::Disabled) => PLACEHOLDER.to_string(),
        Err(e) => {
            warn!("Narrative generation failed: {}", e);
            PLACEHOLDER.to_string()
        }
    }
}

/// Used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNarrator;

#[async_trait]
impl NarrativeGenerator for DisabledNarrator {
    async fn generate(&self, _prompt: &str, _data: &Value) -> Result<String, NarrativeError> {
        Err(NarrativeError::Disabled)
    }
}

// ============================================================================
// Gemini
// ============================================================================

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiNarrator {
    api_key: String,
    config: NarrativeConfig,
    http: Client,
}

impl GeminiNarrator {
    pub fn new(api_key: impl Into<String>, config: NarrativeConfig) -> Result<Self, NarrativeError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            api_key: api_key.into(),
            config,
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.config.base_url, self.config.model)
    }

    fn request_body(prompt: &str, data: &Value) -> Value {
        json!({
            "contents": [{
                "parts": [{ "text": format!("{}\n\nData: {}", prompt, data) }]
            }],
            "generationConfig": {
                "temperature": 0.7,
                "maxOutputTokens": 500
            }
        })
    }
}

#[async_trait]
impl NarrativeGenerator for GeminiNarrator {
    async fn generate(&self, prompt: &str, data: &Value) -> Result<String, NarrativeError> {
        let request = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(prompt, data))
            .send();

        let response = tokio::time::timeout(self.config.timeout, request)
            .await
            .map_err(|_| NarrativeError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            return Err(NarrativeError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .find(|t| !t.trim().is_empty())
            .ok_or(NarrativeError::Empty)?;

        debug!("Narrative received ({} chars)", text.len());
        Ok(text)
    }
}
