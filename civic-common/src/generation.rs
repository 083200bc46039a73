//! Text generation / embedding service client
//!
//! Cohere-compatible HTTP API: `/v1/summarize`, `/v1/embed` and
//! `/v1/generate`. The trait returns the service's answers as-is
//! (a summary may be missing, the embedding list may be empty); callers
//! decide what counts as failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.cohere.ai";
pub const DEFAULT_SUMMARIZE_MODEL: &str = "summarize-xlarge";
pub const DEFAULT_EMBED_MODEL: &str = "embed-english-v3.0";
pub const DEFAULT_GENERATE_MODEL: &str = "command";
const USER_AGENT: &str = concat!("civic-services/", env!("CARGO_PKG_VERSION"));
const GENERATE_TEMPERATURE: f32 = 0.5;

/// Generation client errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid API key")]
    InvalidApiKey,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Summary of `text`, `None` when the service returned no summary
    async fn summarize(&self, text: &str) -> Result<Option<String>, GenerationError>;

    /// Embeddings for `text` (normally exactly one vector)
    async fn embed(&self, text: &str) -> Result<Vec<Vec<f32>>, GenerationError>;

    /// Free-text completion of `prompt`, trimmed (possibly empty)
    ///
    /// `None` when the generation carried no text. A response without any
    /// generation is a [`GenerationError::ParseError`].
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<Option<String>, GenerationError>;
}

/// Model and endpoint selection for [`CohereClient`]
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub base_url: String,
    pub api_key: String,
    pub summarize_model: String,
    pub embed_model: String,
    pub generate_model: String,
    pub timeout: Duration,
}

impl GenerationSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            summarize_model: DEFAULT_SUMMARIZE_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            generate_model: DEFAULT_GENERATE_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    text: &'a str,
    length: &'static str,
    format: &'static str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    summary: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: [&'a str; 1],
    model: &'a str,
    input_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    generations: Option<Vec<Generation>>,
}

#[derive(Debug, Deserialize)]
struct Generation {
    text: Option<String>,
}

/// HTTP client for a Cohere-compatible generation service
pub struct CohereClient {
    http_client: reqwest::Client,
    settings: GenerationSettings,
}

impl CohereClient {
    pub fn new(settings: GenerationSettings) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, GenerationError>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        tracing::debug!(endpoint = path, "Calling generation service");

        let response = self
            .http_client
            .post(self.endpoint(path))
            .bearer_auth(&self.settings.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GenerationError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::ApiError(status.as_u16(), error_text));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| GenerationError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl TextGenerator for CohereClient {
    async fn summarize(&self, text: &str) -> Result<Option<String>, GenerationError> {
        let request = SummarizeRequest {
            text,
            length: "medium",
            format: "paragraph",
            model: &self.settings.summarize_model,
        };
        let response: SummarizeResponse = self.post("summarize", &request).await?;
        Ok(response.summary.filter(|s| !s.trim().is_empty()))
    }

    async fn embed(&self, text: &str) -> Result<Vec<Vec<f32>>, GenerationError> {
        let request = EmbedRequest {
            texts: [text],
            model: &self.settings.embed_model,
            input_type: "search_document",
        };
        let response: EmbedResponse = self.post("embed", &request).await?;
        Ok(response.embeddings.unwrap_or_default())
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<Option<String>, GenerationError> {
        let request = GenerateRequest {
            model: &self.settings.generate_model,
            prompt,
            max_tokens,
            temperature: GENERATE_TEMPERATURE,
        };
        let response: GenerateResponse = self.post("generate", &request).await?;
        let generation = response
            .generations
            .and_then(|g| g.into_iter().next())
            .ok_or_else(|| GenerationError::ParseError("response carried no generations".to_string()))?;
        Ok(generation.text.map(|t| t.trim().to_string()))
    }
}
