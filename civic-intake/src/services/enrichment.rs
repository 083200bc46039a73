//! Text enrichment: summary, embedding and tags for a description
//!
//! All three outputs are required before a report may be stored. The calls
//! are issued concurrently; the first failure aborts the set.

use civic_common::generation::{GenerationError, TextGenerator};
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const TAG_MAX_TOKENS: u32 = 30;

static HASHTAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#[\w-]+").expect("hashtag pattern is valid"));

/// Enrichment outputs for one description
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub summary: String,
    pub embedding: Vec<f32>,
    /// May be empty
    pub tags: Vec<String>,
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Description is empty")]
    EmptyDescription,

    #[error("Summarization returned no summary")]
    MissingSummary,

    #[error("Embedding service returned no embedding")]
    EmptyEmbedding,

    #[error("Tag extraction returned no generation")]
    MissingTags,

    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: GenerationError,
    },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },
}

pub fn tag_prompt(description: &str) -> String {
    format!(
        "Extract relevant hashtags from this civic issue report:\n\"{}\"\nHashtags:",
        description
    )
}

/// Hashtag tokens in order of first appearance, without repeats
pub fn parse_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in HASHTAG_PATTERN.find_iter(text).map(|m| m.as_str()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Enrichment client over a [`TextGenerator`]
#[derive(Clone)]
pub struct EnrichmentClient {
    generator: Arc<dyn TextGenerator>,
    call_timeout: Duration,
}

impl EnrichmentClient {
    pub fn new(generator: Arc<dyn TextGenerator>, call_timeout: Duration) -> Self {
        Self {
            generator,
            call_timeout,
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, EnrichmentError>
    where
        F: Future<Output = Result<T, GenerationError>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(|source| EnrichmentError::Remote { operation, source }),
            Err(_) => Err(EnrichmentError::Timeout {
                operation,
                seconds: self.call_timeout.as_secs(),
            }),
        }
    }

    pub async fn summarize(&self, description: &str) -> Result<String, EnrichmentError> {
        if description.trim().is_empty() {
            return Err(EnrichmentError::EmptyDescription);
        }
        self.bounded("summarize", self.generator.summarize(description))
            .await?
            .ok_or(EnrichmentError::MissingSummary)
    }

    /// First vector of the response; an empty list or empty vector is a failure
    pub async fn embed(&self, description: &str) -> Result<Vec<f32>, EnrichmentError> {
        let vectors = self.bounded("embed", self.generator.embed(description)).await?;
        vectors
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(EnrichmentError::EmptyEmbedding)
    }

    /// Tags for `description`
    ///
    /// Generated text without hashtags yields an empty set; a generation
    /// without text is a failure.
    pub async fn extract_tags(&self, description: &str) -> Result<Vec<String>, EnrichmentError> {
        let prompt = tag_prompt(description);
        let text = self
            .bounded("extract_tags", self.generator.generate(&prompt, TAG_MAX_TOKENS))
            .await?
            .ok_or(EnrichmentError::MissingTags)?;
        Ok(parse_tags(&text))
    }

    pub async fn enrich(&self, description: &str) -> Result<Enrichment, EnrichmentError> {
        let (summary, embedding, tags) = tokio::try_join!(
            self.summarize(description),
            self.embed(description),
            self.extract_tags(description),
        )?;

        tracing::debug!(
            dimensions = embedding.len(),
            tag_count = tags.len(),
            "Description enriched"
        );

        Ok(Enrichment {
            summary,
            embedding,
            tags,
        })
    }
}
