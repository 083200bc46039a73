//! AI assistance for authority review: summaries and suggested replies

use civic_common::generation::{GenerationError, TextGenerator};
use std::time::Duration;
use thiserror::Error;

/// Shortest text a reply is generated from
pub const MIN_REPLY_INPUT_CHARS: usize = 10;
pub const NO_RESPONSE: &str = "No response generated.";
const REPLY_MAX_TOKENS: u32 = 100;

#[derive(Debug, Error)]
pub enum AssistError {
    #[error("Text must be at least {MIN_REPLY_INPUT_CHARS} characters to generate a reply")]
    InputTooShort,

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Generation timed out after {0}s")]
    Timeout(u64),
}

pub fn reply_prompt(summary: &str) -> String {
    format!(
        "You are a municipal officer. Write a polite and informative response to the citizen about the following issue:\n\n\"{}\"\n\nReply:",
        summary
    )
}

/// Suggested officer reply for an issue summary
///
/// An empty generation yields [`NO_RESPONSE`] rather than an error.
pub async fn suggest_reply(
    generator: &dyn TextGenerator,
    summary: &str,
    timeout: Duration,
) -> Result<String, AssistError> {
    let summary = summary.trim();
    if summary.chars().count() < MIN_REPLY_INPUT_CHARS {
        return Err(AssistError::InputTooShort);
    }

    let prompt = reply_prompt(summary);
    let generated = tokio::time::timeout(timeout, generator.generate(&prompt, REPLY_MAX_TOKENS))
        .await
        .map_err(|_| AssistError::Timeout(timeout.as_secs()))??;

    Ok(generated
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| NO_RESPONSE.to_string()))
}

/// Summary shown to reviewers: the stored one, or a fresh one when none was stored
pub async fn review_summary(
    generator: &dyn TextGenerator,
    stored: &str,
    description: &str,
    timeout: Duration,
) -> Result<Option<String>, AssistError> {
    if !stored.trim().is_empty() {
        return Ok(Some(stored.to_string()));
    }
    if description.trim().is_empty() {
        return Ok(None);
    }

    let summary = tokio::time::timeout(timeout, generator.summarize(description))
        .await
        .map_err(|_| AssistError::Timeout(timeout.as_secs()))??;
    Ok(summary)
}
