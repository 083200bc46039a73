//! Submission confirmation notifications
//!
//! Delivery is best-effort: callers log a [`NotificationError`] and move on.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Notification service error {0}: {1}")]
    ApiError(u16, String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, template_id: &str, variables: &Value, recipient: &str) -> Result<(), NotificationError>;
}

#[derive(Debug, Serialize)]
struct NotificationRequest<'a> {
    template_id: &'a str,
    recipient: &'a str,
    variables: &'a Value,
}

/// JSON-over-HTTP notification client
pub struct HttpNotifier {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, template_id: &str, variables: &Value, recipient: &str) -> Result<(), NotificationError> {
        let request = NotificationRequest {
            template_id,
            recipient,
            variables,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotificationError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotificationError::ApiError(status.as_u16(), error_text));
        }
        Ok(())
    }
}

/// Used when no notification endpoint is configured
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, template_id: &str, _variables: &Value, recipient: &str) -> Result<(), NotificationError> {
        tracing::info!(template_id, recipient, "Notification endpoint not configured; skipping delivery");
        Ok(())
    }
}
