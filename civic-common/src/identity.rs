//! Identity/session provider
//!
//! Sessions come from a managed auth service (Supabase-style
//! `GET /auth/v1/user`). Services resolve the caller once per request and
//! pass the resulting [`Session`] explicitly into each operation.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Role, Session};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Identity provider error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The user behind `access_token`, `None` when the token is not a live session
    async fn current_user(&self, access_token: &str) -> Result<Option<Session>, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<UserMetadata>,
}

#[derive(Debug, Deserialize)]
struct UserMetadata {
    role: Option<String>,
}

/// HTTP identity provider
pub struct HttpIdentityProvider {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, IdentityError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn current_user(&self, access_token: &str) -> Result<Option<Session>, IdentityError> {
        let url = format!("{}/auth/v1/user", self.base_url.trim_end_matches('/'));

        let response = self
            .http_client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(IdentityError::ApiError(status.as_u16(), error_text));
        }

        let user: AuthUser = response
            .json()
            .await
            .map_err(|e| IdentityError::ParseError(e.to_string()))?;

        let role = user
            .user_metadata
            .and_then(|m| m.role)
            .and_then(|r| r.parse::<Role>().ok());

        match role {
            Some(role) => Ok(Some(Session {
                user_id: user.id,
                email: user.email,
                role,
            })),
            None => {
                tracing::warn!(user_id = %user.id, "Authenticated user has no recognised role");
                Ok(None)
            }
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
