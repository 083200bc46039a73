//! Per-request session resolution

use axum::http::{header::AUTHORIZATION, HeaderMap};
use civic_common::identity::{bearer_token, IdentityProvider};
use civic_common::models::Session;

use crate::error::{ApiError, ApiResult};

/// Resolve the caller from the `Authorization: Bearer` header
///
/// A missing header, a malformed header and a token the provider does not
/// recognise all yield `None`. Only a provider failure is an error.
pub async fn resolve_session(identity: &dyn IdentityProvider, headers: &HeaderMap) -> ApiResult<Option<Session>> {
    let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
    else {
        return Ok(None);
    };

    identity.current_user(token).await.map_err(|e| {
        tracing::error!(error = %e, "Identity provider unavailable");
        ApiError::BadGateway("Identity provider unavailable".to_string())
    })
}
