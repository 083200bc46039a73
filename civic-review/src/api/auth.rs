//! Authority-only access for review endpoints
//!
//! Resolves the bearer session once and hands it to handlers through request
//! extensions. `/health` is mounted outside this middleware.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use civic_common::identity::bearer_token;
use civic_common::models::Role;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("User not authenticated.".to_string()))?;

    let session = state
        .identity
        .current_user(&token)
        .await
        .map_err(|e| {
            warn!(error = %e, "Identity provider unavailable");
            ApiError::BadGateway("Identity provider unavailable".to_string())
        })?
        .ok_or_else(|| ApiError::Unauthorized("User not authenticated.".to_string()))?;

    if session.role != Role::Authority {
        warn!(user_id = %session.user_id, role = session.role.as_str(), "Review access denied");
        return Err(ApiError::Forbidden(
            "Only authority users may review issues.".to_string(),
        ));
    }

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
