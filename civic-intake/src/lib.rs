//! civic-intake library interface
//!
//! Citizen-facing submission service. Exposes the router and pipeline for
//! integration testing.

pub mod api;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use civic_common::identity::IdentityProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::services::SubmissionPipeline;

/// Upper bound on one multipart submission (three photos plus text)
pub const MAX_SUBMISSION_BYTES: usize = 32 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SubmissionPipeline>,
    pub identity: Arc<dyn IdentityProvider>,
    /// Directory served under `/images`
    pub images_dir: PathBuf,
    pub startup_time: DateTime<Utc>,
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        pipeline: Arc<SubmissionPipeline>,
        identity: Arc<dyn IdentityProvider>,
        images_dir: PathBuf,
    ) -> Self {
        Self {
            pipeline,
            identity,
            images_dir,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let images = ServeDir::new(&state.images_dir);

    Router::new()
        .merge(api::issue_routes())
        .merge(api::health_routes())
        .nest_service("/images", images)
        .layer(DefaultBodyLimit::max(MAX_SUBMISSION_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
