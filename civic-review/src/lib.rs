//! civic-review library - authority review service
//!
//! Dashboard listing, issue detail with AI assistance, and priority /
//! category assignment. Every route except `/health` requires an authority
//! session.

use axum::Router;
use chrono::{DateTime, Utc};
use civic_common::generation::TextGenerator;
use civic_common::identity::IdentityProvider;
use civic_common::IssueStore;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod location;
pub mod pagination;
pub mod reply;

pub use crate::error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn IssueStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub generator: Arc<dyn TextGenerator>,
    pub page_size: i64,
    /// Upper bound on each generation call
    pub call_timeout: Duration,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn IssueStore>,
        identity: Arc<dyn IdentityProvider>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            store,
            identity,
            generator,
            page_size: pagination::DEFAULT_PAGE_SIZE,
            call_timeout: Duration::from_secs(30),
            startup_time: Utc::now(),
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Authority session required
    let protected = Router::new()
        .route("/api/issues", get(api::list_issues))
        .route("/api/issues/:id", get(api::get_issue).patch(api::update_issue))
        .route("/api/issues/:id/reply", post(api::reply_to_issue))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
