//! Issue review handlers
//!
//! GET /api/issues, GET /api/issues/:id, PATCH /api/issues/:id,
//! POST /api/issues/:id/reply

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use civic_common::models::{Category, IssueRecord, IssueUpdate, Priority, Session};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::location::{parse_coordinates, Coordinates};
use crate::pagination::calculate_pagination;
use crate::reply::{review_summary, suggest_reply};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

/// Issue with its map position, when the link carries one
#[derive(Debug, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: IssueRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_embed_url: Option<String>,
}

impl From<IssueRecord> for IssueView {
    fn from(issue: IssueRecord) -> Self {
        let coordinates = issue.location_url.as_deref().and_then(parse_coordinates);
        Self {
            map_embed_url: coordinates.as_ref().map(Coordinates::map_embed_url),
            coordinates,
            issue,
        }
    }
}

/// GET /api/issues response
#[derive(Debug, Serialize)]
pub struct IssueListResponse {
    pub page: i64,
    pub total_pages: i64,
    pub page_size: i64,
    pub total: i64,
    pub issues: Vec<IssueView>,
}

/// GET /api/issues/:id response
#[derive(Debug, Serialize)]
pub struct IssueDetailResponse {
    pub issue: IssueView,
    /// Absent when no summary is stored and summarization failed
    pub ai_summary: Option<String>,
    /// Absent when reply generation failed
    pub suggested_reply: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateIssueRequest {
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Effective category when `category` is `other`
    #[serde(default)]
    pub custom_category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub issue_id: Uuid,
    pub reply: String,
}

/// GET /api/issues?page=N
///
/// Newest first.
pub async fn list_issues(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<IssueListResponse>> {
    let total = state.store.count().await?;
    let pagination = calculate_pagination(total, query.page, state.page_size);
    let issues = state.store.list(pagination.page_size, pagination.offset).await?;

    Ok(Json(IssueListResponse {
        page: pagination.page,
        total_pages: pagination.total_pages,
        page_size: pagination.page_size,
        total,
        issues: issues.into_iter().map(IssueView::from).collect(),
    }))
}

async fn load_issue(state: &AppState, id: Uuid) -> ApiResult<IssueRecord> {
    state
        .store
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Issue {} not found", id)))
}

/// GET /api/issues/:id
///
/// AI failures are logged and leave the corresponding field empty.
pub async fn get_issue(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<IssueDetailResponse>> {
    let issue = load_issue(&state, id).await?;

    let ai_summary = match review_summary(
        state.generator.as_ref(),
        &issue.summary,
        &issue.description,
        state.call_timeout,
    )
    .await
    {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(issue_id = %id, error = %e, "Summary unavailable");
            None
        }
    };

    let reply_input = ai_summary.as_deref().unwrap_or(&issue.description);
    let suggested_reply = match suggest_reply(state.generator.as_ref(), reply_input, state.call_timeout).await {
        Ok(reply) => Some(reply),
        Err(e) => {
            tracing::warn!(issue_id = %id, error = %e, "Suggested reply unavailable");
            None
        }
    };

    tracing::debug!(issue_id = %id, reviewer = %session.user_id, "Issue detail served");

    Ok(Json(IssueDetailResponse {
        issue: issue.into(),
        ai_summary,
        suggested_reply,
    }))
}

/// PATCH /api/issues/:id
///
/// Only priority and category can change after submission.
pub async fn update_issue(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateIssueRequest>,
) -> ApiResult<Json<IssueView>> {
    let update = parse_update(&request)?;
    if update.is_empty() {
        return Err(ApiError::bad_request("Provide priority and/or category to update"));
    }

    if !state.store.update(id, update.clone()).await? {
        return Err(ApiError::NotFound(format!("Issue {} not found", id)));
    }

    tracing::info!(
        issue_id = %id,
        reviewer = %session.user_id,
        priority = ?update.priority,
        category = ?update.category,
        "Issue updated"
    );

    Ok(Json(load_issue(&state, id).await?.into()))
}

fn parse_update(request: &UpdateIssueRequest) -> ApiResult<IssueUpdate> {
    let priority = request
        .priority
        .as_deref()
        .map(|p| p.parse::<Priority>())
        .transpose()
        .map_err(|message| ApiError::invalid_field("priority", message))?;

    let category = request
        .category
        .as_deref()
        .map(|selection| Category::resolve(selection, request.custom_category.as_deref()))
        .transpose()
        .map_err(|message| ApiError::invalid_field("category", message))?;

    Ok(IssueUpdate { priority, category })
}

/// POST /api/issues/:id/reply
///
/// Generates from the stored summary, falling back to the description.
pub async fn reply_to_issue(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReplyResponse>> {
    let issue = load_issue(&state, id).await?;
    let input = if issue.summary.trim().is_empty() {
        &issue.description
    } else {
        &issue.summary
    };

    let reply = suggest_reply(state.generator.as_ref(), input, state.call_timeout).await?;
    Ok(Json(ReplyResponse { issue_id: id, reply }))
}
