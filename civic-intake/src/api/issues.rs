//! Issue submission API handler
//!
//! POST /api/issues (multipart form)

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use civic_common::models::IssueRecord;
use serde::Serialize;

use crate::{
    api::session::resolve_session,
    error::{ApiError, ApiResult},
    services::{ImageUpload, IssueForm},
    AppState,
};

pub const SUBMITTED_MESSAGE: &str = "Issue submitted successfully.";

/// Form field carrying image files (may repeat)
const IMAGE_FIELDS: [&str; 2] = ["images", "images[]"];

/// POST /api/issues response
#[derive(Debug, Serialize)]
pub struct SubmitIssueResponse {
    pub message: String,
    pub issue: IssueRecord,
}

/// POST /api/issues
///
/// Returns 201 with the stored report, or the error envelope.
pub async fn submit_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SubmitIssueResponse>)> {
    let session = resolve_session(state.identity.as_ref(), &headers).await?;
    let (form, images) = read_submission(multipart).await?;

    match state.pipeline.submit(session.as_ref(), &form, images).await {
        Ok(issue) => Ok((
            StatusCode::CREATED,
            Json(SubmitIssueResponse {
                message: SUBMITTED_MESSAGE.to_string(),
                issue,
            }),
        )),
        Err(e) => {
            let message = e.to_string();
            let error = ApiError::from(e);
            if error.is_service_failure() {
                *state.last_error.write().await = Some(message);
            }
            Err(error)
        }
    }
}

/// Collect text fields and image parts from the multipart body
///
/// Unknown fields are ignored. File inputs left empty by the browser arrive
/// as nameless zero-length parts and are skipped.
pub async fn read_submission(mut multipart: Multipart) -> ApiResult<(IssueForm, Vec<ImageUpload>)> {
    let mut form = IssueForm::default();
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if IMAGE_FIELDS.contains(&name.as_str()) {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Read image failed: {}", e)))?;
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            images.push(ImageUpload {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        match name.as_str() {
            "name" => form.name = text(field).await?,
            "phone" => form.phone = text(field).await?,
            "address" => form.address = text(field).await?,
            "title" => form.title = text(field).await?,
            "description" => form.description = text(field).await?,
            "category" => form.category = text(field).await?,
            "custom_category" => form.custom_category = Some(text(field).await?),
            "priority" => form.priority = text(field).await?,
            "location_url" => form.location_url = Some(text(field).await?),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok((form, images))
}

async fn text(field: Field<'_>) -> ApiResult<String> {
    let name = field.name().unwrap_or_default().to_string();
    field.text().await.map_err(|e| ApiError::BadRequest {
        message: format!("Read field failed: {}", e),
        field: Some(name),
    })
}

pub fn issue_routes() -> Router<AppState> {
    Router::new().route("/api/issues", post(submit_issue))
}
