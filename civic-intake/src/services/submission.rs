//! Issue submission pipeline
//!
//! validate → upload images → enrich → duplicate screen → insert → notify
//!
//! Every stage before the insert can abort the submission. Only the duplicate
//! population fetch and the confirmation notification are allowed to fail
//! without failing the submission. The confirmation runs on its own task
//! after the record is returned. Screening and insert are not atomic, so
//! two near-identical reports submitted at the same moment may both be stored.

use civic_common::generation::TextGenerator;
use civic_common::models::{IssueRecord, NewIssue, Role, Session, SENTIMENT_PLACEHOLDER};
use civic_common::IssueStore;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::blob_store::{upload_path, BlobError, BlobStore, ImageUpload};
use super::duplicate_index::{DuplicateResult, DuplicateScreener};
use super::enrichment::{EnrichmentClient, EnrichmentError};
use super::notifier::Notifier;
use super::validator::{IssueForm, ValidationError, Validator};

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("Role {0:?} may not submit issues")]
    Forbidden(Role),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// `orphaned` lists images that were stored before the failure
    #[error("Image upload failed: {message}")]
    Upload { message: String, orphaned: Vec<String> },

    #[error("Enrichment failed: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("Likely duplicate of issue {issue_id} (similarity {similarity:.3})")]
    Duplicate { issue_id: Uuid, similarity: f64 },

    #[error("Storage failed: {0}")]
    Storage(String),
}

/// Tunables for [`SubmissionPipeline`]
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Upper bound on each external call
    pub call_timeout: Duration,
    pub notification_template: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            notification_template: "issue_submitted".to_string(),
        }
    }
}

pub struct SubmissionPipeline {
    validator: Validator,
    blob_store: Arc<dyn BlobStore>,
    enrichment: EnrichmentClient,
    screener: DuplicateScreener,
    store: Arc<dyn IssueStore>,
    notifier: Arc<dyn Notifier>,
    settings: PipelineSettings,
}

impl SubmissionPipeline {
    pub fn new(
        store: Arc<dyn IssueStore>,
        generator: Arc<dyn TextGenerator>,
        blob_store: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            validator: Validator,
            blob_store,
            enrichment: EnrichmentClient::new(generator, settings.call_timeout),
            screener: DuplicateScreener::new(Arc::clone(&store), settings.call_timeout),
            store,
            notifier,
            settings,
        }
    }

    /// Only citizens submit reports
    pub fn authorize(session: Option<&Session>) -> Result<&Session, SubmissionError> {
        match session {
            None => Err(SubmissionError::NotAuthenticated),
            Some(session) if session.role != Role::Citizen => Err(SubmissionError::Forbidden(session.role)),
            Some(session) => Ok(session),
        }
    }

    /// Run one submission to completion
    pub async fn submit(
        &self,
        session: Option<&Session>,
        form: &IssueForm,
        images: Vec<ImageUpload>,
    ) -> Result<IssueRecord, SubmissionError> {
        let session = Self::authorize(session)?;
        let issue = self.validator.validate(form, images.len())?;

        let image_urls = self.upload_images(&session.user_id, &images).await?;

        let enrichment = self.enrichment.enrich(&issue.description).await.map_err(|e| {
            tracing::error!(citizen_id = %session.user_id, error = %e, "Enrichment failed");
            if !image_urls.is_empty() {
                tracing::warn!(orphaned = ?image_urls, "Uploaded images left without a report");
            }
            e
        })?;

        if let DuplicateResult::Duplicate { issue_id, similarity } =
            self.screener.screen(&enrichment.embedding).await
        {
            tracing::info!(
                citizen_id = %session.user_id,
                duplicate_of = %issue_id,
                similarity,
                "Submission blocked as likely duplicate"
            );
            return Err(SubmissionError::Duplicate { issue_id, similarity });
        }

        let new_issue = NewIssue {
            name: issue.name,
            phone: issue.phone,
            address: issue.address,
            title: issue.title,
            description: issue.description,
            category: issue.category,
            priority: issue.priority,
            location_url: issue.location_url,
            images: image_urls,
            citizen_id: session.user_id.clone(),
            summary: enrichment.summary,
            embedding: enrichment.embedding,
            tags: enrichment.tags,
            sentiment: SENTIMENT_PLACEHOLDER.to_string(),
        };

        let record = match tokio::time::timeout(self.settings.call_timeout, self.store.insert(new_issue)).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => return Err(SubmissionError::Storage(e.to_string())),
            Err(_) => {
                return Err(SubmissionError::Storage(format!(
                    "insert timed out after {}s",
                    self.settings.call_timeout.as_secs()
                )))
            }
        };

        tracing::info!(
            issue_id = %record.id,
            citizen_id = %record.citizen_id,
            category = %record.category,
            images = record.images.len(),
            "Issue submitted"
        );

        self.notify(session, &record);
        Ok(record)
    }

    /// Upload all images concurrently; any failure fails the set
    async fn upload_images(&self, citizen_id: &str, images: &[ImageUpload]) -> Result<Vec<String>, SubmissionError> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let unix_millis = chrono::Utc::now().timestamp_millis();
        let uploads = images.iter().enumerate().map(|(index, image)| {
            let path = upload_path(citizen_id, unix_millis, index, &image.file_name);
            async move {
                match tokio::time::timeout(
                    self.settings.call_timeout,
                    self.blob_store
                        .upload(&path, &image.bytes, image.content_type.as_deref()),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(BlobError::Timeout(self.settings.call_timeout.as_secs())),
                }
            }
        });

        let mut urls = Vec::with_capacity(images.len());
        let mut failures = Vec::new();
        for result in join_all(uploads).await {
            match result {
                Ok(url) => urls.push(url),
                Err(e) => failures.push(e.to_string()),
            }
        }

        if failures.is_empty() {
            return Ok(urls);
        }

        tracing::error!(citizen_id, failures = ?failures, "Image upload failed");
        if !urls.is_empty() {
            tracing::warn!(orphaned = ?urls, "Uploaded images left without a report");
        }
        Err(SubmissionError::Upload {
            message: failures.join("; "),
            orphaned: urls,
        })
    }

    /// Send the confirmation in the background; failures are only logged
    fn notify(&self, session: &Session, record: &IssueRecord) {
        let Some(recipient) = session.email.clone() else {
            tracing::debug!(issue_id = %record.id, "No recipient address; confirmation skipped");
            return;
        };

        let variables = json!({
            "issue_id": record.id,
            "name": record.name,
            "title": record.title,
            "category": record.category,
            "priority": record.priority,
        });

        let notifier = Arc::clone(&self.notifier);
        let template_id = self.settings.notification_template.clone();
        let call_timeout = self.settings.call_timeout;
        let issue_id = record.id;

        tokio::spawn(async move {
            let send = notifier.send(&template_id, &variables, &recipient);
            match tokio::time::timeout(call_timeout, send).await {
                Ok(Ok(())) => tracing::debug!(issue_id = %issue_id, "Confirmation sent"),
                Ok(Err(e)) => tracing::warn!(issue_id = %issue_id, error = %e, "Confirmation notification failed"),
                Err(_) => tracing::warn!(issue_id = %issue_id, "Confirmation notification timed out"),
            }
        });
    }
}
