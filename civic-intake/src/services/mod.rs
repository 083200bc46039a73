//! Issue submission services
//!
//! The pipeline stages live in their own modules; [`SubmissionPipeline`]
//! wires them together.

pub mod blob_store;
pub mod duplicate_index;
pub mod enrichment;
pub mod notifier;
pub mod submission;
pub mod validator;

pub use blob_store::{BlobError, BlobStore, ImageUpload, LocalBlobStore};
pub use duplicate_index::{
    DuplicateCheckError, DuplicateIndex, DuplicateResult, DuplicateScreener, DUPLICATE_THRESHOLD,
};
pub use enrichment::{Enrichment, EnrichmentClient, EnrichmentError};
pub use notifier::{HttpNotifier, LogNotifier, NotificationError, Notifier};
pub use submission::{PipelineSettings, SubmissionError, SubmissionPipeline};
pub use validator::{
    IssueForm, ValidatedIssue, ValidationError, Validator, MAX_IMAGES, MIN_DESCRIPTION_CHARS,
};
