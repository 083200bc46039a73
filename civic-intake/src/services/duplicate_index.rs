//! Duplicate screening against stored embeddings
//!
//! Linear scan over every stored report. Cost grows with the store; there is
//! no approximate index.

use civic_common::models::StoredEmbedding;
use civic_common::similarity::cosine_similarity;
use civic_common::IssueStore;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Similarity above which two reports describe the same issue
pub const DUPLICATE_THRESHOLD: f64 = 0.9;

/// Duplicate screening result
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateResult {
    /// No stored report is similar enough
    Unique,
    /// First stored report found above the threshold
    Duplicate { issue_id: Uuid, similarity: f64 },
}

impl DuplicateResult {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DuplicateResult::Duplicate { .. })
    }
}

/// Candidate population with the comparison policy
///
/// A candidate is a duplicate when its similarity is strictly greater than
/// the threshold. Absent embeddings are skipped; zero-magnitude and
/// mismatched-dimension candidates score 0.
pub struct DuplicateIndex {
    threshold: f64,
    population: Vec<StoredEmbedding>,
}

impl DuplicateIndex {
    pub fn new(threshold: f64, population: Vec<StoredEmbedding>) -> Self {
        Self {
            threshold,
            population,
        }
    }

    pub fn len(&self) -> usize {
        self.population.len()
    }

    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }

    pub fn check(&self, embedding: &[f32]) -> DuplicateResult {
        for candidate in &self.population {
            let Some(stored) = candidate.embedding.as_deref() else {
                continue;
            };
            let similarity = cosine_similarity(embedding, stored);
            if similarity > self.threshold {
                return DuplicateResult::Duplicate {
                    issue_id: candidate.issue_id,
                    similarity,
                };
            }
        }
        DuplicateResult::Unique
    }
}

#[derive(Debug, Error)]
pub enum DuplicateCheckError {
    #[error("Fetch stored embeddings failed: {0}")]
    Fetch(#[from] civic_common::Error),

    #[error("Fetch stored embeddings timed out after {0}s")]
    Timeout(u64),
}

/// Loads the population and runs the check
///
/// A failed fetch is logged and reported as [`DuplicateResult::Unique`].
pub struct DuplicateScreener {
    store: Arc<dyn IssueStore>,
    call_timeout: Duration,
}

impl DuplicateScreener {
    pub fn new(store: Arc<dyn IssueStore>, call_timeout: Duration) -> Self {
        Self { store, call_timeout }
    }

    pub async fn load_index(&self) -> Result<DuplicateIndex, DuplicateCheckError> {
        let population = tokio::time::timeout(self.call_timeout, self.store.list_embeddings())
            .await
            .map_err(|_| DuplicateCheckError::Timeout(self.call_timeout.as_secs()))??;
        Ok(DuplicateIndex::new(DUPLICATE_THRESHOLD, population))
    }

    pub async fn screen(&self, embedding: &[f32]) -> DuplicateResult {
        match self.load_index().await {
            Ok(index) => {
                let result = index.check(embedding);
                tracing::debug!(
                    candidates = index.len(),
                    duplicate = result.is_duplicate(),
                    "Duplicate screening complete"
                );
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "Duplicate check skipped");
                DuplicateResult::Unique
            }
        }
    }
}
