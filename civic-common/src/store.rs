//! Issue store interface
//!
//! The store is the only shared mutable resource. There is no transaction
//! around duplicate screening and insert: two concurrent submissions can
//! both pass screening before either is written.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{IssueRecord, IssueUpdate, NewIssue, StoredEmbedding};
use crate::Result;

#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Every record's embedding, absent where none was stored or it is unreadable
    async fn list_embeddings(&self) -> Result<Vec<StoredEmbedding>>;

    /// Persist a new record with a fresh id and server-assigned creation time
    async fn insert(&self, issue: NewIssue) -> Result<IssueRecord>;

    /// Apply a priority/category change. `Ok(false)` when the id is unknown.
    async fn update(&self, id: Uuid, update: IssueUpdate) -> Result<bool>;

    async fn get(&self, id: Uuid) -> Result<Option<IssueRecord>>;

    /// Records newest first
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<IssueRecord>>;

    async fn count(&self) -> Result<i64>;
}
