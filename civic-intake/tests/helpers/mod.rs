//! Test helpers for civic-intake
//!
//! In-memory fakes for every pipeline collaborator, with call counters so
//! tests can assert which stages ran.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use civic_common::generation::{GenerationError, TextGenerator};
use civic_common::identity::{IdentityError, IdentityProvider};
use civic_common::models::{
    IssueRecord, IssueUpdate, NewIssue, Role, Session, StoredEmbedding,
};
use civic_common::{Error, IssueStore, Result};
use civic_intake::services::{
    BlobError, BlobStore, IssueForm, NotificationError, Notifier, PipelineSettings, SubmissionPipeline,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const EMBEDDING_DIMENSIONS: usize = 8;

pub fn citizen() -> Session {
    Session {
        user_id: "citizen-1".to_string(),
        email: Some("asha@example.org".to_string()),
        role: Role::Citizen,
    }
}

pub fn authority() -> Session {
    Session {
        user_id: "officer-1".to_string(),
        email: Some("officer@city.gov".to_string()),
        role: Role::Authority,
    }
}

/// A form that passes validation with a 260-character description
pub fn valid_form() -> IssueForm {
    let mut description = String::from("The streetlight outside number 14 Lake Road has been dark for a week. ");
    while description.chars().count() < 260 {
        description.push_str("Pedestrians are walking in the dark. ");
    }
    let description: String = description.chars().take(260).collect();

    IssueForm {
        name: "Asha Rao".to_string(),
        phone: "555-0101".to_string(),
        address: "14 Lake Road".to_string(),
        title: "Streetlight out".to_string(),
        description,
        category: "light".to_string(),
        custom_category: None,
        priority: "medium".to_string(),
        location_url: Some("https://www.google.com/maps?q=12.9716,77.5946".to_string()),
    }
}

pub fn unit_embedding(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; EMBEDDING_DIMENSIONS];
    v[axis % EMBEDDING_DIMENSIONS] = 1.0;
    v
}

// ---------------------------------------------------------------------------
// Issue store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<IssueRecord>>,
    pub fail_list: AtomicBool,
    pub fail_insert: AtomicBool,
    /// Calls never complete while set
    pub hang_list: AtomicBool,
    pub hang_insert: AtomicBool,
    pub list_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<IssueRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn seed(&self, embedding: Option<Vec<f32>>) -> Uuid {
        let id = Uuid::new_v4();
        self.records.lock().unwrap().push(IssueRecord {
            id,
            name: "Seed".into(),
            phone: "0".into(),
            address: "Seed street".into(),
            title: "Seeded".into(),
            description: "seeded".into(),
            category: civic_common::models::Category::Water,
            priority: civic_common::models::Priority::Low,
            location_url: None,
            images: vec![],
            citizen_id: "seed".into(),
            summary: "seeded".into(),
            embedding,
            tags: vec![],
            sentiment: "unclassified".into(),
            created_at: Utc::now(),
        });
        id
    }

    pub fn inserts(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IssueStore for InMemoryStore {
    async fn list_embeddings(&self) -> Result<Vec<StoredEmbedding>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_list.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Internal("store offline".into()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|r| StoredEmbedding {
                issue_id: r.id,
                embedding: r.embedding.clone(),
            })
            .collect())
    }

    async fn insert(&self, issue: NewIssue) -> Result<IssueRecord> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_insert.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(Error::Internal("disk full".into()));
        }
        let record = IssueRecord {
            id: Uuid::new_v4(),
            name: issue.name,
            phone: issue.phone,
            address: issue.address,
            title: issue.title,
            description: issue.description,
            category: issue.category,
            priority: issue.priority,
            location_url: issue.location_url,
            images: issue.images,
            citizen_id: issue.citizen_id,
            summary: issue.summary,
            embedding: Some(issue.embedding),
            tags: issue.tags,
            sentiment: issue.sentiment,
            created_at: Utc::now(),
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, update: IssueUpdate) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        if let Some(priority) = update.priority {
            record.priority = priority;
        }
        if let Some(category) = update.category {
            record.category = category;
        }
        Ok(true)
    }

    async fn get(&self, id: Uuid) -> Result<Option<IssueRecord>> {
        Ok(self.records.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<IssueRecord>> {
        let mut records = self.records();
        records.reverse();
        Ok(records
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.records.lock().unwrap().len() as i64)
    }
}

// ---------------------------------------------------------------------------
// Text generator
// ---------------------------------------------------------------------------

pub struct FakeGenerator {
    pub summary: Mutex<Option<String>>,
    pub embedding: Mutex<Vec<f32>>,
    pub generation: Mutex<Option<String>>,
    pub fail_summarize: AtomicBool,
    pub fail_embed: AtomicBool,
    pub fail_generate: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            summary: Mutex::new(Some("Streetlight on Lake Road has been out for a week.".into())),
            embedding: Mutex::new(unit_embedding(0)),
            generation: Mutex::new(Some("#streetlight #safety #LakeRoad".into())),
            fail_summarize: AtomicBool::new(false),
            fail_embed: AtomicBool::new(false),
            fail_generate: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_embedding(&self, embedding: Vec<f32>) {
        *self.embedding.lock().unwrap() = embedding;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn remote_failure() -> GenerationError {
    GenerationError::ApiError(503, "service unavailable".into())
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn summarize(&self, _text: &str) -> std::result::Result<Option<String>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_summarize.load(Ordering::SeqCst) {
            return Err(remote_failure());
        }
        Ok(self.summary.lock().unwrap().clone())
    }

    async fn embed(&self, _text: &str) -> std::result::Result<Vec<Vec<f32>>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed.load(Ordering::SeqCst) {
            return Err(remote_failure());
        }
        Ok(vec![self.embedding.lock().unwrap().clone()])
    }

    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> std::result::Result<Option<String>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_generate.load(Ordering::SeqCst) {
            return Err(remote_failure());
        }
        Ok(self.generation.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Blob store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeBlobStore {
    pub uploaded: Mutex<Vec<String>>,
    /// Paths containing this marker fail to upload
    pub fail_marker: Mutex<Option<String>>,
    /// Uploads never complete while set
    pub hang: AtomicBool,
}

impl FakeBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(marker: &str) -> Arc<Self> {
        let store = Self::default();
        *store.fail_marker.lock().unwrap() = Some(marker.to_string());
        Arc::new(store)
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn upload(&self, path: &str, _bytes: &[u8], _content_type: Option<&str>) -> std::result::Result<String, BlobError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(marker) = self.fail_marker.lock().unwrap().as_deref() {
            if path.contains(marker) {
                return Err(BlobError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "bucket unavailable",
                )));
            }
        }
        self.uploaded.lock().unwrap().push(path.to_string());
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://blobs.test/issue-images/{}", path)
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Value, String)>>,
    pub fail: AtomicBool,
    /// Held before every send
    pub delay: Mutex<Option<Duration>>,
    pub attempts: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<(String, Value, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wait for the background confirmation task to make `count` attempts
    pub async fn wait_for_attempts(&self, count: usize) {
        for _ in 0..200 {
            if self.attempts() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("expected {count} notification attempts, saw {}", self.attempts());
    }

    /// Let any spawned confirmation task run
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, template_id: &str, variables: &Value, recipient: &str) -> std::result::Result<(), NotificationError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::ApiError(500, "mailer down".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((template_id.to_string(), variables.clone(), recipient.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Identity provider
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeIdentity {
    sessions: HashMap<String, Session>,
    pub unavailable: AtomicBool,
}

impl FakeIdentity {
    pub fn with_sessions(sessions: &[(&str, Session)]) -> Arc<Self> {
        Arc::new(Self {
            sessions: sessions
                .iter()
                .map(|(token, session)| (token.to_string(), session.clone()))
                .collect(),
            unavailable: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn current_user(&self, access_token: &str) -> std::result::Result<Option<Session>, IdentityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::NetworkError("connection refused".into()));
        }
        Ok(self.sessions.get(access_token).cloned())
    }
}

// ---------------------------------------------------------------------------
// Pipeline wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub generator: Arc<FakeGenerator>,
    pub blobs: Arc<FakeBlobStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub pipeline: Arc<SubmissionPipeline>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_blobs(FakeBlobStore::new())
    }

    pub fn with_blobs(blobs: Arc<FakeBlobStore>) -> Self {
        let store = InMemoryStore::new();
        let generator = FakeGenerator::new();
        let notifier = RecordingNotifier::new();
        let settings = PipelineSettings {
            call_timeout: Duration::from_secs(5),
            ..PipelineSettings::default()
        };
        let pipeline = Arc::new(SubmissionPipeline::new(
            store.clone(),
            generator.clone(),
            blobs.clone(),
            notifier.clone(),
            settings,
        ));
        Self {
            store,
            generator,
            blobs,
            notifier,
            pipeline,
        }
    }
}
