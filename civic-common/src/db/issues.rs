//! SQLite-backed issue store

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{
    Category, IssueRecord, IssueUpdate, NewIssue, Priority, StoredEmbedding,
};
use crate::store::IssueStore;
use crate::{Error, Result};

const ISSUE_COLUMNS: &str = "id, name, phone, address, title, description, category, priority, \
     location_url, images, citizen_id, summary, embedding, tags, sentiment, created_at";

/// Issue store over the shared civic SQLite database
#[derive(Clone)]
pub struct SqliteIssueStore {
    db: SqlitePool,
}

impl SqliteIssueStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// NULL or unreadable embeddings read as absent
fn decode_embedding(issue_id: &str, raw: Option<String>) -> Option<Vec<f32>> {
    let raw = raw?;
    match serde_json::from_str::<Vec<f32>>(&raw) {
        Ok(vector) if !vector.is_empty() => Some(vector),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(issue_id = %issue_id, error = %e, "Ignoring unreadable embedding");
            None
        }
    }
}

fn row_to_issue(row: &SqliteRow) -> Result<IssueRecord> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| Error::Internal(format!("Invalid issue id '{}': {}", id_str, e)))?;

    let priority_str: String = row.get("priority");
    let priority = priority_str
        .parse::<Priority>()
        .map_err(|e| Error::Internal(format!("Issue {}: {}", id, e)))?;

    let created_str: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_str)
        .map_err(|e| Error::Internal(format!("Issue {}: invalid created_at: {}", id, e)))?
        .with_timezone(&Utc);

    let images: String = row.get("images");
    let tags: String = row.get("tags");

    Ok(IssueRecord {
        id,
        name: row.get("name"),
        phone: row.get("phone"),
        address: row.get("address"),
        title: row.get("title"),
        description: row.get("description"),
        category: Category::from(row.get::<String, _>("category")),
        priority,
        location_url: row.get("location_url"),
        images: serde_json::from_str(&images)?,
        citizen_id: row.get("citizen_id"),
        summary: row.get("summary"),
        embedding: decode_embedding(&id_str, row.get("embedding")),
        tags: serde_json::from_str(&tags)?,
        sentiment: row.get("sentiment"),
        created_at,
    })
}

#[async_trait]
impl IssueStore for SqliteIssueStore {
    async fn list_embeddings(&self) -> Result<Vec<StoredEmbedding>> {
        let rows = sqlx::query("SELECT id, embedding FROM issues")
            .fetch_all(&self.db)
            .await?;

        let mut population = Vec::with_capacity(rows.len());
        for row in rows {
            let id_str: String = row.get("id");
            let issue_id = match Uuid::parse_str(&id_str) {
                Ok(id) => id,
                Err(_) => {
                    tracing::debug!(issue_id = %id_str, "Skipping row with invalid id");
                    continue;
                }
            };
            population.push(StoredEmbedding {
                issue_id,
                embedding: decode_embedding(&id_str, row.get("embedding")),
            });
        }

        Ok(population)
    }

    async fn insert(&self, issue: NewIssue) -> Result<IssueRecord> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO issues (
                id, name, phone, address, title, description, category, priority,
                location_url, images, citizen_id, summary, embedding, tags, sentiment, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&issue.name)
        .bind(&issue.phone)
        .bind(&issue.address)
        .bind(&issue.title)
        .bind(&issue.description)
        .bind(issue.category.as_str())
        .bind(issue.priority.as_str())
        .bind(&issue.location_url)
        .bind(serde_json::to_string(&issue.images)?)
        .bind(&issue.citizen_id)
        .bind(&issue.summary)
        .bind(serde_json::to_string(&issue.embedding)?)
        .bind(serde_json::to_string(&issue.tags)?)
        .bind(&issue.sentiment)
        .bind(format_timestamp(&created_at))
        .execute(&self.db)
        .await?;

        tracing::debug!(issue_id = %id, citizen_id = %issue.citizen_id, "Issue row inserted");

        Ok(IssueRecord {
            id,
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
            created_at,
        })
    }

    async fn update(&self, id: Uuid, update: IssueUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(self.get(id).await?.is_some());
        }

        let result = sqlx::query(
            r#"
            UPDATE issues
            SET priority = COALESCE(?, priority),
                category = COALESCE(?, category)
            WHERE id = ?
            "#,
        )
        .bind(update.priority.map(|p| p.as_str()))
        .bind(update.category.as_ref().map(|c| c.as_str().to_string()))
        .bind(id.to_string())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: Uuid) -> Result<Option<IssueRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM issues WHERE id = ?", ISSUE_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(row_to_issue).transpose()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<IssueRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM issues ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            ISSUE_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_issue).collect()
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issues")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}
