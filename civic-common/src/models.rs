//! Issue report data model shared by the intake and review services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Sentiment stored on every report. Classification is not computed.
pub const SENTIMENT_PLACEHOLDER: &str = "unclassified";

/// Category value that requires a free-text override
pub const OTHER_CATEGORY: &str = "other";

/// Role attached to an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Citizen,
    Authority,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Authority => "authority",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citizen" => Ok(Role::Citizen),
            "authority" => Ok(Role::Authority),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Authenticated user on whose behalf an operation runs
///
/// Resolved once per request and passed explicitly into every operation
/// that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque user id issued by the identity provider
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
}

/// Issue priority, assignable by authorities after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("priority must be one of low, medium, high (got '{}')", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue category: a closed set plus a free-text override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Pothole,
    Water,
    Garbage,
    Light,
    /// Effective value of an `other` selection
    Custom(String),
}

impl Category {
    /// Resolve a submitted category selection into its effective value
    ///
    /// `other` requires a non-empty `custom`, which becomes the category.
    /// Any value outside the closed set is rejected.
    pub fn resolve(selection: &str, custom: Option<&str>) -> Result<Self, String> {
        match selection.trim() {
            "" => Err("category is required".to_string()),
            "pothole" => Ok(Category::Pothole),
            "water" => Ok(Category::Water),
            "garbage" => Ok(Category::Garbage),
            "light" => Ok(Category::Light),
            OTHER_CATEGORY => match custom.map(str::trim) {
                Some(text) if !text.is_empty() => Ok(Category::Custom(text.to_string())),
                _ => Err("a custom category is required when category is 'other'".to_string()),
            },
            other => Err(format!("unknown category: {}", other)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Category::Pothole => "pothole",
            Category::Water => "water",
            Category::Garbage => "garbage",
            Category::Light => "light",
            Category::Custom(text) => text,
        }
    }
}

impl From<String> for Category {
    /// Stored values never carry the `other` sentinel, so anything outside
    /// the closed set reads back as a custom category.
    fn from(value: String) -> Self {
        match value.as_str() {
            "pothole" => Category::Pothole,
            "water" => Category::Water,
            "garbage" => Category::Garbage,
            "light" => Category::Light,
            _ => Category::Custom(value),
        }
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully validated and enriched report, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub location_url: Option<String>,
    pub images: Vec<String>,
    pub citizen_id: String,
    pub summary: String,
    pub embedding: Vec<f32>,
    pub tags: Vec<String>,
    pub sentiment: String,
}

/// Persisted issue report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_url: Option<String>,
    pub images: Vec<String>,
    pub citizen_id: String,
    pub summary: String,
    /// Not sent over HTTP; absent for legacy rows
    #[serde(skip_serializing, default)]
    pub embedding: Option<Vec<f32>>,
    pub tags: Vec<String>,
    pub sentiment: String,
    pub created_at: DateTime<Utc>,
}

/// Embedding population entry used for duplicate screening
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEmbedding {
    pub issue_id: Uuid,
    pub embedding: Option<Vec<f32>>,
}

/// Post-creation changes. Only priority and category are mutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueUpdate {
    pub priority: Option<Priority>,
    pub category: Option<Category>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.category.is_none()
    }
}
