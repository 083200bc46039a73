//! Submission input validation
//!
//! Runs before any upload, enrichment or storage call. A failure names the
//! offending field and nothing is written.

use civic_common::models::{Category, Priority};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Shortest description worth summarizing, in characters
pub const MIN_DESCRIPTION_CHARS: usize = 250;
/// Most images one report may carry
pub const MAX_IMAGES: usize = 3;

/// Coordinate-query map link, e.g. `https://www.google.com/maps?q=12.9716,77.5946`
static LOCATION_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://www\.google\.com/maps\?q=(-?\d+(\.\d+)?),\s*(-?\d+(\.\d+)?)$")
        .expect("location pattern is valid")
});

/// Raw submitted form fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueForm {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Required when `category` is `other`
    #[serde(default)]
    pub custom_category: Option<String>,
    pub priority: String,
    #[serde(default)]
    pub location_url: Option<String>,
}

/// Form fields after validation, with the effective category resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedIssue {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub location_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Whether `url` is an accepted geo-link (surrounding whitespace ignored)
pub fn is_valid_location_url(url: &str) -> bool {
    LOCATION_URL_PATTERN.is_match(url.trim())
}

#[derive(Debug, Clone, Default)]
pub struct Validator;

impl Validator {
    pub fn validate(&self, form: &IssueForm, image_count: usize) -> Result<ValidatedIssue, ValidationError> {
        let name = required("name", &form.name)?;
        let phone = required("phone", &form.phone)?;
        let address = required("address", &form.address)?;
        let title = required("title", &form.title)?;
        required("description", &form.description)?;

        // Unicode scalar values, not bytes
        let description_chars = form.description.chars().count();
        if description_chars < MIN_DESCRIPTION_CHARS {
            return Err(ValidationError::new(
                "description",
                format!(
                    "Description must be at least {} characters for AI summarization (got {}).",
                    MIN_DESCRIPTION_CHARS, description_chars
                ),
            ));
        }

        let category = Category::resolve(&form.category, form.custom_category.as_deref()).map_err(
            |message| {
                let field = if form.category.trim() == civic_common::models::OTHER_CATEGORY {
                    "custom_category"
                } else {
                    "category"
                };
                ValidationError::new(field, message)
            },
        )?;

        let priority = form
            .priority
            .parse::<Priority>()
            .map_err(|message| ValidationError::new("priority", message))?;

        let location_url = match form.location_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(url) if is_valid_location_url(url) => Some(url.to_string()),
            Some(_) => {
                return Err(ValidationError::new(
                    "location_url",
                    "Invalid Google Maps link. Use format: https://www.google.com/maps?q=12.9716,77.5946",
                ))
            }
        };

        if image_count > MAX_IMAGES {
            return Err(ValidationError::new(
                "images",
                format!("At most {} images may be attached (got {}).", MAX_IMAGES, image_count),
            ));
        }

        Ok(ValidatedIssue {
            name,
            phone,
            address,
            title,
            description: form.description.clone(),
            category,
            priority,
            location_url,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::new(field, format!("{} is required", field)))
    } else {
        Ok(trimmed.to_string())
    }
}
