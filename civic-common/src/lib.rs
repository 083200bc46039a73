//! # Civic Common Library
//!
//! Shared code for the civic issue services:
//! - Issue report models
//! - SQLite schema and issue store
//! - Collaborator interfaces (issue store, identity provider, text generation)
//! - Configuration loading
//! - Embedding similarity

pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod identity;
pub mod models;
pub mod similarity;
pub mod store;

pub use error::{Error, Result};
pub use store::IssueStore;
