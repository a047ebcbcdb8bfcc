//! Storage traits and error types
//!
//! This module defines the trait interface for entity repositories and
//! associated error types.

use crate::storage::Category;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{category} document not found for entity {entity_id}")]
    NotFound {
        entity_id: String,
        category: Category,
    },

    #[error("Serialization error for {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for entity repository implementations
///
/// One document is kept per entity per category, keyed by the entity's
/// identifier. There is a single writer per crawl, so implementations need
/// no locking.
pub trait Repository {
    /// Checks whether a document exists for the entity in the given category
    fn exists(&self, entity_id: &str, category: Category) -> bool;

    /// Writes the document, replacing any previous version
    ///
    /// An entity id that cannot address a document (empty, blank, or
    /// containing path separators) is rejected with
    /// [`StorageError::InvalidInput`] and nothing is written.
    fn save(&mut self, entity_id: &str, category: Category, document: &Value)
        -> StorageResult<()>;

    /// Reads a document back
    fn load(&self, entity_id: &str, category: Category) -> StorageResult<Value>;

    /// Lists the ids of every entity with a document in the category, sorted
    fn list_ids(&self, category: Category) -> StorageResult<Vec<String>>;

    /// True when every category has been persisted for the entity
    ///
    /// Categories are checked individually so that an entity interrupted
    /// part-way through saving is fetched again rather than skipped.
    fn is_complete(&self, entity_id: &str) -> bool {
        Category::ALL
            .iter()
            .all(|category| self.exists(entity_id, *category))
    }
}

/// Validates that an entity id can be used as a storage key
pub fn validate_entity_id(entity_id: &str) -> StorageResult<()> {
    if entity_id.trim().is_empty() {
        return Err(StorageError::InvalidInput(
            "entity identifier is missing".to_string(),
        ));
    }

    if entity_id
        .chars()
        .any(|c| c == '/' || c == '\\' || c == '\0')
        || entity_id == "."
        || entity_id == ".."
    {
        return Err(StorageError::InvalidInput(format!(
            "entity identifier '{}' is not a valid storage key",
            entity_id
        )));
    }

    Ok(())
}
