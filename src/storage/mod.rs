//! Storage module for persisting entity documents
//!
//! This module handles all persistence of crawled entities, including:
//! - The repository trait and its file-per-entity JSON implementation
//! - Entity categories (profile, officers, filings)
//! - Saving a complete entity record in crash-safe order

mod json_store;
mod traits;

pub use json_store::JsonRepository;
pub use traits::{validate_entity_id, Repository, StorageError, StorageResult};

use crate::api::EntityRecord;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Opens the JSON repository rooted at the data directory
pub fn open_repository(data_dir: &Path) -> StorageResult<JsonRepository> {
    JsonRepository::new(data_dir)
}

/// The independently fetched parts of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Profile,
    Officers,
    Filings,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Profile, Category::Officers, Category::Filings];

    /// Directory name under the data directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Profile => "companies",
            Self::Officers => "officers",
            Self::Filings => "filings",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Officers => "officers",
            Self::Filings => "filings",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persists a complete entity record
///
/// The identifier is taken from the profile's `company_number`. Officers and
/// filings are written first and the profile last: a crash in between leaves
/// the entity incomplete, so it is fetched again on the next run.
///
/// # Returns
///
/// * `Ok(String)` - The entity id the record was saved under
/// * `Err(StorageError::InvalidInput)` - The profile carries no identifier;
///   nothing was written
pub fn save_record<R: Repository + ?Sized>(
    repository: &mut R,
    record: &EntityRecord,
) -> StorageResult<String> {
    let entity_id = record
        .company_number()
        .ok_or_else(|| {
            StorageError::InvalidInput("profile has no company_number, cannot save".to_string())
        })?
        .to_string();
    validate_entity_id(&entity_id)?;

    repository.save(
        &entity_id,
        Category::Officers,
        &Value::Array(record.officers.clone()),
    )?;
    repository.save(
        &entity_id,
        Category::Filings,
        &Value::Array(record.filing_history.clone()),
    )?;
    repository.save(&entity_id, Category::Profile, &record.profile)?;

    Ok(entity_id)
}
