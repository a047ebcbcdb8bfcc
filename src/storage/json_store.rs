//! File-per-entity JSON storage
//!
//! This module provides the on-disk implementation of the Repository trait.
//! Documents live at `<data-dir>/<category-dir>/<entity-id>.json`.

use crate::storage::traits::{validate_entity_id, Repository, StorageError, StorageResult};
use crate::storage::Category;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const DOCUMENT_EXTENSION: &str = "json";

/// JSON document repository rooted at a data directory
#[derive(Debug, Clone)]
pub struct JsonRepository {
    root: PathBuf,
}

impl JsonRepository {
    /// Opens a repository, creating the category directories if needed
    ///
    /// # Arguments
    ///
    /// * `root` - The data directory
    ///
    /// # Returns
    ///
    /// * `Ok(JsonRepository)` - Directories exist and are ready
    /// * `Err(StorageError)` - A directory could not be created
    pub fn new(root: &Path) -> StorageResult<Self> {
        for category in Category::ALL {
            let dir = root.join(category.dir_name());
            fs::create_dir_all(&dir).map_err(|source| StorageError::Io { path: dir, source })?;
        }

        tracing::debug!("Repository initialized at {}", root.display());

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every document of one category
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// The deterministic location of a document
    pub fn document_path(&self, entity_id: &str, category: Category) -> PathBuf {
        self.category_dir(category)
            .join(format!("{}.{}", entity_id, DOCUMENT_EXTENSION))
    }
}

impl Repository for JsonRepository {
    fn exists(&self, entity_id: &str, category: Category) -> bool {
        validate_entity_id(entity_id).is_ok() && self.document_path(entity_id, category).is_file()
    }

    fn save(
        &mut self,
        entity_id: &str,
        category: Category,
        document: &Value,
    ) -> StorageResult<()> {
        validate_entity_id(entity_id)?;

        let path = self.document_path(entity_id, category);
        let json =
            serde_json::to_string_pretty(document).map_err(|source| StorageError::Serialization {
                path: path.clone(),
                source,
            })?;

        fs::write(&path, json).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::trace!("Saved {} for {} to {}", category, entity_id, path.display());
        Ok(())
    }

    fn load(&self, entity_id: &str, category: Category) -> StorageResult<Value> {
        validate_entity_id(entity_id)?;

        let path = self.document_path(entity_id, category);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    entity_id: entity_id.to_string(),
                    category,
                })
            }
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        serde_json::from_str(&content).map_err(|source| StorageError::Serialization { path, source })
    }

    fn list_ids(&self, category: Category) -> StorageResult<Vec<String>> {
        let dir = self.category_dir(category);
        let entries = fs::read_dir(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }
}
