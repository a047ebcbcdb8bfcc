//! Checkpoint file persistence
//!
//! The checkpoint is a single JSON object overwritten in place after every
//! save interval and on every terminal event. Writes go through a temporary
//! file in the same directory followed by a rename, so a crash mid-write
//! leaves the previous checkpoint intact.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing the checkpoint file
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid checkpoint at {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to replace checkpoint at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

/// Why a checkpoint was written, when it marks a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    PausedLowDisk,
    Interrupted,
    Completed,
}

impl CheckpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PausedLowDisk => "paused_low_disk",
            Self::Interrupted => "interrupted",
            Self::Completed => "completed",
        }
    }
}

/// Snapshot of crawl progress
///
/// `last_index` is the absolute position within the `current_char` bucket
/// where a resumed crawl starts. `last_company` is the title used as the
/// resume threshold. `status` is null for periodic and failure checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub last_index: u64,

    #[serde(default)]
    pub last_company: Option<String>,

    #[serde(default)]
    pub total_processed: u64,

    #[serde(default)]
    pub current_char: Option<String>,

    #[serde(default)]
    pub timestamp: String,

    #[serde(default)]
    pub status: Option<CheckpointStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<String>,
}

impl Checkpoint {
    /// A checkpoint at a position inside a bucket, stamped now
    pub fn at(
        bucket: &str,
        last_index: u64,
        last_company: Option<String>,
        total_processed: u64,
        status: Option<CheckpointStatus>,
    ) -> Self {
        Self {
            last_index,
            last_company,
            total_processed,
            current_char: Some(bucket.to_string()),
            timestamp: now_timestamp(),
            status,
            eta: None,
            time_taken: None,
        }
    }

    /// The reset checkpoint written once every bucket is exhausted
    pub fn completed(total_processed: u64, time_taken: String) -> Self {
        Self {
            last_index: 0,
            last_company: None,
            total_processed,
            current_char: None,
            timestamp: now_timestamp(),
            status: Some(CheckpointStatus::Completed),
            eta: None,
            time_taken: Some(time_taken),
        }
    }

    pub fn with_eta(mut self, eta: String) -> Self {
        self.eta = Some(eta);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == Some(CheckpointStatus::Completed)
    }
}

fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Reads and atomically replaces the checkpoint file
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the checkpoint, or `None` when no checkpoint has been written
    pub fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let checkpoint =
            serde_json::from_str(&content).map_err(|source| CheckpointError::Serialization {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(checkpoint))
    }

    /// Atomically replaces the checkpoint file
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let io_err = |source| CheckpointError::Io {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(checkpoint).map_err(|source| {
            CheckpointError::Serialization {
                path: self.path.clone(),
                source,
            }
        })?;

        let parent_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent_dir).map_err(io_err)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir).map_err(io_err)?;
        temp_file.write_all(json.as_bytes()).map_err(io_err)?;
        temp_file.flush().map_err(io_err)?;
        temp_file.as_file().sync_all().map_err(io_err)?;

        temp_file
            .persist(&self.path)
            .map_err(|source| CheckpointError::Persist {
                path: self.path.clone(),
                source,
            })?;

        // Fsync parent directory so the rename is durable. The new file is
        // already in place, so a failure here is only logged.
        if let Err(e) = sync_dir(parent_dir) {
            tracing::debug!(
                "Failed to fsync checkpoint directory {}: {}",
                parent_dir.display(),
                e
            );
        }

        tracing::debug!(
            path = %self.path.display(),
            last_index = checkpoint.last_index,
            total_processed = checkpoint.total_processed,
            status = checkpoint.status.map(|s| s.as_str()).unwrap_or("none"),
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Removes the checkpoint file if present
    pub fn clear(&self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}
