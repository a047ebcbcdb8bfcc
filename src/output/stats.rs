//! Statistics about the data directory
//!
//! This module provides functionality for counting what has been persisted
//! and summarising the checkpoint, for the `--stats` mode.

use crate::crawler::{Checkpoint, CheckpointStore};
use crate::storage::{Category, Repository};
use crate::RegistryError;

/// Data directory statistics summary
#[derive(Debug, Clone, Default)]
pub struct RepositoryStatistics {
    /// Number of profile documents
    pub companies: u64,

    /// Number of officer list documents
    pub officers: u64,

    /// Number of filing list documents
    pub filings: u64,

    /// Entities with all three documents
    pub complete: u64,

    /// The current checkpoint, if any
    pub checkpoint: Option<Checkpoint>,
}

impl RepositoryStatistics {
    /// Profiles whose officer or filing document is missing
    pub fn incomplete(&self) -> u64 {
        self.companies.saturating_sub(self.complete)
    }
}

/// Loads statistics from the repository and the checkpoint file
///
/// # Arguments
///
/// * `repository` - The repository to count
/// * `checkpoints` - The checkpoint store to summarise
///
/// # Returns
///
/// * `Ok(RepositoryStatistics)` - Successfully loaded statistics
/// * `Err(RegistryError)` - A directory or the checkpoint could not be read
pub fn load_statistics<R: Repository + ?Sized>(
    repository: &R,
    checkpoints: &CheckpointStore,
) -> Result<RepositoryStatistics, RegistryError> {
    let profiles = repository.list_ids(Category::Profile)?;
    let complete = profiles
        .iter()
        .filter(|id| repository.is_complete(id))
        .count() as u64;

    Ok(RepositoryStatistics {
        companies: profiles.len() as u64,
        officers: repository.list_ids(Category::Officers)?.len() as u64,
        filings: repository.list_ids(Category::Filings)?.len() as u64,
        complete,
        checkpoint: checkpoints.load()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RepositoryStatistics) {
    println!("=== Registry Statistics ===\n");

    println!("Documents:");
    println!("  Company profiles: {}", stats.companies);
    println!("  Officer lists: {}", stats.officers);
    println!("  Filing histories: {}", stats.filings);
    println!();

    let percentage = if stats.companies > 0 {
        (stats.complete as f64 / stats.companies as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Complete entities: {} ({:.1}% of profiles, {} incomplete)",
        stats.complete,
        percentage,
        stats.incomplete()
    );
    println!();

    match &stats.checkpoint {
        Some(checkpoint) => {
            println!("Checkpoint ({}):", checkpoint.timestamp);
            println!(
                "  Status: {}",
                checkpoint.status.map(|s| s.as_str()).unwrap_or("in progress")
            );
            println!("  Total processed: {}", checkpoint.total_processed);
            println!(
                "  Position: bucket {} index {}",
                checkpoint.current_char.as_deref().unwrap_or("-"),
                checkpoint.last_index
            );
            if let Some(company) = &checkpoint.last_company {
                println!("  Last company: {}", company);
            }
            if let Some(eta) = &checkpoint.eta {
                println!("  ETA: {}", eta);
            }
            if let Some(time_taken) = &checkpoint.time_taken {
                println!("  Time taken: {}", time_taken);
            }
        }
        None => println!("No checkpoint recorded"),
    }
}
