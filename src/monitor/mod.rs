//! Resource monitoring
//!
//! The crawler asks a [`ResourceMonitor`] for disk, memory and CPU usage at
//! regular intervals and pauses when free disk space gets critically low.

mod system;

pub use system::SystemMonitor;

use chrono::Local;
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use thiserror::Error;

/// Free space below which a warning is logged on every report
pub const WARN_FREE_DISK_GB: f64 = 10.0;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Errors that can occur while sampling resources
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("No mounted disk contains {0}")]
    NoDisk(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of resource usage reports
///
/// Reports are awaited on the crawl task, so implementations must not block
/// the runtime while sampling.
pub trait ResourceMonitor {
    /// Reports usage for the disk holding `path`, plus memory and CPU
    fn report(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<ResourceReport, MonitorError>> + Send;
}

/// Disk usage in gigabytes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiskUsage {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
}

impl DiskUsage {
    /// Builds a usage figure from byte counts
    pub fn from_bytes(total: u64, free: u64) -> Self {
        let total_gb = total as f64 / BYTES_PER_GB;
        let free_gb = free as f64 / BYTES_PER_GB;
        Self {
            total_gb,
            used_gb: (total_gb - free_gb).max(0.0),
            free_gb,
        }
    }

    pub fn percent_used(&self) -> f64 {
        if self.total_gb > 0.0 {
            (self.used_gb / self.total_gb) * 100.0
        } else {
            0.0
        }
    }
}

/// Memory usage in gigabytes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub total_gb: f64,
    pub used_gb: f64,
    pub percent: f64,
}

impl MemoryUsage {
    pub fn from_bytes(total: u64, used: u64) -> Self {
        let percent = if total > 0 {
            (used as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self {
            total_gb: total as f64 / BYTES_PER_GB,
            used_gb: used as f64 / BYTES_PER_GB,
            percent,
        }
    }
}

/// A point-in-time resource snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceReport {
    pub timestamp: String,
    pub disk: DiskUsage,
    pub memory: MemoryUsage,
    pub cpu_percent: f64,
}

impl ResourceReport {
    pub fn new(disk: DiskUsage, memory: MemoryUsage, cpu_percent: f64) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            disk,
            memory,
            cpu_percent,
        }
    }

    /// True when free disk space is below `threshold_gb`
    pub fn is_disk_below(&self, threshold_gb: f64) -> bool {
        self.disk.free_gb < threshold_gb
    }
}

/// Prints a resource report to stdout in a formatted manner
pub fn print_resource_report(report: &ResourceReport) {
    println!("\n===== RESOURCE REPORT =====");
    println!("Time: {}", report.timestamp);
    println!(
        "Disk: {:.2} GB free / {:.2} GB total ({:.2}% used)",
        report.disk.free_gb,
        report.disk.total_gb,
        report.disk.percent_used()
    );
    println!(
        "Memory: {:.2} GB used / {:.2} GB total ({:.1}% used)",
        report.memory.used_gb, report.memory.total_gb, report.memory.percent
    );
    println!("CPU: {:.1}% used", report.cpu_percent);
    println!("==========================\n");
}
