use crate::monitor::{
    DiskUsage, MemoryUsage, MonitorError, ResourceMonitor, ResourceReport, WARN_FREE_DISK_GB,
};
use std::path::Path;
use sysinfo::{Disks, System};

/// Resource monitor backed by the operating system
///
/// Each report samples CPU usage twice, separated by the minimum interval the
/// platform needs to produce a meaningful figure. The wait is a tokio sleep,
/// so the runtime keeps serving other tasks meanwhile.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMonitor;

impl SystemMonitor {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceMonitor for SystemMonitor {
    async fn report(&self, path: &Path) -> Result<ResourceReport, MonitorError> {
        let disk = disk_usage(path)?;

        let mut system = System::new();
        system.refresh_memory();
        let memory = MemoryUsage::from_bytes(system.total_memory(), system.used_memory());

        system.refresh_cpu();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        system.refresh_cpu();
        let cpu_percent = f64::from(system.global_cpu_info().cpu_usage());

        let report = ResourceReport::new(disk, memory, cpu_percent);

        if report.is_disk_below(WARN_FREE_DISK_GB) {
            tracing::warn!(
                "Low disk space: {:.2} GB free (below {} GB threshold)",
                report.disk.free_gb,
                WARN_FREE_DISK_GB
            );
        }

        Ok(report)
    }
}

/// Usage of the disk whose mount point is the longest prefix of `path`
fn disk_usage(path: &Path) -> Result<DiskUsage, MonitorError> {
    let path = path.canonicalize()?;
    let disks = Disks::new_with_refreshed_list();

    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().components().count())
        .map(|disk| DiskUsage::from_bytes(disk.total_space(), disk.available_space()))
        .ok_or_else(|| MonitorError::NoDisk(path.display().to_string()))
}
