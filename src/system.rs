//! Local system sampling
//!
//! Snapshot of CPU, memory, persistent disk, load and uptime for the VM the
//! agent runs on.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use sysinfo::{Disks, System};

/// Window over which CPU usage is measured
const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// System level stats, all percentages in 0..=100
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub cpu_used: f64,
    pub memory_used: f64,
    /// Persistent disk usage; zero when the VM has no persistent disk
    #[serde(skip_serializing_if = "is_zero")]
    pub disk_used: f64,
    pub load15: f64,
    /// Seconds since boot
    pub uptime: u64,
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

/// Take a snapshot. Blocks the calling task for the CPU sample window.
pub async fn sample(persistent_disk_path: &Path) -> Result<Stats> {
    let mut sys = System::new();

    sys.refresh_cpu_usage();
    tokio::time::sleep(CPU_SAMPLE_WINDOW.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)).await;
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let disk_used = if persistent_disk_path.exists() {
        let path = persistent_disk_path.to_path_buf();
        tokio::task::spawn_blocking(move || disk_used_percent(&path))
            .await
            .context("Disk sampling task failed")??
    } else {
        0.0
    };

    Ok(Stats {
        cpu_used: f64::from(sys.global_cpu_usage()),
        memory_used: percent(sys.used_memory(), sys.total_memory()),
        disk_used,
        load15: System::load_average().fifteen,
        uptime: System::uptime(),
    })
}

fn disk_used_percent(path: &Path) -> Result<f64> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))?;

    let disks = Disks::new_with_refreshed_list();
    let mounts = disks
        .list()
        .iter()
        .map(|d| (d.mount_point(), d.total_space(), d.available_space()));

    let (total, available) = holding_filesystem(&path, mounts)
        .with_context(|| format!("No mounted filesystem holds {}", path.display()))?;

    Ok(percent(total.saturating_sub(available), total))
}

/// Space figures of the most specific mount containing `path`
fn holding_filesystem<'a>(
    path: &Path,
    mounts: impl Iterator<Item = (&'a Path, u64, u64)>,
) -> Option<(u64, u64)> {
    mounts
        .filter(|(mount, _, _)| path.starts_with(mount))
        .max_by_key(|(mount, _, _)| mount.as_os_str().len())
        .map(|(_, total, available)| (total, available))
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
