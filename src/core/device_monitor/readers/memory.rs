use async_trait::async_trait;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use super::MetricReader;
use crate::core::device_monitor::metrics::MetricKind;
use crate::error::{PulseError, Result};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// RAM usage from the kernel's memory counters
pub struct RamReader;

impl RamReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RamReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricReader for RamReader {
    fn kind(&self) -> MetricKind {
        MetricKind::Ram
    }

    async fn read(&self) -> Result<String> {
        let (total, used) = tokio::task::spawn_blocking(|| {
            let refresh = RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram());
            let sys = System::new_with_specifics(refresh);
            (sys.total_memory(), sys.used_memory())
        })
        .await
        .map_err(|e| PulseError::reader(format!("memory query aborted: {}", e)))?;

        format_ram(total, used)
    }
}

pub(crate) fn format_ram(total_bytes: u64, used_bytes: u64) -> Result<String> {
    if total_bytes == 0 {
        return Err(PulseError::reader("memory counters unavailable"));
    }

    let used_mb = used_bytes / BYTES_PER_MB;
    let percent = (used_bytes as f64 / total_bytes as f64 * 100.0).round() as u64;
    Ok(format!("{} MB ({}%)", used_mb, percent))
}
