use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

use super::MetricReader;
use crate::core::device_monitor::metrics::MetricKind;
use crate::error::{PulseError, Result};

/// Per-core frequency from the cpufreq sysfs files (values in kHz)
#[derive(Debug, Clone)]
pub struct CpuFrequencyReader {
    cpu_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CoreFrequency {
    current_khz: u64,
    max_khz: Option<u64>,
}

impl CpuFrequencyReader {
    pub fn new(sys_root: &Path) -> Self {
        Self {
            cpu_dir: sys_root.join("sys/devices/system/cpu"),
        }
    }

    fn collect(&self) -> Result<Vec<CoreFrequency>> {
        let entries = fs::read_dir(&self.cpu_dir)
            .map_err(|e| PulseError::reader(format!("{}: {}", self.cpu_dir.display(), e)))?;

        let mut cores: Vec<(u32, CoreFrequency)> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let index: u32 = name.to_str()?.strip_prefix("cpu")?.parse().ok()?;
                let cpufreq = entry.path().join("cpufreq");

                // Unreadable cores are skipped rather than guessed
                let current_khz = read_khz(&cpufreq.join("scaling_cur_freq"))?;
                let max_khz = read_khz(&cpufreq.join("cpuinfo_max_freq"));
                Some((index, CoreFrequency { current_khz, max_khz }))
            })
            .collect();

        cores.sort_by_key(|(index, _)| *index);
        Ok(cores.into_iter().map(|(_, core)| core).collect())
    }
}

#[async_trait]
impl MetricReader for CpuFrequencyReader {
    fn kind(&self) -> MetricKind {
        MetricKind::Cpu
    }

    async fn read(&self) -> Result<String> {
        let reader = self.clone();
        let cores = tokio::task::spawn_blocking(move || reader.collect())
            .await
            .map_err(|e| PulseError::reader(format!("cpufreq scan aborted: {}", e)))??;
        format_frequencies(&cores)
    }
}

fn read_khz(path: &Path) -> Option<u64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn format_frequencies(cores: &[CoreFrequency]) -> Result<String> {
    if cores.is_empty() {
        return Err(PulseError::reader("no readable cpufreq entries"));
    }

    let avg_khz = cores.iter().map(|c| c.current_khz).sum::<u64>() / cores.len() as u64;
    let max_khz = cores.iter().filter_map(|c| c.max_khz).max();

    let summary = match max_khz {
        Some(max) => format!("{}/{} GHz", ghz(avg_khz), ghz(max)),
        None => format!("{} GHz", ghz(avg_khz)),
    };
    Ok(format!("{} ({} cores)", summary, cores.len()))
}

fn ghz(khz: u64) -> String {
    format!("{:.2}", khz as f64 / 1_000_000.0)
}
