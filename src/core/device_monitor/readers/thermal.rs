use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::MetricReader;
use crate::core::device_monitor::metrics::MetricKind;
use crate::error::{PulseError, Result};

/// Throttling level derived from the hottest thermal zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ThermalLevel {
    None,
    Light,
    Moderate,
    Severe,
    Critical,
    Emergency,
    Shutdown,
}

impl ThermalLevel {
    pub fn from_celsius(celsius: f64) -> Self {
        match celsius {
            c if c < 45.0 => ThermalLevel::None,
            c if c < 50.0 => ThermalLevel::Light,
            c if c < 55.0 => ThermalLevel::Moderate,
            c if c < 60.0 => ThermalLevel::Severe,
            c if c < 70.0 => ThermalLevel::Critical,
            c if c < 80.0 => ThermalLevel::Emergency,
            _ => ThermalLevel::Shutdown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ThermalLevel::None => "Normal",
            ThermalLevel::Light => "Light",
            ThermalLevel::Moderate => "Moderate",
            ThermalLevel::Severe => "Severe",
            ThermalLevel::Critical => "Critical",
            ThermalLevel::Emergency => "Emergency",
            ThermalLevel::Shutdown => "Shutdown",
        }
    }
}

/// Thermal zones plus the platform power-save state
#[derive(Debug, Clone)]
pub struct ThermalReader {
    thermal_dir: PathBuf,
    platform_profile: PathBuf,
    governor: PathBuf,
}

impl ThermalReader {
    pub fn new(sys_root: &Path) -> Self {
        Self {
            thermal_dir: sys_root.join("sys/class/thermal"),
            platform_profile: sys_root.join("sys/firmware/acpi/platform_profile"),
            governor: sys_root.join("sys/devices/system/cpu/cpu0/cpufreq/scaling_governor"),
        }
    }

    /// Hottest zone in °C
    fn max_zone_celsius(&self) -> Option<f64> {
        fs::read_dir(&self.thermal_dir)
            .ok()?
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with("thermal_zone"))
            })
            .filter_map(|entry| {
                let raw = fs::read_to_string(entry.path().join("temp")).ok()?;
                let millidegrees: i64 = raw.trim().parse().ok()?;
                Some(millidegrees as f64 / 1000.0)
            })
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))))
    }

    fn power_save(&self) -> Option<bool> {
        if let Ok(profile) = fs::read_to_string(&self.platform_profile) {
            let profile = profile.trim();
            return Some(profile == "low-power" || profile == "quiet");
        }
        fs::read_to_string(&self.governor)
            .ok()
            .map(|g| g.trim() == "powersave")
    }
}

#[async_trait]
impl MetricReader for ThermalReader {
    fn kind(&self) -> MetricKind {
        MetricKind::Thermal
    }

    async fn read(&self) -> Result<String> {
        let reader = self.clone();
        let (celsius, power_save) =
            tokio::task::spawn_blocking(move || (reader.max_zone_celsius(), reader.power_save()))
                .await
                .map_err(|e| PulseError::reader(format!("thermal scan aborted: {}", e)))?;

        let mut parts = Vec::new();
        if let Some(c) = celsius {
            parts.push(format!("{} ({:.1}°C)", ThermalLevel::from_celsius(c).label(), c));
        }
        if let Some(on) = power_save {
            parts.push(format!("Power save {}", if on { "on" } else { "off" }));
        }

        if parts.is_empty() {
            return Err(PulseError::reader("no thermal zone or power profile readable"));
        }
        Ok(parts.join(" · "))
    }
}
