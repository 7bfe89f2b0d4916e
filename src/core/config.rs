use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::device_monitor::PowerAlertConfig;

const APP_DIR: &str = "devpulse";

/// Effective configuration for the sampling loop and everything it drives.
///
/// Every cadence, transfer size and threshold lives here so that tests can run
/// the loop with millisecond intervals and tiny transfers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub alerts: PowerAlertConfig,
    #[serde(default)]
    pub fps: FpsConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub interval_ms: u64,
    /// Upper bound for a single reader; defaults to the interval when absent
    pub reader_timeout_ms: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            reader_timeout_ms: None,
        }
    }
}

impl SamplingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn reader_timeout(&self) -> Duration {
        Duration::from_millis(self.reader_timeout_ms.unwrap_or(self.interval_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub ping_host: String,
    pub ping_timeout_secs: u64,
    pub download_url: String,
    pub download_bytes: u64,
    pub upload_url: String,
    pub upload_bytes: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ping_host: "8.8.8.8".to_string(),
            ping_timeout_secs: 2,
            download_url: "https://speed.cloudflare.com/__down?bytes={bytes}".to_string(),
            download_bytes: 10 * 1024 * 1024,
            upload_url: "https://speed.cloudflare.com/__up".to_string(),
            upload_bytes: 2 * 1024 * 1024,
        }
    }
}

impl NetworkConfig {
    /// Download URL with the `{bytes}` placeholder filled in
    pub fn resolved_download_url(&self) -> String {
        self.download_url
            .replace("{bytes}", &self.download_bytes.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub window: usize,
    pub min_samples: usize,
    /// Relative change between the older and newer half of the window
    pub threshold_ratio: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window: 6,
            min_samples: 4,
            threshold_ratio: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FpsConfig {
    pub window_ms: u64,
    pub target_hz: f64,
}

impl Default for FpsConfig {
    fn default() -> Self {
        Self {
            window_ms: 1_000,
            target_hz: 60.0,
        }
    }
}

impl FpsConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Identical content posted again within this window is suppressed
    pub dedup_window_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: 10_000,
        }
    }
}

impl NotificationConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory for widget.json and flags.json
    pub state_dir: Option<PathBuf>,
    /// Root prefix for /sys and /proc lookups
    pub sys_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            sys_root: PathBuf::from("/"),
        }
    }
}

impl MonitorConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(MonitorConfig::default());
        }

        let data = fs::read(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        if data.is_empty() {
            return Ok(MonitorConfig::default());
        }

        let config = serde_json::from_slice(&data).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable config {:?}: {}", config_path, e);
            MonitorConfig::default()
        });

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data = serde_json::to_vec_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(&config_path, data)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sampling.interval_ms == 0 {
            bail!("sampling.interval_ms must be greater than zero");
        }
        if self.sampling.reader_timeout_ms == Some(0) {
            bail!("sampling.reader_timeout_ms must be greater than zero");
        }
        if self.trend.window < 2 {
            bail!("trend.window must hold at least two samples");
        }
        if self.trend.min_samples < 2 || self.trend.min_samples > self.trend.window {
            bail!("trend.min_samples must be between 2 and trend.window");
        }
        if self.fps.window_ms == 0 || self.fps.target_hz <= 0.0 {
            bail!("fps.window_ms and fps.target_hz must be positive");
        }
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join(APP_DIR).join("config.json"))
    }

    /// Directory holding the persisted widget state and run flags
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.paths.state_dir {
            return Ok(dir.clone());
        }
        let data_dir =
            dirs::data_local_dir().with_context(|| "Could not determine data directory")?;
        Ok(data_dir.join(APP_DIR))
    }
}
