//! Metric readers.
//!
//! Each reader performs one real measurement against one data source and knows
//! nothing about the sampling cadence. Readers report failure through `Err`;
//! the sampling loop turns that into a failure-marked sample.

mod activity;
mod battery;
mod cpu;
mod latency;
mod memory;
mod thermal;

pub use activity::LinuxActivitySource;
pub use battery::{default_battery_source, format_battery, BatteryCrateSource, SysfsBatterySource};
pub use cpu::CpuFrequencyReader;
pub use latency::{parse_ping_rtt, LatencyReader};
pub use memory::RamReader;
pub use speed_test::{throughput_mbps, SpeedTestReader, TransferDirection};
pub use thermal::{ThermalLevel, ThermalReader};

use async_trait::async_trait;
use std::sync::Arc;

use super::metrics::{BatteryReading, MetricKind, SubsystemActivity};
use crate::core::config::MonitorConfig;
use crate::error::Result;

/// A single-metric reader returning already formatted, unit-suffixed text.
#[async_trait]
pub trait MetricReader: Send + Sync {
    fn kind(&self) -> MetricKind;

    async fn read(&self) -> Result<String>;
}

/// Platform battery API
pub trait BatterySource: Send + Sync {
    fn read(&self) -> Result<BatteryReading>;
}

/// Platform view of which subsystems are active
pub trait ActivitySource: Send + Sync {
    fn sample(&self) -> SubsystemActivity;
}

/// Everything the sampling loop fans out to in one cycle
#[derive(Clone)]
pub struct ReaderSet {
    pub metrics: Vec<Arc<dyn MetricReader>>,
    pub battery: Arc<dyn BatterySource>,
    pub activity: Arc<dyn ActivitySource>,
}

impl ReaderSet {
    /// Real readers for this host
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        let sys_root = config.paths.sys_root.clone();
        let network = &config.network;

        let client = reqwest::Client::builder()
            .timeout(config.sampling.reader_timeout())
            .build()?;

        let metrics: Vec<Arc<dyn MetricReader>> = vec![
            Arc::new(RamReader::new()),
            Arc::new(CpuFrequencyReader::new(&sys_root)),
            Arc::new(ThermalReader::new(&sys_root)),
            Arc::new(LatencyReader::new(
                network.ping_host.clone(),
                network.ping_timeout_secs,
            )),
            Arc::new(SpeedTestReader::new(
                client.clone(),
                TransferDirection::Download,
                network.resolved_download_url(),
                network.download_bytes,
            )),
            Arc::new(SpeedTestReader::new(
                client,
                TransferDirection::Upload,
                network.upload_url.clone(),
                network.upload_bytes,
            )),
        ];

        Ok(Self {
            metrics,
            battery: default_battery_source(&sys_root),
            activity: Arc::new(LinuxActivitySource::new(&sys_root)),
        })
    }
}
