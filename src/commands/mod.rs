// Command handlers module
pub mod config;
pub mod flags;
pub mod monitor;
pub mod status;
pub mod version;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::core::device_monitor::{DailyHealthTracker, LogNotifier, MonitorService, ReaderSet};
use crate::core::{JsonFileStore, KeyValueStore, MonitorConfig, RunFlags};

// Re-exports for cleaner imports
pub use version::execute as version;

const WIDGET_FILE: &str = "widget.json";
const FLAGS_FILE: &str = "flags.json";

/// File-backed stores shared by every command
pub struct StateStores {
    pub widget: Arc<dyn KeyValueStore>,
    pub flags: Arc<dyn KeyValueStore>,
}

impl StateStores {
    pub fn open(config: &MonitorConfig) -> Result<Self> {
        let dir = config.state_dir()?;
        let widget = JsonFileStore::open(dir.join(WIDGET_FILE))
            .with_context(|| format!("Failed to open widget state in {:?}", dir))?;
        let flags = JsonFileStore::open(dir.join(FLAGS_FILE))
            .with_context(|| format!("Failed to open run flags in {:?}", dir))?;

        Ok(Self {
            widget: Arc::new(widget),
            flags: Arc::new(flags),
        })
    }

    pub fn run_flags(&self) -> RunFlags {
        RunFlags::new(Arc::clone(&self.flags))
    }
}

/// Wire the service to this host's readers and the file stores.
///
/// Must be called from within the Tokio runtime.
pub(crate) fn build_service(config: &MonitorConfig, stores: &StateStores) -> Result<MonitorService> {
    let readers = ReaderSet::from_config(config).context("Failed to set up metric readers")?;

    Ok(MonitorService::new(
        config.clone(),
        readers,
        Arc::clone(&stores.widget),
        stores.run_flags(),
        Arc::new(LogNotifier::new()),
        Arc::new(DailyHealthTracker::new(Arc::clone(&stores.flags))),
    ))
}

pub(crate) fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .thread_name("devpulse-worker")
        .build()
        .context("Failed to start async runtime")
}
