// Core business logic module

pub mod config;
pub mod device_monitor;
pub mod kv_store;
pub mod run_flags;

// Re-export commonly used items
pub use config::MonitorConfig;
pub use kv_store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use run_flags::RunFlags;
