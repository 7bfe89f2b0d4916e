//! Record the sampling loop persists for out-of-process display surfaces.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::core::kv_store::{KeyValueStore, Record};
use crate::error::Result;

pub const KEY_BATTERY: &str = "battery";
pub const KEY_RAM: &str = "ram";
pub const KEY_CPU: &str = "cpu";
pub const KEY_DOWNLOAD: &str = "download";
pub const KEY_UPLOAD: &str = "upload";
pub const KEY_LATENCY: &str = "latency";
pub const KEY_POWER: &str = "power";
pub const KEY_THERMAL: &str = "thermal";
pub const KEY_HEALTH_SCORE: &str = "health_score";
pub const KEY_STREAK: &str = "streak";
pub const KEY_LAST_UPDATE: &str = "last_update";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetState {
    pub battery: String,
    /// RAM plus CPU summary
    pub ram: String,
    pub cpu: String,
    pub download: String,
    pub upload: String,
    /// Empty when no echo reply was received
    pub latency: String,
    pub power: String,
    pub thermal: String,
    pub health_score: u8,
    pub streak: u32,
    /// Wall-clock millis of the cycle that wrote this record
    pub last_update: i64,
}

impl WidgetState {
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(KEY_BATTERY.into(), Value::from(self.battery.clone()));
        record.insert(KEY_RAM.into(), Value::from(self.ram.clone()));
        record.insert(KEY_CPU.into(), Value::from(self.cpu.clone()));
        record.insert(KEY_DOWNLOAD.into(), Value::from(self.download.clone()));
        record.insert(KEY_UPLOAD.into(), Value::from(self.upload.clone()));
        record.insert(KEY_LATENCY.into(), Value::from(self.latency.clone()));
        record.insert(KEY_POWER.into(), Value::from(self.power.clone()));
        record.insert(KEY_THERMAL.into(), Value::from(self.thermal.clone()));
        record.insert(KEY_HEALTH_SCORE.into(), Value::from(self.health_score));
        record.insert(KEY_STREAK.into(), Value::from(self.streak));
        record.insert(KEY_LAST_UPDATE.into(), Value::from(self.last_update));
        record
    }

    /// Whole-record overwrite; every key is written in one store update.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.write_all(&self.to_record())
    }

    /// Read the last persisted record, `None` if no cycle ever wrote one.
    pub fn load(store: &dyn KeyValueStore) -> Option<Self> {
        let last_update = store.get_i64(KEY_LAST_UPDATE)?;
        let text = |key: &str| store.get_string(key).unwrap_or_default();

        Some(Self {
            battery: text(KEY_BATTERY),
            ram: text(KEY_RAM),
            cpu: text(KEY_CPU),
            download: text(KEY_DOWNLOAD),
            upload: text(KEY_UPLOAD),
            latency: text(KEY_LATENCY),
            power: text(KEY_POWER),
            thermal: text(KEY_THERMAL),
            health_score: store
                .get_i64(KEY_HEALTH_SCORE)
                .map(|v| v.clamp(0, 10) as u8)
                .unwrap_or(0),
            streak: store
                .get_i64(KEY_STREAK)
                .map(|v| v.max(0) as u32)
                .unwrap_or(0),
            last_update,
        })
    }

    /// Staleness is inferred from the timestamp; records never expire.
    pub fn is_stale(&self, now_millis: i64, max_age: Duration) -> bool {
        now_millis.saturating_sub(self.last_update) > max_age.as_millis() as i64
    }
}
