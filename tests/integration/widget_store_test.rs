use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

use devpulse::core::device_monitor::widget_state::{KEY_BATTERY, KEY_HEALTH_SCORE};
use devpulse::core::device_monitor::{MemoryNotifier, WidgetState};
use devpulse::core::kv_store::Record;
use devpulse::core::{JsonFileStore, KeyValueStore};
use devpulse::{PulseError, Result};

use super::support::{fast_config, harness, healthy_readers};

/// Store whose writes always fail, as with a full disk
struct ReadOnlyStore;

impl KeyValueStore for ReadOnlyStore {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value) -> Result<()> {
        Err(PulseError::store("read-only"))
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Err(PulseError::store("read-only"))
    }

    fn write_all(&self, _record: &Record) -> Result<()> {
        Err(PulseError::store("read-only"))
    }
}

#[tokio::test]
async fn test_widget_record_visible_to_other_readers() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("widget.json");
    let store = Arc::new(JsonFileStore::open(&path).unwrap());

    let h = harness(
        fast_config(1_000),
        healthy_readers(),
        store,
        Arc::new(MemoryNotifier::new()),
    );
    let report = h.service.run_single_cycle().await.unwrap();

    // A separate handle on the same file, as the widget renderer would open
    let renderer_view = JsonFileStore::open(&path).unwrap();
    let state = WidgetState::load(&renderer_view).unwrap();

    assert_eq!(state, report.widget_state());
    assert_eq!(state.ram, "3072 MB (38%) | CPU 1.50/2.40 GHz (4 cores)");
    assert_eq!(state.latency, "23 ms");
    assert!(renderer_view.contains(KEY_BATTERY));
    assert_eq!(renderer_view.get_i64(KEY_HEALTH_SCORE), Some(9));
}

#[tokio::test]
async fn test_second_cycle_overwrites_whole_record() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("widget.json");
    let store = Arc::new(JsonFileStore::open(&path).unwrap());

    let h = harness(
        fast_config(1_000),
        healthy_readers(),
        store.clone(),
        Arc::new(MemoryNotifier::new()),
    );

    let first = h.service.run_single_cycle().await.unwrap();
    let second = h.service.run_single_cycle().await.unwrap();
    assert!(second.timestamp_millis >= first.timestamp_millis);

    store.reload().unwrap();
    let state = WidgetState::load(store.as_ref()).unwrap();
    assert_eq!(state.last_update, second.timestamp_millis);
}

#[tokio::test]
async fn test_persistence_failure_does_not_block_notification() {
    let notifier = Arc::new(MemoryNotifier::new());
    let h = harness(
        fast_config(1_000),
        healthy_readers(),
        Arc::new(ReadOnlyStore),
        notifier.clone(),
    );

    let mut widget_updates = h.service.widget_updates();
    let report = h.service.run_single_cycle().await.unwrap();

    let posted = notifier.posted();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].body.starts_with("🔋 72%"));
    assert_eq!(report.failed_count(), 1);

    // Nothing was persisted, so no refresh was published
    assert!(!widget_updates.has_changed().unwrap());
    assert!(widget_updates.borrow_and_update().is_none());
}
