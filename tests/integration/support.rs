//! Scripted readers and sources for driving the service without hardware.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devpulse::core::device_monitor::health::HealthInputs;
use devpulse::core::device_monitor::notification::ChannelSpec;
use devpulse::core::device_monitor::{
    ActivitySource, BatteryReading, BatterySource, BatteryState, HealthScore, MetricKind,
    MemoryNotifier, MetricReader, MonitorService, NotificationContent, Notifier, ReaderSet,
    ScoreProvider, SubsystemActivity,
};
use devpulse::core::kv_store::Record;
use devpulse::core::{KeyValueStore, MemoryStore, MonitorConfig, RunFlags};
use devpulse::{PulseError, Result};

pub enum Behavior {
    Value(&'static str),
    Fail,
    Panic,
}

pub struct ScriptedReader {
    kind: MetricKind,
    behavior: Behavior,
}

impl ScriptedReader {
    pub fn new(kind: MetricKind, behavior: Behavior) -> Arc<dyn MetricReader> {
        Arc::new(Self { kind, behavior })
    }
}

#[async_trait]
impl MetricReader for ScriptedReader {
    fn kind(&self) -> MetricKind {
        self.kind
    }

    async fn read(&self) -> Result<String> {
        match self.behavior {
            Behavior::Value(text) => Ok(text.to_string()),
            Behavior::Fail => Err(PulseError::reader("sensor offline")),
            Behavior::Panic => panic!("reader blew up"),
        }
    }
}

pub struct StaticBattery {
    pub voltage_mv: u32,
    pub current_ua: i64,
}

impl BatterySource for StaticBattery {
    fn read(&self) -> Result<BatteryReading> {
        Ok(BatteryReading {
            capacity_percent: Some(72),
            current_ua: Some(self.current_ua),
            voltage_mv: Some(self.voltage_mv),
            charge_counter_uah: None,
            state: BatteryState::Discharging,
        })
    }
}

pub struct StaticActivity;

impl ActivitySource for StaticActivity {
    fn sample(&self) -> SubsystemActivity {
        SubsystemActivity {
            display_brightness: Some(0.5),
            camera_active: false,
            wifi_active: true,
            cpu_load_percent: 35.0,
        }
    }
}

pub struct FixedScore;

impl ScoreProvider for FixedScore {
    fn score(&self, _inputs: &HealthInputs<'_>, _today: NaiveDate) -> HealthScore {
        HealthScore { score: 9, streak: 4 }
    }
}

/// Memory store that counts whole-record writes
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for CountingStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }

    fn write_all(&self, record: &Record) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_all(record)
    }
}

/// Notifier whose first `failures` posts are rejected
pub struct FlakyNotifier {
    pub inner: MemoryNotifier,
    failures: AtomicUsize,
}

impl FlakyNotifier {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            inner: MemoryNotifier::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}

impl Notifier for FlakyNotifier {
    fn channel_exists(&self, channel_id: &str) -> bool {
        self.inner.channel_exists(channel_id)
    }

    fn create_channel(&self, channel: &ChannelSpec) -> Result<()> {
        self.inner.create_channel(channel)
    }

    fn post(&self, content: &NotificationContent) -> Result<()> {
        let remaining = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(PulseError::notification("notification service unavailable"));
        }
        self.inner.post(content)
    }

    fn cancel(&self, id: u32) -> Result<()> {
        self.inner.cancel(id)
    }
}

pub fn healthy_readers() -> Vec<Arc<dyn MetricReader>> {
    vec![
        ScriptedReader::new(MetricKind::Ram, Behavior::Value("3072 MB (38%)")),
        ScriptedReader::new(MetricKind::Cpu, Behavior::Value("1.50/2.40 GHz (4 cores)")),
        ScriptedReader::new(MetricKind::Thermal, Behavior::Value("Normal (41.0°C)")),
        ScriptedReader::new(MetricKind::Latency, Behavior::Value("23 ms")),
        ScriptedReader::new(MetricKind::DownloadSpeed, Behavior::Value("45.20 Mbps")),
        ScriptedReader::new(MetricKind::UploadSpeed, Behavior::Value("12.10 Mbps")),
    ]
}

pub fn fast_config(interval_ms: u64) -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.sampling.interval_ms = interval_ms;
    config.sampling.reader_timeout_ms = Some(500);
    config.notification.dedup_window_ms = 0;
    config
}

pub struct Harness {
    pub service: MonitorService,
    pub flags: RunFlags,
}

pub fn harness(
    config: MonitorConfig,
    metrics: Vec<Arc<dyn MetricReader>>,
    widget_store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
) -> Harness {
    let flags = RunFlags::new(Arc::new(MemoryStore::new()));
    let readers = ReaderSet {
        metrics,
        battery: Arc::new(StaticBattery {
            voltage_mv: 4000,
            current_ua: -500_000,
        }),
        activity: Arc::new(StaticActivity),
    };
    let service = MonitorService::new(
        config,
        readers,
        widget_store,
        flags.clone(),
        notifier,
        Arc::new(FixedScore),
    );

    Harness { service, flags }
}

/// Wait for the next persisted widget record, failing the test after `limit`
pub async fn next_widget_update(service: &MonitorService, limit: Duration) {
    let mut updates = service.widget_updates();
    tokio::time::timeout(limit, updates.changed())
        .await
        .expect("no widget update in time")
        .expect("widget channel closed");
}
