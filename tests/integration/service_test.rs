use std::sync::Arc;
use std::time::Duration;

use devpulse::core::device_monitor::widget_state::KEY_LAST_UPDATE;
use devpulse::core::device_monitor::{
    MemoryNotifier, MetricKind, ServiceState, WidgetState, ONGOING_NOTIFICATION_ID,
};
use devpulse::core::{KeyValueStore, MemoryStore};
use devpulse::PulseError;

use super::support::{
    fast_config, harness, healthy_readers, next_widget_update, Behavior, CountingStore,
    FlakyNotifier, ScriptedReader,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_is_idempotent() {
    let notifier = Arc::new(MemoryNotifier::new());
    let h = harness(
        fast_config(50),
        healthy_readers(),
        Arc::new(MemoryStore::new()),
        notifier.clone(),
    );

    for _ in 0..3 {
        h.service.start().await.unwrap();
    }

    assert_eq!(h.service.state(), ServiceState::Monitoring);
    assert_eq!(notifier.channels().len(), 1);
    assert!(h.flags.service_flagged_running());

    // Exactly one "initializing" notification, not one per start call
    let initializing = notifier
        .posted()
        .iter()
        .filter(|c| c.body.starts_with("Initializing"))
        .count();
    assert_eq!(initializing, 1);

    h.service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_repeated_start_runs_a_single_loop() {
    let store = Arc::new(CountingStore::default());
    let h = harness(
        fast_config(100),
        healthy_readers(),
        store.clone(),
        Arc::new(MemoryNotifier::new()),
    );

    for _ in 0..3 {
        h.service.start().await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(350)).await;
    h.service.stop().await.unwrap();

    // One write per interval: about 4 here, three loops would give about 12
    let writes = store.writes();
    assert!((2..=5).contains(&writes), "{} widget writes", writes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_loop_survives_failed_notification_updates() {
    // The initializing post and the first two cycles' posts are rejected
    let notifier = Arc::new(FlakyNotifier::failing_first(3));
    let store = Arc::new(MemoryStore::new());
    let h = harness(
        fast_config(30),
        healthy_readers(),
        store.clone(),
        notifier.clone(),
    );

    h.service.start().await.unwrap();
    next_widget_update(&h.service, Duration::from_secs(5)).await;
    let first = store.get_i64(KEY_LAST_UPDATE).unwrap();

    for _ in 0..4 {
        next_widget_update(&h.service, Duration::from_secs(5)).await;
    }
    let later = store.get_i64(KEY_LAST_UPDATE).unwrap();
    h.service.stop().await.unwrap();

    assert!(later > first);
    assert!(!notifier.inner.posted().is_empty());
    assert!(notifier
        .inner
        .posted()
        .iter()
        .all(|c| !c.body.starts_with("Initializing")));
}

#[tokio::test]
async fn test_failing_and_panicking_readers_still_write_full_record() {
    let store = Arc::new(MemoryStore::new());
    let readers = vec![
        ScriptedReader::new(MetricKind::Ram, Behavior::Value("3072 MB (38%)")),
        ScriptedReader::new(MetricKind::Cpu, Behavior::Fail),
        ScriptedReader::new(MetricKind::Thermal, Behavior::Panic),
        ScriptedReader::new(MetricKind::Latency, Behavior::Fail),
        ScriptedReader::new(MetricKind::DownloadSpeed, Behavior::Fail),
        ScriptedReader::new(MetricKind::UploadSpeed, Behavior::Value("12.10 Mbps")),
    ];
    let h = harness(
        fast_config(1_000),
        readers,
        store.clone(),
        Arc::new(MemoryNotifier::new()),
    );

    let report = h.service.run_single_cycle().await.unwrap();
    // Four readers plus FPS, which has no frames outside a running service
    assert_eq!(report.failed_count(), 5);

    let record = store.snapshot();
    assert_eq!(record.len(), 11);

    let state = WidgetState::load(store.as_ref()).unwrap();
    assert_eq!(state.cpu, "N/A");
    assert_eq!(state.thermal, "N/A");
    assert_eq!(state.latency, "");
    assert_eq!(state.download, "Failed");
    assert_eq!(state.upload, "12.10 Mbps");
    assert_eq!(state.ram, "3072 MB (38%) | CPU N/A");
    assert!(state.power.starts_with("2.00W"));
    assert_eq!(state.health_score, 9);
    assert_eq!(state.streak, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_prevents_further_writes() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let h = harness(
        fast_config(30),
        healthy_readers(),
        store.clone(),
        notifier.clone(),
    );

    h.service.start().await.unwrap();
    next_widget_update(&h.service, Duration::from_secs(5)).await;
    h.service.stop().await.unwrap();

    let last_update = store.get_i64(KEY_LAST_UPDATE).unwrap();
    let posted = notifier.posted().len();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(store.get_i64(KEY_LAST_UPDATE), Some(last_update));
    assert_eq!(notifier.posted().len(), posted);
    assert_eq!(notifier.cancelled(), vec![ONGOING_NOTIFICATION_ID]);
    assert_eq!(h.service.state(), ServiceState::Stopped);
    assert!(!h.flags.service_flagged_running());
}

#[tokio::test]
async fn test_channel_failure_is_fatal_at_startup() {
    let h = harness(
        fast_config(50),
        healthy_readers(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryNotifier::refusing_channels()),
    );

    let err = h.service.start().await.unwrap_err();
    assert!(matches!(err, PulseError::Startup(_)));
    assert_eq!(h.service.state(), ServiceState::Created);
    assert!(!h.flags.service_flagged_running());
}

#[tokio::test]
async fn test_cycle_updates_ongoing_notification() {
    let notifier = Arc::new(MemoryNotifier::new());
    let h = harness(
        fast_config(1_000),
        healthy_readers(),
        Arc::new(MemoryStore::new()),
        notifier.clone(),
    );

    h.service.run_single_cycle().await.unwrap();

    let posted = notifier.posted();
    let last = posted.last().unwrap();
    assert_eq!(last.id, ONGOING_NOTIFICATION_ID);
    assert!(last.ongoing);
    assert_eq!(last.tap_action, "open_dashboard");

    let lines: Vec<_> = last.body.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[2], "🌐 ↓ 45.20 Mbps ↑ 12.10 Mbps | Ping 23 ms");
    // No frames were reported outside a running service
    assert_eq!(lines[3], "🎮 N/A");
}

#[tokio::test]
async fn test_report_never_claims_estimates() {
    let h = harness(
        fast_config(1_000),
        healthy_readers(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryNotifier::new()),
    );

    let report = h.service.run_single_cycle().await.unwrap();
    let json = serde_json::to_string(&report).unwrap().to_lowercase();

    for word in ["estimated", "simulated", "fake"] {
        assert!(!json.contains(word), "report mentions {:?}", word);
    }
    assert!(report
        .snapshot
        .components
        .iter()
        .all(|c| c.power_consumption_watts >= 0.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_frames_reach_the_summary() {
    let mut config = fast_config(1_000);
    config.fps.window_ms = 50;
    let h = harness(
        config,
        healthy_readers(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryNotifier::new()),
    );

    h.service.start().await.unwrap();
    let reporter = h.service.frame_reporter().unwrap();
    let frames = tokio::spawn(async move {
        loop {
            reporter.frame_presented(tokio::time::Instant::now());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let report = h.service.run_single_cycle().await.unwrap();
    assert!(report.samples[&MetricKind::Fps].succeeded);
    assert!(report.text(MetricKind::Fps).contains("FPS"));

    frames.abort();
    h.service.stop().await.unwrap();
}
