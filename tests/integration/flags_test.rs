use chrono::NaiveDate;
use std::process::{Child, Command};
use std::sync::Arc;
use tempfile::TempDir;

use devpulse::core::device_monitor::{DailyHealthTracker, MemoryNotifier, ServiceState};
use devpulse::core::device_monitor::health::{HealthInputs, ScoreProvider};
use devpulse::core::device_monitor::PowerTrend;
use devpulse::core::{JsonFileStore, MemoryStore, RunFlags};
use devpulse::PulseError;

use super::support::{fast_config, harness, healthy_readers};

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn test_flags_persist_across_processes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("flags.json");

    {
        let flags = RunFlags::new(Arc::new(JsonFileStore::open(&path).unwrap()));
        flags.set_user_enabled_monitoring(true).unwrap();
        flags.set_do_not_ask_again(true).unwrap();
        flags.set_is_first_run(false).unwrap();
    }

    let flags = RunFlags::new(Arc::new(JsonFileStore::open(&path).unwrap()));
    assert!(flags.user_enabled_monitoring());
    assert!(flags.do_not_ask_again());
    assert!(!flags.is_first_run());
    assert!(!flags.service_flagged_running());
}

fn spawn_sleeper() -> Child {
    Command::new("sleep").arg("30").spawn().unwrap()
}

#[test]
fn test_stale_flag_from_killed_process() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("flags.json");
    let mut monitor = spawn_sleeper();

    // Another process is monitoring
    RunFlags::new(Arc::new(JsonFileStore::open(&path).unwrap()))
        .mark_running(monitor.id())
        .unwrap();

    let flags = RunFlags::new(Arc::new(JsonFileStore::open(&path).unwrap()));
    assert!(flags.reconcile_running(None).unwrap());
    assert_eq!(flags.service_pid(), Some(monitor.id()));

    // ...and gets killed without a chance to clear its flag
    monitor.kill().unwrap();
    monitor.wait().unwrap();

    let flags = RunFlags::new(Arc::new(JsonFileStore::open(&path).unwrap()));
    assert!(!flags.reconcile_running(None).unwrap());
    assert!(!flags.service_flagged_running());
    assert_eq!(flags.service_pid(), None);
}

#[test]
fn test_live_state_overrides_durable_flag() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("flags.json");
    let flags = RunFlags::new(Arc::new(JsonFileStore::open(&path).unwrap()));
    flags.mark_running(std::process::id()).unwrap();

    assert!(!flags.reconcile_running(Some(ServiceState::Created)).unwrap());
    assert!(!flags.service_flagged_running());
}

#[tokio::test]
async fn test_start_refused_while_another_process_monitors() {
    let mut other = spawn_sleeper();
    let h = harness(
        fast_config(1_000),
        healthy_readers(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryNotifier::new()),
    );
    h.flags.mark_running(other.id()).unwrap();

    let err = h.service.start().await.unwrap_err();
    assert!(matches!(err, PulseError::Startup(_)));
    assert_eq!(h.service.state(), ServiceState::Created);
    assert_eq!(h.flags.service_pid(), Some(other.id()));

    other.kill().unwrap();
    other.wait().unwrap();

    // The owner is gone, so this process may take over
    h.service.start().await.unwrap();
    assert_eq!(h.flags.service_pid(), Some(std::process::id()));
    h.service.stop().await.unwrap();
    assert_eq!(h.flags.service_pid(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_live_state_drives_running_flag() {
    let h = harness(
        fast_config(1_000),
        healthy_readers(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryNotifier::new()),
    );

    h.service.start().await.unwrap();
    assert!(h.flags.reconcile_running(Some(h.service.state())).unwrap());

    h.service.stop().await.unwrap();
    assert!(!h.flags.reconcile_running(Some(h.service.state())).unwrap());
    assert!(!h.flags.service_flagged_running());
}

#[test]
fn test_streak_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("flags.json");
    let inputs = HealthInputs {
        battery_percent: Some(90),
        power_trend: PowerTrend::Stable,
        alerts: &[],
        failed_readers: 0,
    };

    let tracker = DailyHealthTracker::new(Arc::new(JsonFileStore::open(&path).unwrap()));
    assert_eq!(tracker.score(&inputs, day("2026-05-10")).streak, 1);
    assert_eq!(tracker.score(&inputs, day("2026-05-11")).streak, 2);

    let tracker = DailyHealthTracker::new(Arc::new(JsonFileStore::open(&path).unwrap()));
    let score = tracker.score(&inputs, day("2026-05-12"));
    assert_eq!(score.streak, 3);
    assert_eq!(score.score, 10);
}
