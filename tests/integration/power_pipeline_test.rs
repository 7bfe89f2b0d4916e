use devpulse::core::config::TrendConfig;
use devpulse::core::device_monitor::{
    compose_summary, evaluate_power_alerts, total_power_watts, AlertSeverity, BatteryReading,
    BatteryState, PowerAggregator, PowerAlertConfig, PowerTrend, SubsystemActivity,
};

fn discharging(voltage_mv: u32, current_ua: i64) -> BatteryReading {
    BatteryReading {
        capacity_percent: Some(64),
        current_ua: Some(current_ua),
        voltage_mv: Some(voltage_mv),
        charge_counter_uah: Some(2_400_000),
        state: BatteryState::Discharging,
    }
}

fn screen_on() -> SubsystemActivity {
    SubsystemActivity {
        display_brightness: Some(0.8),
        camera_active: false,
        wifi_active: true,
        cpu_load_percent: 20.0,
    }
}

fn run_series(currents_ua: &[i64]) -> PowerTrend {
    let mut aggregator = PowerAggregator::new(&TrendConfig::default());
    for (i, current) in currents_ua.iter().enumerate() {
        aggregator.ingest(&discharging(4000, *current), &screen_on(), i as i64 * 30_000);
    }
    aggregator.stats().power_trend
}

#[test]
fn test_reference_reading_is_two_watts() {
    let mut aggregator = PowerAggregator::new(&TrendConfig::default());
    let snapshot = aggregator.ingest(&discharging(4000, -500_000), &screen_on(), 1_000);

    assert!((snapshot.total_power_watts - 2.0).abs() < 1e-9);
    assert!((total_power_watts(4000, 500_000) - 2.0).abs() < 1e-9);
}

#[test]
fn test_total_matches_voltage_times_current() {
    let mut aggregator = PowerAggregator::new(&TrendConfig::default());
    for (voltage_mv, current_ua) in [(3700, -1_350_000), (4350, -80_000), (3900, 900_000)] {
        let snapshot = aggregator.ingest(&discharging(voltage_mv, current_ua), &screen_on(), 0);
        let expected = (voltage_mv as f64 / 1000.0) * (current_ua.abs() as f64 / 1e6);
        assert!((snapshot.total_power_watts - expected).abs() < 1e-9);

        let sum: f64 = snapshot
            .components
            .iter()
            .map(|c| c.power_consumption_watts)
            .sum();
        assert!((sum - expected).abs() < 1e-6);
    }
}

#[test]
fn test_trend_is_deterministic() {
    let rising = [-300_000, -320_000, -310_000, -600_000, -650_000, -700_000];
    assert_eq!(run_series(&rising), PowerTrend::Increasing);
    assert_eq!(run_series(&rising), run_series(&rising));

    let falling = [-900_000, -880_000, -870_000, -400_000, -380_000, -350_000];
    assert_eq!(run_series(&falling), PowerTrend::Decreasing);

    let flat = [-500_000; 6];
    assert_eq!(run_series(&flat), PowerTrend::Stable);

    assert_eq!(run_series(&[-500_000, -900_000]), PowerTrend::Unknown);
}

#[test]
fn test_stats_update_before_alert_evaluation() {
    let mut aggregator = PowerAggregator::new(&TrendConfig::default());
    let config = PowerAlertConfig::default();

    // 4.2 V at 3 A is 12.6 W, well over the 8 W total ceiling
    let snapshot = aggregator.ingest(&discharging(4200, -3_000_000), &screen_on(), 0);
    let alerts = evaluate_power_alerts(&snapshot, aggregator.stats(), &config);

    assert_eq!(aggregator.stats().sample_count, 1);
    assert!((aggregator.stats().peak_power_watts - 12.6).abs() < 1e-9);
    assert!(alerts
        .iter()
        .any(|a| a.component.is_none() && a.severity >= AlertSeverity::Warning));
}

#[test]
fn test_quiet_device_raises_no_alerts() {
    let mut aggregator = PowerAggregator::new(&TrendConfig::default());
    let snapshot = aggregator.ingest(&discharging(3800, -250_000), &screen_on(), 0);
    let alerts =
        evaluate_power_alerts(&snapshot, aggregator.stats(), &PowerAlertConfig::default());
    assert!(alerts.is_empty());
}

#[test]
fn test_summary_shape_without_reader_samples() {
    use devpulse::core::device_monitor::{CycleReport, HealthScore};
    use std::collections::HashMap;
    use std::sync::Arc;

    let mut aggregator = PowerAggregator::new(&TrendConfig::default());
    let snapshot = aggregator.ingest(&discharging(4000, -500_000), &screen_on(), 0);
    let report = CycleReport {
        samples: HashMap::new(),
        battery: None,
        snapshot: Arc::clone(&snapshot),
        stats: aggregator.stats().clone(),
        alerts: Vec::new(),
        health: HealthScore { score: 10, streak: 1 },
        timestamp_millis: snapshot.timestamp_millis,
    };
    let summary = compose_summary(&report);
    assert_eq!(summary.lines().count(), 6);
    assert!(summary.contains("🔋 N/A"));
    assert!(summary.ends_with("⚡ 2.00W ?"));
}
