//! Power consumption aggregator.
//!
//! Converts raw battery electrical readings into a per-component breakdown and
//! keeps the rolling trend. The measured total is the only power figure; the
//! components are shares of it, weighted by what each subsystem is doing.

use std::sync::Arc;
use tokio::sync::watch;

use super::history::PowerHistory;
use super::metrics::{
    AggregatedPowerStats, BatteryReading, PowerComponentReading, PowerSnapshot, SubsystemActivity,
};
use crate::core::config::TrendConfig;

pub const COMPONENT_CPU: &str = "CPU";
pub const COMPONENT_DISPLAY: &str = "Display";
pub const COMPONENT_CAMERA: &str = "Camera";
pub const COMPONENT_WIFI: &str = "WiFi";
pub const COMPONENT_SYSTEM: &str = "System";

// Relative attribution weights
const CPU_BASE_WEIGHT: f64 = 0.15;
const CPU_LOAD_WEIGHT: f64 = 0.45;
const DISPLAY_WEIGHT: f64 = 0.40;
const CAMERA_WEIGHT: f64 = 0.30;
const WIFI_WEIGHT: f64 = 0.10;
const SYSTEM_WEIGHT: f64 = 0.10;

/// Instantaneous power in watts from millivolts and microamps.
pub fn total_power_watts(voltage_mv: u32, current_ua: i64) -> f64 {
    (voltage_mv as f64 / 1000.0) * (current_ua.unsigned_abs() as f64 / 1_000_000.0)
}

/// Latest aggregator output, published to subscribers after every ingest
#[derive(Debug, Clone, Default)]
pub struct PowerUpdate {
    pub snapshot: Arc<PowerSnapshot>,
    pub stats: AggregatedPowerStats,
}

/// Single-writer aggregator driven once per cycle by the sampling loop
pub struct PowerAggregator {
    history: PowerHistory,
    stats: AggregatedPowerStats,
    last_timestamp: i64,
    updates_tx: watch::Sender<PowerUpdate>,
}

impl PowerAggregator {
    pub fn new(config: &TrendConfig) -> Self {
        let (updates_tx, _) = watch::channel(PowerUpdate::default());
        Self {
            history: PowerHistory::new(config),
            stats: AggregatedPowerStats::default(),
            last_timestamp: 0,
            updates_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PowerUpdate> {
        self.updates_tx.subscribe()
    }

    pub fn stats(&self) -> &AggregatedPowerStats {
        &self.stats
    }

    /// Build this cycle's snapshot and replace the rolling stats.
    pub fn ingest(
        &mut self,
        battery: &BatteryReading,
        activity: &SubsystemActivity,
        now_millis: i64,
    ) -> Arc<PowerSnapshot> {
        let timestamp_millis = now_millis.max(self.last_timestamp);
        self.last_timestamp = timestamp_millis;

        let snapshot = match (battery.voltage_mv, battery.current_ua) {
            (Some(voltage_mv), Some(current_ua)) => {
                let total = total_power_watts(voltage_mv, current_ua);
                self.history.push(total);
                PowerSnapshot {
                    total_power_watts: total,
                    components: attribute_components(total, activity),
                    timestamp_millis,
                }
            }
            _ => {
                log::debug!("Battery voltage/current unavailable, power breakdown skipped");
                PowerSnapshot {
                    total_power_watts: 0.0,
                    components: unavailable_components(),
                    timestamp_millis,
                }
            }
        };

        self.stats = AggregatedPowerStats {
            power_trend: self.history.trend(),
            average_power_watts: self.history.average(),
            peak_power_watts: self.history.peak(),
            sample_count: self.history.len(),
        };

        let snapshot = Arc::new(snapshot);
        // send_replace never fails, even with no subscribers
        self.updates_tx.send_replace(PowerUpdate {
            snapshot: Arc::clone(&snapshot),
            stats: self.stats.clone(),
        });

        snapshot
    }
}

fn attribute_components(total: f64, activity: &SubsystemActivity) -> Vec<PowerComponentReading> {
    let load = (activity.cpu_load_percent as f64 / 100.0).clamp(0.0, 1.0);
    let brightness = activity
        .display_brightness
        .map(|b| (b as f64).clamp(0.0, 1.0));

    let cpu_weight = CPU_BASE_WEIGHT + CPU_LOAD_WEIGHT * load;
    let display_weight = brightness.map(|b| DISPLAY_WEIGHT * (0.3 + 0.7 * b)).unwrap_or(0.0);
    let camera_weight = if activity.camera_active { CAMERA_WEIGHT } else { 0.0 };
    let wifi_weight = if activity.wifi_active { WIFI_WEIGHT } else { 0.0 };

    let weight_sum = cpu_weight + display_weight + camera_weight + wifi_weight + SYSTEM_WEIGHT;
    let share = |weight: f64| total * weight / weight_sum;

    let cpu = share(cpu_weight);
    let display = share(display_weight);
    let camera = share(camera_weight);
    let wifi = share(wifi_weight);
    // Remainder keeps the sum equal to the measured total
    let system = (total - cpu - display - camera - wifi).max(0.0);

    vec![
        component(
            COMPONENT_CPU,
            cpu,
            format!("{:.0}% load", load * 100.0),
            "Share of measured draw by CPU load".to_string(),
            "cpu",
        ),
        component(
            COMPONENT_DISPLAY,
            display,
            match brightness {
                Some(b) => format!("On ({:.0}% brightness)", b * 100.0),
                None => "Off".to_string(),
            },
            "Share of measured draw by backlight level".to_string(),
            "display",
        ),
        component(
            COMPONENT_CAMERA,
            camera,
            if activity.camera_active { "Active" } else { "Idle" }.to_string(),
            "Video capture device held open".to_string(),
            "camera",
        ),
        component(
            COMPONENT_WIFI,
            wifi,
            if activity.wifi_active { "Active" } else { "Idle" }.to_string(),
            "Wireless interface traffic".to_string(),
            "wifi",
        ),
        component(
            COMPONENT_SYSTEM,
            system,
            "Baseline".to_string(),
            format!("Measured total {:.2} W", total),
            "battery",
        ),
    ]
}

fn unavailable_components() -> Vec<PowerComponentReading> {
    [
        (COMPONENT_CPU, "cpu"),
        (COMPONENT_DISPLAY, "display"),
        (COMPONENT_CAMERA, "camera"),
        (COMPONENT_WIFI, "wifi"),
        (COMPONENT_SYSTEM, "battery"),
    ]
    .into_iter()
    .map(|(name, icon)| {
        component(
            name,
            0.0,
            "Unavailable".to_string(),
            "Battery voltage or current not reported".to_string(),
            icon,
        )
    })
    .collect()
}

fn component(
    name: &str,
    watts: f64,
    status: String,
    details: String,
    icon: &str,
) -> PowerComponentReading {
    PowerComponentReading {
        component: name.to_string(),
        power_consumption_watts: watts.max(0.0),
        status,
        details,
        icon: icon.to_string(),
    }
}
