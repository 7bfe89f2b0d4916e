use serde::{Deserialize, Serialize};

/// Which reader produced a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    Ram,
    Cpu,
    Battery,
    Thermal,
    Latency,
    DownloadSpeed,
    UploadSpeed,
    Fps,
}

impl MetricKind {
    /// Text shown in place of a value the reader could not measure.
    ///
    /// Latency reports "no data" as an empty string.
    pub fn failure_text(&self) -> &'static str {
        match self {
            MetricKind::Latency => "",
            MetricKind::DownloadSpeed | MetricKind::UploadSpeed => "Failed",
            _ => "N/A",
        }
    }
}

/// One reader's result for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub kind: MetricKind,
    pub formatted_text: String,
    pub succeeded: bool,
}

impl MetricSample {
    pub fn success(kind: MetricKind, formatted_text: impl Into<String>) -> Self {
        Self {
            kind,
            formatted_text: formatted_text.into(),
            succeeded: true,
        }
    }

    pub fn failure(kind: MetricKind) -> Self {
        Self {
            kind,
            formatted_text: kind.failure_text().to_string(),
            succeeded: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryState {
    Charging,
    Discharging,
    Full,
    NotCharging,
    #[default]
    Unknown,
}

impl BatteryState {
    pub fn label(&self) -> &'static str {
        match self {
            BatteryState::Charging => "Charging",
            BatteryState::Discharging => "Discharging",
            BatteryState::Full => "Full",
            BatteryState::NotCharging => "Not charging",
            BatteryState::Unknown => "Unknown",
        }
    }
}

/// Raw electrical battery values, the sole input of the power aggregator.
///
/// Current follows the handset convention: negative while discharging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    pub capacity_percent: Option<u8>,
    pub current_ua: Option<i64>,
    pub voltage_mv: Option<u32>,
    pub charge_counter_uah: Option<i64>,
    pub state: BatteryState,
}

/// What the hardware subsystems are doing right now, used to split the
/// measured total across components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsystemActivity {
    /// Backlight level 0.0..=1.0, `None` when the display is off or unknown
    pub display_brightness: Option<f32>,
    pub camera_active: bool,
    pub wifi_active: bool,
    /// Global CPU usage 0.0..=100.0
    pub cpu_load_percent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerComponentReading {
    pub component: String,
    pub power_consumption_watts: f64,
    pub status: String,
    pub details: String,
    pub icon: String,
}

/// Immutable aggregated power reading for one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerSnapshot {
    pub total_power_watts: f64,
    pub components: Vec<PowerComponentReading>,
    pub timestamp_millis: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerTrend {
    Increasing,
    Decreasing,
    Stable,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPowerStats {
    pub power_trend: PowerTrend,
    pub average_power_watts: f64,
    pub peak_power_watts: f64,
    pub sample_count: usize,
}

/// Latest frame-rate summary pushed by the FPS producer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FpsSummary {
    pub fps: f64,
    pub dropped_frames: u32,
    pub drop_rate_percent: f64,
}
