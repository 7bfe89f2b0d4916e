//! Cycle report and the fixed-order summary composed from it.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::alerts::{has_critical, PowerAlert};
use super::health::HealthScore;
use super::metrics::{
    AggregatedPowerStats, BatteryReading, MetricKind, MetricSample, PowerSnapshot, PowerTrend,
};
use super::widget_state::WidgetState;

const CRITICAL_MARKER: &str = "⚠";
const NO_LATENCY: &str = "--";

/// Everything one cycle produced, in the order it was joined
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub samples: HashMap<MetricKind, MetricSample>,
    pub battery: Option<BatteryReading>,
    pub snapshot: Arc<PowerSnapshot>,
    pub stats: AggregatedPowerStats,
    pub alerts: Vec<PowerAlert>,
    pub health: HealthScore,
    pub timestamp_millis: i64,
}

impl CycleReport {
    /// Text for `kind`, or its failure marker when the reader did not report
    pub fn text(&self, kind: MetricKind) -> String {
        self.samples
            .get(&kind)
            .map(|s| s.formatted_text.clone())
            .unwrap_or_else(|| kind.failure_text().to_string())
    }

    pub fn failed_count(&self) -> usize {
        self.samples.values().filter(|s| !s.succeeded).count()
    }

    pub fn ram_cpu_text(&self) -> String {
        format!(
            "{} | CPU {}",
            self.text(MetricKind::Ram),
            self.text(MetricKind::Cpu)
        )
    }

    pub fn power_text(&self) -> String {
        let mut text = format!(
            "{:.2}W {}",
            self.snapshot.total_power_watts,
            trend_glyph(self.stats.power_trend)
        );
        if has_critical(&self.alerts) {
            text.push(' ');
            text.push_str(CRITICAL_MARKER);
        }
        text
    }

    pub fn widget_state(&self) -> WidgetState {
        WidgetState {
            battery: self.text(MetricKind::Battery),
            ram: self.ram_cpu_text(),
            cpu: self.text(MetricKind::Cpu),
            download: self.text(MetricKind::DownloadSpeed),
            upload: self.text(MetricKind::UploadSpeed),
            latency: self.text(MetricKind::Latency),
            power: self.power_text(),
            thermal: self.text(MetricKind::Thermal),
            health_score: self.health.score,
            streak: self.health.streak,
            last_update: self.timestamp_millis,
        }
    }
}

pub fn trend_glyph(trend: PowerTrend) -> &'static str {
    match trend {
        PowerTrend::Increasing => "↑",
        PowerTrend::Decreasing => "↓",
        PowerTrend::Stable => "→",
        PowerTrend::Unknown => "?",
    }
}

/// Six lines, always in the same order, whatever failed
pub fn compose_summary(report: &CycleReport) -> String {
    let latency = report.text(MetricKind::Latency);
    let latency = if latency.is_empty() {
        NO_LATENCY.to_string()
    } else {
        latency
    };

    [
        format!("🔋 {}", report.text(MetricKind::Battery)),
        format!("💾 RAM {}", report.ram_cpu_text()),
        format!(
            "🌐 ↓ {} ↑ {} | Ping {}",
            report.text(MetricKind::DownloadSpeed),
            report.text(MetricKind::UploadSpeed),
            latency
        ),
        format!("🎮 {}", report.text(MetricKind::Fps)),
        format!("🌡 {}", report.text(MetricKind::Thermal)),
        format!("⚡ {}", report.power_text()),
    ]
    .join("\n")
}
