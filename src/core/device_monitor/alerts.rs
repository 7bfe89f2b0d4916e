//! Power alert evaluation.
//!
//! Compares the current power breakdown against per-component ceilings and the
//! rolling trend. Stateless: alerts are recomputed from scratch every cycle.

use serde::{Deserialize, Serialize};

use super::metrics::{AggregatedPowerStats, PowerSnapshot, PowerTrend};
use super::power::{
    COMPONENT_CAMERA, COMPONENT_CPU, COMPONENT_DISPLAY, COMPONENT_SYSTEM, COMPONENT_WIFI,
};

/// Alert configuration with ceilings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerAlertConfig {
    pub cpu_ceiling_watts: f64,
    pub display_ceiling_watts: f64,
    pub camera_ceiling_watts: f64,
    pub wifi_ceiling_watts: f64,
    pub system_ceiling_watts: f64,
    /// Over `ceiling * critical_factor` is Critical instead of Warning
    pub critical_factor: f64,
    pub total_ceiling_watts: f64,
    /// Rising trend with total over `average * trend_spike_factor` is a Warning
    pub trend_spike_factor: f64,
}

impl Default for PowerAlertConfig {
    fn default() -> Self {
        Self {
            cpu_ceiling_watts: 4.0,
            display_ceiling_watts: 2.5,
            camera_ceiling_watts: 2.0,
            wifi_ceiling_watts: 1.2,
            system_ceiling_watts: 3.0,
            critical_factor: 1.5,
            total_ceiling_watts: 8.0,
            trend_spike_factor: 1.5,
        }
    }
}

impl PowerAlertConfig {
    pub fn ceiling_for(&self, component: &str) -> Option<f64> {
        match component {
            COMPONENT_CPU => Some(self.cpu_ceiling_watts),
            COMPONENT_DISPLAY => Some(self.display_ceiling_watts),
            COMPONENT_CAMERA => Some(self.camera_ceiling_watts),
            COMPONENT_WIFI => Some(self.wifi_ceiling_watts),
            COMPONENT_SYSTEM => Some(self.system_ceiling_watts),
            _ => None,
        }
    }
}

/// An individual alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerAlert {
    pub severity: AlertSeverity,
    /// Component name, or `None` for total/trend alerts
    pub component: Option<String>,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

pub fn has_critical(alerts: &[PowerAlert]) -> bool {
    alerts.iter().any(|a| a.severity == AlertSeverity::Critical)
}

/// Evaluate a power snapshot and generate alerts
pub fn evaluate_power_alerts(
    snapshot: &PowerSnapshot,
    stats: &AggregatedPowerStats,
    config: &PowerAlertConfig,
) -> Vec<PowerAlert> {
    let mut alerts = Vec::new();

    // Component alerts
    for reading in &snapshot.components {
        let Some(ceiling) = config.ceiling_for(&reading.component) else {
            continue;
        };
        let watts = reading.power_consumption_watts;
        let critical = ceiling * config.critical_factor;

        if watts > critical {
            alerts.push(PowerAlert {
                severity: AlertSeverity::Critical,
                component: Some(reading.component.clone()),
                message: format!(
                    "{} drawing {:.2}W (critical threshold: {:.2}W)",
                    reading.component, watts, critical
                ),
                value: watts,
                threshold: critical,
            });
        } else if watts > ceiling {
            alerts.push(PowerAlert {
                severity: AlertSeverity::Warning,
                component: Some(reading.component.clone()),
                message: format!(
                    "{} drawing {:.2}W (expected under {:.2}W)",
                    reading.component, watts, ceiling
                ),
                value: watts,
                threshold: ceiling,
            });
        }
    }

    // Total draw
    let total = snapshot.total_power_watts;
    if total > config.total_ceiling_watts {
        alerts.push(PowerAlert {
            severity: AlertSeverity::Critical,
            component: None,
            message: format!(
                "Total draw {:.2}W (critical threshold: {:.2}W)",
                total, config.total_ceiling_watts
            ),
            value: total,
            threshold: config.total_ceiling_watts,
        });
    }

    // Trend
    if stats.power_trend == PowerTrend::Increasing {
        let spike = stats.average_power_watts * config.trend_spike_factor;
        if stats.average_power_watts > 0.0 && total > spike {
            alerts.push(PowerAlert {
                severity: AlertSeverity::Warning,
                component: None,
                message: format!(
                    "Power draw rising: {:.2}W vs {:.2}W average",
                    total, stats.average_power_watts
                ),
                value: total,
                threshold: spike,
            });
        } else {
            alerts.push(PowerAlert {
                severity: AlertSeverity::Info,
                component: None,
                message: "Power draw trending upward".to_string(),
                value: total,
                threshold: stats.average_power_watts,
            });
        }
    }

    alerts
}
