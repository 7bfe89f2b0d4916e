use chrono::{DateTime, Local, TimeZone};
use colored::{ColoredString, Colorize};

use crate::core::device_monitor::{AlertSeverity, PowerAlert, PowerTrend, ServiceState};

/// Format a wall-clock millisecond timestamp (YYYY-MM-DD HH:MM:SS)
pub fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(datetime) => {
            let datetime: DateTime<Local> = datetime;
            datetime.format("%Y-%m-%d %H:%M:%S").to_string()
        }
        None => "unknown".to_string(),
    }
}

/// Format an age in human-readable form (s, m, h, d)
pub fn format_age(age_millis: i64) -> String {
    let secs = age_millis.max(0) / 1000;
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

pub fn format_flag(value: bool) -> ColoredString {
    if value {
        "yes".green()
    } else {
        "no".dimmed()
    }
}

pub fn format_state(state: ServiceState) -> ColoredString {
    match state {
        ServiceState::Monitoring => state.to_string().green().bold(),
        ServiceState::Created => state.to_string().cyan(),
        ServiceState::Stopped => state.to_string().yellow(),
    }
}

pub fn format_trend(trend: PowerTrend) -> ColoredString {
    match trend {
        PowerTrend::Increasing => "increasing".red(),
        PowerTrend::Decreasing => "decreasing".green(),
        PowerTrend::Stable => "stable".normal(),
        PowerTrend::Unknown => "unknown".dimmed(),
    }
}

pub fn format_alert(alert: &PowerAlert) -> ColoredString {
    match alert.severity {
        AlertSeverity::Critical => format!("⚠ {}", alert.message).red().bold(),
        AlertSeverity::Warning => format!("! {}", alert.message).yellow(),
        AlertSeverity::Info => alert.message.as_str().dimmed(),
    }
}
