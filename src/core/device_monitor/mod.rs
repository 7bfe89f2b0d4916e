//! Device monitoring core.
//!
//! Readers measure, the power aggregator and alert evaluator interpret the
//! battery data, and the service runs them once per sampling cycle before
//! persisting the widget record and updating the ongoing notification.

pub mod alerts;
pub mod fps;
pub mod health;
mod history;
pub mod metrics;
pub mod notification;
pub mod power;
pub mod readers;
pub mod service;
pub mod summary;
pub mod widget_state;

pub use alerts::{evaluate_power_alerts, has_critical, AlertSeverity, PowerAlert, PowerAlertConfig};
pub use fps::{FpsCell, FpsMonitor, FrameReporter};
pub use health::{compute_health_score, DailyHealthTracker, DailyStreak, HealthScore, ScoreProvider};
pub use metrics::{
    AggregatedPowerStats, BatteryReading, BatteryState, FpsSummary, MetricKind, MetricSample,
    PowerComponentReading, PowerSnapshot, PowerTrend, SubsystemActivity,
};
pub use notification::{
    LogNotifier, MemoryNotifier, NotificationContent, NotificationDispatcher, Notifier,
    ONGOING_NOTIFICATION_ID,
};
pub use power::{total_power_watts, PowerAggregator, PowerUpdate};
pub use readers::{ActivitySource, BatterySource, MetricReader, ReaderSet};
pub use service::{MonitorService, ServiceState};
pub use summary::{compose_summary, CycleReport};
pub use widget_state::WidgetState;
