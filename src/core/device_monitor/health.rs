//! Device health score and daily monitoring streak.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::alerts::{AlertSeverity, PowerAlert};
use super::metrics::PowerTrend;
use crate::core::kv_store::KeyValueStore;
use crate::error::Result;

const STREAK_LAST_DAY: &str = "streak_last_day";
const STREAK_DAYS: &str = "streak_days";

pub const MAX_HEALTH_SCORE: u8 = 10;

/// What one cycle observed, as far as health is concerned
#[derive(Debug, Clone)]
pub struct HealthInputs<'a> {
    pub battery_percent: Option<u8>,
    pub power_trend: PowerTrend,
    pub alerts: &'a [PowerAlert],
    pub failed_readers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthScore {
    pub score: u8,
    pub streak: u32,
}

/// Supplies the pass-through `health_score` and `streak` widget fields
pub trait ScoreProvider: Send + Sync {
    fn score(&self, inputs: &HealthInputs<'_>, today: NaiveDate) -> HealthScore;
}

pub fn compute_health_score(inputs: &HealthInputs<'_>) -> u8 {
    let mut penalty: u32 = 0;

    match inputs.battery_percent {
        Some(p) if p < 10 => penalty += 3,
        Some(p) if p < 20 => penalty += 2,
        _ => {}
    }

    if inputs.power_trend == PowerTrend::Increasing {
        penalty += 1;
    }

    let warnings = inputs
        .alerts
        .iter()
        .filter(|a| a.severity == AlertSeverity::Warning)
        .count() as u32;
    penalty += warnings.min(2);

    if inputs
        .alerts
        .iter()
        .any(|a| a.severity == AlertSeverity::Critical)
    {
        penalty += 3;
    }

    penalty += (inputs.failed_readers / 3) as u32;

    MAX_HEALTH_SCORE.saturating_sub(penalty.min(MAX_HEALTH_SCORE as u32) as u8)
}

/// Consecutive calendar days with at least one sampling cycle
pub struct DailyStreak {
    store: Arc<dyn KeyValueStore>,
}

impl DailyStreak {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn current(&self) -> u32 {
        self.store
            .get_i64(STREAK_DAYS)
            .map(|d| d.max(0) as u32)
            .unwrap_or(0)
    }

    /// Record activity on `today` and return the streak length.
    pub fn record(&self, today: NaiveDate) -> Result<u32> {
        let last_day = self
            .store
            .get_string(STREAK_LAST_DAY)
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());
        let current = self.current();

        let next = match last_day {
            Some(day) if day == today => return Ok(current.max(1)),
            Some(day) if day.succ_opt() == Some(today) => current + 1,
            _ => 1,
        };

        self.store.set(STREAK_DAYS, Value::from(next))?;
        self.store
            .set(STREAK_LAST_DAY, Value::from(today.format("%Y-%m-%d").to_string()))?;
        Ok(next)
    }
}

/// Default provider: computed score plus a store-backed daily streak
pub struct DailyHealthTracker {
    streak: DailyStreak,
}

impl DailyHealthTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            streak: DailyStreak::new(store),
        }
    }
}

impl ScoreProvider for DailyHealthTracker {
    fn score(&self, inputs: &HealthInputs<'_>, today: NaiveDate) -> HealthScore {
        let streak = self.streak.record(today).unwrap_or_else(|e| {
            log::warn!("Failed to record monitoring streak: {}", e);
            self.streak.current()
        });

        HealthScore {
            score: compute_health_score(inputs),
            streak,
        }
    }
}
