use std::collections::VecDeque;

use super::metrics::PowerTrend;
use crate::core::config::TrendConfig;

/// Smallest older-half mean used as the divisor of the relative change
const TREND_EPSILON_WATTS: f64 = 0.01;

/// Circular buffer of recent power totals
#[derive(Debug, Clone)]
pub(crate) struct PowerHistory {
    capacity: usize,
    min_samples: usize,
    threshold_ratio: f64,
    totals: VecDeque<f64>,
}

impl PowerHistory {
    pub fn new(config: &TrendConfig) -> Self {
        Self {
            capacity: config.window.max(2),
            min_samples: config.min_samples.max(2),
            threshold_ratio: config.threshold_ratio,
            totals: VecDeque::with_capacity(config.window),
        }
    }

    pub fn push(&mut self, total_watts: f64) {
        if self.totals.len() >= self.capacity {
            self.totals.pop_front();
        }
        self.totals.push_back(total_watts);
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn average(&self) -> f64 {
        mean(self.totals.iter().copied())
    }

    pub fn peak(&self) -> f64 {
        self.totals.iter().copied().fold(0.0, f64::max)
    }

    /// Compare the mean of the newer half of the window against the older half.
    pub fn trend(&self) -> PowerTrend {
        let len = self.totals.len();
        if len < self.min_samples {
            return PowerTrend::Unknown;
        }

        let half = len / 2;
        let older = mean(self.totals.iter().take(half).copied());
        let newer = mean(self.totals.iter().skip(len - half).copied());

        let change = (newer - older) / older.abs().max(TREND_EPSILON_WATTS);

        if change > self.threshold_ratio {
            PowerTrend::Increasing
        } else if change < -self.threshold_ratio {
            PowerTrend::Decreasing
        } else {
            PowerTrend::Stable
        }
    }
}

fn mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
