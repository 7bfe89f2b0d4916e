use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use super::MetricReader;
use crate::core::device_monitor::metrics::MetricKind;
use crate::error::{PulseError, Result};

static RTT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").expect("valid RTT regex"));

/// One ICMP echo through the system `ping` binary
pub struct LatencyReader {
    host: String,
    timeout_secs: u64,
}

impl LatencyReader {
    pub fn new(host: String, timeout_secs: u64) -> Self {
        Self {
            host,
            timeout_secs: timeout_secs.max(1),
        }
    }
}

#[async_trait]
impl MetricReader for LatencyReader {
    fn kind(&self) -> MetricKind {
        MetricKind::Latency
    }

    async fn read(&self) -> Result<String> {
        let output = Command::new("ping")
            .args(["-c", "1", "-W", &self.timeout_secs.to_string(), &self.host])
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(PulseError::reader(format!(
                "no echo reply from {}",
                self.host
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let rtt = parse_ping_rtt(&stdout)
            .ok_or_else(|| PulseError::reader("ping output carried no round-trip time"))?;

        Ok(format!("{:.0} ms", rtt))
    }
}

/// Extract the round-trip time in milliseconds from `ping` output
pub fn parse_ping_rtt(output: &str) -> Option<f64> {
    RTT_PATTERN
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
