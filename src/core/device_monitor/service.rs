//! Sampling loop service.
//!
//! Owns the cycle: fan out to every reader, join within the reader budget,
//! aggregate power, evaluate alerts, persist the widget record and replace the
//! ongoing notification. Then sleep until the next interval.

use chrono::{Local, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::alerts::{evaluate_power_alerts, AlertSeverity, PowerAlertConfig};
use super::fps::{FpsCell, FpsMonitor, FrameReporter};
use super::health::{HealthInputs, ScoreProvider};
use super::metrics::{BatteryReading, MetricKind, MetricSample, SubsystemActivity};
use super::notification::{
    ChannelSpec, NotificationContent, NotificationDispatcher, Notifier, ONGOING_NOTIFICATION_ID,
};
use super::power::{PowerAggregator, PowerUpdate};
use super::readers::{format_battery, ReaderSet};
use super::summary::{compose_summary, CycleReport};
use super::widget_state::WidgetState;
use crate::core::config::MonitorConfig;
use crate::core::kv_store::KeyValueStore;
use crate::core::run_flags::{process_alive, RunFlags};
use crate::error::{PulseError, Result};

pub const NOTIFICATION_TITLE: &str = "DevPulse monitoring";
const INITIALIZING_BODY: &str = "Initializing...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Created,
    Monitoring,
    Stopped,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceState::Created => "created",
            ServiceState::Monitoring => "monitoring",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Handles that only exist while the loop runs
struct RunningLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything one cycle needs, shared between the loop task and
/// [`MonitorService::run_single_cycle`].
struct CycleContext {
    readers: ReaderSet,
    reader_timeout: Duration,
    alert_config: PowerAlertConfig,
    aggregator: Mutex<PowerAggregator>,
    score_provider: Arc<dyn ScoreProvider>,
    widget_store: Arc<dyn KeyValueStore>,
    widget_tx: watch::Sender<Option<WidgetState>>,
    dispatcher: NotificationDispatcher,
    fps: Mutex<Option<(FrameReporter, FpsCell)>>,
}

pub struct MonitorService {
    config: MonitorConfig,
    flags: RunFlags,
    ctx: Arc<CycleContext>,
    power_rx: watch::Receiver<PowerUpdate>,
    state_tx: watch::Sender<ServiceState>,
    running: tokio::sync::Mutex<Option<RunningLoop>>,
}

impl MonitorService {
    /// Create the service in the `Created` state.
    ///
    /// Spawns the notification dispatch task, so it must be called from
    /// within a Tokio runtime.
    pub fn new(
        config: MonitorConfig,
        readers: ReaderSet,
        widget_store: Arc<dyn KeyValueStore>,
        flags: RunFlags,
        notifier: Arc<dyn Notifier>,
        score_provider: Arc<dyn ScoreProvider>,
    ) -> Self {
        let aggregator = PowerAggregator::new(&config.trend);
        let power_rx = aggregator.subscribe();
        let (widget_tx, _) = watch::channel(None);
        let (state_tx, _) = watch::channel(ServiceState::Created);

        let dispatcher = NotificationDispatcher::spawn(
            notifier,
            ChannelSpec::monitor(),
            config.notification.dedup_window(),
        );

        let ctx = Arc::new(CycleContext {
            readers,
            reader_timeout: config.sampling.reader_timeout(),
            alert_config: config.alerts.clone(),
            aggregator: Mutex::new(aggregator),
            score_provider,
            widget_store,
            widget_tx,
            dispatcher,
            fps: Mutex::new(None),
        });

        Self {
            config,
            flags,
            ctx,
            power_rx,
            state_tx,
            running: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> ServiceState {
        *self.state_tx.borrow()
    }

    /// Latest persisted widget record; changes once per successful cycle.
    pub fn widget_updates(&self) -> watch::Receiver<Option<WidgetState>> {
        self.ctx.widget_tx.subscribe()
    }

    pub fn power_updates(&self) -> watch::Receiver<PowerUpdate> {
        self.power_rx.clone()
    }

    /// Frame-timing sink, available while monitoring.
    pub fn frame_reporter(&self) -> Option<FrameReporter> {
        self.ctx.fps.lock().as_ref().map(|(reporter, _)| reporter.clone())
    }

    /// Enter Monitoring. Calling it again while monitoring is a no-op.
    ///
    /// Fails when another live process holds the running flag, or when the
    /// notification channel cannot be established; the loop does not run
    /// without its ongoing notification.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            log::debug!("Monitor already running, start ignored");
            return Ok(());
        }

        let own_pid = std::process::id();
        if let Some(owner) = self.flags.live_owner(process_alive)? {
            if owner != own_pid {
                return Err(PulseError::startup(format!(
                    "another monitor is already running (pid {})",
                    owner
                )));
            }
        }

        self.ctx
            .dispatcher
            .ensure_channel()
            .await
            .map_err(|e| PulseError::startup(format!("notification channel unavailable: {}", e)))?;

        let initializing = NotificationContent::ongoing(NOTIFICATION_TITLE, INITIALIZING_BODY);
        if let Err(e) = self.ctx.dispatcher.post(initializing).await {
            log::warn!("Failed to post initial notification: {}", e);
        }

        if let Err(e) = self.flags.mark_running(own_pid) {
            log::warn!("Failed to persist running flag: {}", e);
        }

        let cancel = CancellationToken::new();
        *self.ctx.fps.lock() = Some(FpsMonitor::spawn(&self.config.fps, cancel.child_token()));

        let task = tokio::spawn(sampling_loop(
            Arc::clone(&self.ctx),
            self.config.sampling.interval(),
            cancel.clone(),
        ));

        *running = Some(RunningLoop { cancel, task });
        self.state_tx.send_replace(ServiceState::Monitoring);
        log::info!(
            "Monitoring started (interval {:?}, reader timeout {:?})",
            self.config.sampling.interval(),
            self.ctx.reader_timeout
        );
        Ok(())
    }

    /// Leave Monitoring.
    ///
    /// Once this returns, the loop task has finished: no further widget
    /// writes or notification updates happen.
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        let Some(RunningLoop { cancel, task }) = running.take() else {
            return Ok(());
        };

        cancel.cancel();
        if let Err(e) = task.await {
            if e.is_panic() {
                log::error!("Sampling loop panicked: {}", e);
            }
        }
        *self.ctx.fps.lock() = None;

        if let Err(e) = self.ctx.dispatcher.cancel(ONGOING_NOTIFICATION_ID).await {
            log::warn!("Failed to cancel ongoing notification: {}", e);
        }

        self.state_tx.send_replace(ServiceState::Stopped);
        log::info!("Monitoring stopped");
        self.flags.mark_stopped()
    }

    /// Run one full cycle outside the loop, including persistence and the
    /// notification update.
    pub async fn run_single_cycle(&self) -> Result<CycleReport> {
        self.ctx.dispatcher.ensure_channel().await?;
        self.ctx.run_cycle().await
    }
}

async fn sampling_loop(ctx: Arc<CycleContext>, interval: Duration, cancel: CancellationToken) {
    loop {
        let mut cycle = tokio::spawn({
            let ctx = Arc::clone(&ctx);
            async move { ctx.run_cycle().await }
        });

        tokio::select! {
            _ = cancel.cancelled() => {
                // Dropping the cycle drops its JoinSet, aborting in-flight readers
                cycle.abort();
                let _ = cycle.await;
                break;
            }
            result = &mut cycle => match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::error!("Sampling cycle failed: {}", e),
                Err(e) if e.is_panic() => log::error!("Sampling cycle panicked: {}", e),
                Err(_) => {}
            },
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    log::debug!("Sampling loop exited");
}

impl CycleContext {
    async fn run_cycle(&self) -> Result<CycleReport> {
        let started = Instant::now();
        let (mut samples, battery, activity) = self.collect().await;

        let fps_text = self
            .fps
            .lock()
            .as_ref()
            .and_then(|(_, cell)| cell.formatted());
        let fps_sample = match fps_text {
            Some(text) => MetricSample::success(MetricKind::Fps, text),
            None => MetricSample::failure(MetricKind::Fps),
        };
        samples.insert(MetricKind::Fps, fps_sample);

        let now_millis = Utc::now().timestamp_millis();
        let (snapshot, stats) = {
            let mut aggregator = self.aggregator.lock();
            let input = battery.clone().unwrap_or_default();
            let snapshot = aggregator.ingest(&input, &activity, now_millis);
            (snapshot, aggregator.stats().clone())
        };

        let alerts = evaluate_power_alerts(&snapshot, &stats, &self.alert_config);
        for alert in &alerts {
            match alert.severity {
                AlertSeverity::Critical => log::warn!("Power alert: {}", alert.message),
                _ => log::debug!("Power alert: {}", alert.message),
            }
        }

        let failed_readers = samples.values().filter(|s| !s.succeeded).count();
        let health = self.score_provider.score(
            &HealthInputs {
                battery_percent: battery.as_ref().and_then(|b| b.capacity_percent),
                power_trend: stats.power_trend,
                alerts: &alerts,
                failed_readers,
            },
            Local::now().date_naive(),
        );

        let report = CycleReport {
            samples,
            battery,
            snapshot,
            stats,
            alerts,
            health,
            timestamp_millis: now_millis,
        };

        let widget = report.widget_state();
        match widget.save(self.widget_store.as_ref()) {
            Ok(()) => {
                self.widget_tx.send_replace(Some(widget));
            }
            Err(e) => log::error!("Failed to persist widget state: {}", e),
        }

        let content = NotificationContent::ongoing(NOTIFICATION_TITLE, compose_summary(&report));
        self.dispatcher.post(content).await?;

        log::debug!(
            "Cycle finished in {:?} ({} failed readers)",
            started.elapsed(),
            failed_readers
        );
        Ok(report)
    }

    /// Fan out to every reader and join. Every kind ends up with a sample,
    /// failure-marked when its reader errored, panicked or timed out.
    async fn collect(
        &self,
    ) -> (
        HashMap<MetricKind, MetricSample>,
        Option<BatteryReading>,
        SubsystemActivity,
    ) {
        let timeout = self.reader_timeout;

        let mut samples: HashMap<MetricKind, MetricSample> = self
            .readers
            .metrics
            .iter()
            .map(|r| (r.kind(), MetricSample::failure(r.kind())))
            .collect();
        samples.insert(MetricKind::Battery, MetricSample::failure(MetricKind::Battery));

        let mut set = JoinSet::new();
        for reader in &self.readers.metrics {
            let reader = Arc::clone(reader);
            set.spawn(async move {
                let kind = reader.kind();
                match tokio::time::timeout(timeout, reader.read()).await {
                    Ok(Ok(text)) => MetricSample::success(kind, text),
                    Ok(Err(e)) => {
                        log::warn!("{:?} reader failed: {}", kind, e);
                        MetricSample::failure(kind)
                    }
                    Err(_) => {
                        log::warn!("{:?} reader timed out after {:?}", kind, timeout);
                        MetricSample::failure(kind)
                    }
                }
            });
        }

        let battery_source = Arc::clone(&self.readers.battery);
        let battery_task = tokio::task::spawn_blocking(move || battery_source.read());
        let activity_source = Arc::clone(&self.readers.activity);
        let activity_task = tokio::task::spawn_blocking(move || activity_source.sample());

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(sample) => {
                    samples.insert(sample.kind, sample);
                }
                Err(e) if e.is_panic() => log::error!("Reader panicked: {}", e),
                Err(_) => {}
            }
        }

        let battery = match tokio::time::timeout(timeout, battery_task).await {
            Ok(Ok(Ok(reading))) => Some(reading),
            Ok(Ok(Err(e))) => {
                log::warn!("Battery reader failed: {}", e);
                None
            }
            Ok(Err(e)) => {
                log::error!("Battery reader panicked: {}", e);
                None
            }
            Err(_) => {
                log::warn!("Battery reader timed out after {:?}", timeout);
                None
            }
        };
        if let Some(reading) = &battery {
            samples.insert(
                MetricKind::Battery,
                MetricSample::success(MetricKind::Battery, format_battery(reading)),
            );
        }

        let activity = match tokio::time::timeout(timeout, activity_task).await {
            Ok(Ok(activity)) => activity,
            _ => {
                log::warn!("Subsystem activity unavailable, attributing to system");
                SubsystemActivity::default()
            }
        };

        (samples, battery, activity)
    }
}
