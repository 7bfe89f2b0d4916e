//! Frame-rate monitor.
//!
//! The platform frame callback pushes presentation timestamps through a
//! [`FrameReporter`]. A producer task folds them into a summary per sampling
//! window and overwrites a single-slot cell. The sampling loop only ever reads
//! the cell's current value, so its cadence is independent of the producer.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::metrics::FpsSummary;
use crate::core::config::FpsConfig;

/// A frame counts as dropped when it took this many target intervals
const DROP_FACTOR: f64 = 1.5;

/// Handle given to the platform frame-timing callback
#[derive(Clone)]
pub struct FrameReporter {
    tx: mpsc::UnboundedSender<Instant>,
}

impl FrameReporter {
    /// Record that a frame was presented at `at`.
    ///
    /// Never blocks; frames reported after the monitor stopped are discarded.
    pub fn frame_presented(&self, at: Instant) {
        let _ = self.tx.send(at);
    }
}

/// Read side of the single-slot cell
#[derive(Clone)]
pub struct FpsCell {
    rx: watch::Receiver<Option<FpsSummary>>,
}

impl FpsCell {
    pub fn latest(&self) -> Option<FpsSummary> {
        *self.rx.borrow()
    }

    pub fn formatted(&self) -> Option<String> {
        self.latest().map(|s| format_fps(&s))
    }
}

pub fn format_fps(summary: &FpsSummary) -> String {
    format!(
        "{:.0} FPS ({:.1}% drop)",
        summary.fps, summary.drop_rate_percent
    )
}

pub struct FpsMonitor;

impl FpsMonitor {
    /// Spawn the producer task on the current runtime.
    pub fn spawn(config: &FpsConfig, cancel: CancellationToken) -> (FrameReporter, FpsCell) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (cell_tx, cell_rx) = watch::channel(None);

        let window = config.window();
        let target_interval = Duration::from_secs_f64(1.0 / config.target_hz);

        tokio::spawn(fps_producer(frame_rx, cell_tx, window, target_interval, cancel));

        (FrameReporter { tx: frame_tx }, FpsCell { rx: cell_rx })
    }
}

async fn fps_producer(
    mut frame_rx: mpsc::UnboundedReceiver<Instant>,
    cell_tx: watch::Sender<Option<FpsSummary>>,
    window: Duration,
    target_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately
    ticker.tick().await;

    let mut window_frames: Vec<Instant> = Vec::new();
    let mut last_frame: Option<Instant> = None;

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                match frame {
                    Some(at) => window_frames.push(at),
                    None => break,
                }
            }
            _ = ticker.tick() => {
                let summary = summarize_window(&window_frames, last_frame, window, target_interval);
                // An idle window breaks the frame chain
                last_frame = window_frames.iter().max().copied();
                window_frames.clear();
                cell_tx.send_replace(summary);
            }
            _ = cancel.cancelled() => {
                log::debug!("FPS producer shutting down");
                break;
            }
        }
    }
}

/// Summarize one window of frame timestamps.
///
/// `previous` is the last frame of the preceding window so that the first
/// interval of this window is measured too. It is ignored when it lies more
/// than one window before the first frame, so resuming after an idle period
/// counts no drops. Returns `None` when no frames were presented: an idle
/// pipeline has no frame rate, not a zero one.
pub fn summarize_window(
    frames: &[Instant],
    previous: Option<Instant>,
    window: Duration,
    target_interval: Duration,
) -> Option<FpsSummary> {
    if frames.is_empty() {
        return None;
    }

    let mut sorted = frames.to_vec();
    sorted.sort();

    let first = sorted[0];
    let mut prev = previous.filter(|&p| first.saturating_duration_since(p) <= window);

    let threshold = target_interval.mul_f64(DROP_FACTOR);
    let mut dropped = 0u32;
    for &frame in &sorted {
        if let Some(p) = prev {
            let gap = frame.saturating_duration_since(p);
            if gap > threshold {
                // Frames that should have been presented inside the gap
                let missed = (gap.as_secs_f64() / target_interval.as_secs_f64()).round() as u32;
                dropped += missed.saturating_sub(1);
            }
        }
        prev = Some(frame);
    }

    let presented = sorted.len() as u32;
    let fps = presented as f64 / window.as_secs_f64();
    let expected = presented + dropped;
    let drop_rate_percent = if expected > 0 {
        dropped as f64 / expected as f64 * 100.0
    } else {
        0.0
    };

    Some(FpsSummary {
        fps,
        dropped_frames: dropped,
        drop_rate_percent,
    })
}
