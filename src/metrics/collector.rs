//! Metrics collection and registry.

use crate::capture::CaptureStats;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registering or encoding a metric failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of pipeline state for metrics update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Cycles that produced a frame.
    pub frames: u64,
    /// Cycles without a frame.
    pub frames_dropped: u64,
    /// Running FPS estimate, once known.
    pub fps_estimate: Option<f64>,
    /// Still images written.
    pub images_written: u64,
    /// Frames written to video.
    pub video_frames_written: u64,
    /// Whether a video session is armed or writing.
    pub video_active: bool,
    /// Failed sink writes.
    pub sink_errors: u64,
}

impl MetricsSnapshot {
    /// Builds a snapshot from capture counters and session state.
    pub fn from_stats(stats: &CaptureStats, fps_estimate: Option<f64>, video_active: bool) -> Self {
        Self {
            frames: stats.frames,
            frames_dropped: stats.frames_dropped,
            fps_estimate,
            images_written: stats.images_written,
            video_frames_written: stats.video_frames_written,
            video_active,
            sink_errors: stats.sink_errors(),
        }
    }
}

/// Prometheus registry for capture metrics.
pub struct MetricsRegistry {
    registry: Registry,

    frames_total: IntCounter,
    frames_dropped_total: IntCounter,
    fps_estimate: Gauge,

    images_written_total: IntCounter,
    video_frames_written_total: IntCounter,
    video_active: IntGauge,
    sink_errors_total: IntCounter,
}

/// Advances a counter to `target`; counters never go backwards.
fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

impl MetricsRegistry {
    /// Creates a registry with every capture metric registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_total = IntCounter::new(
            "camcurves_frames_total",
            "Capture cycles that produced a frame",
        )?;
        let frames_dropped_total = IntCounter::new(
            "camcurves_frames_dropped_total",
            "Capture cycles where grab or decode produced nothing",
        )?;
        let fps_estimate = Gauge::new(
            "camcurves_fps_estimate",
            "Running frames-per-second estimate",
        )?;

        let images_written_total = IntCounter::new(
            "camcurves_images_written_total",
            "Still images written",
        )?;
        let video_frames_written_total = IntCounter::new(
            "camcurves_video_frames_written_total",
            "Frames written to video files",
        )?;
        let video_active = IntGauge::new(
            "camcurves_video_active",
            "Video recording armed or writing (1) or stopped (0)",
        )?;
        let sink_errors_total = IntCounter::new(
            "camcurves_sink_errors_total",
            "Failed still image and video writes",
        )?;

        registry.register(Box::new(frames_total.clone()))?;
        registry.register(Box::new(frames_dropped_total.clone()))?;
        registry.register(Box::new(fps_estimate.clone()))?;
        registry.register(Box::new(images_written_total.clone()))?;
        registry.register(Box::new(video_frames_written_total.clone()))?;
        registry.register(Box::new(video_active.clone()))?;
        registry.register(Box::new(sink_errors_total.clone()))?;

        Ok(Self {
            registry,
            frames_total,
            frames_dropped_total,
            fps_estimate,
            images_written_total,
            video_frames_written_total,
            video_active,
            sink_errors_total,
        })
    }

    /// Updates all metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        advance(&self.frames_total, snapshot.frames);
        advance(&self.frames_dropped_total, snapshot.frames_dropped);
        if let Some(fps) = snapshot.fps_estimate {
            self.fps_estimate.set(fps);
        }

        advance(&self.images_written_total, snapshot.images_written);
        advance(&self.video_frames_written_total, snapshot.video_frames_written);
        self.video_active.set(i64::from(snapshot.video_active));
        advance(&self.sink_errors_total, snapshot.sink_errors);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
