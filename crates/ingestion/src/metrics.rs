//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{SignalKind, ViewId};
use metrics::{counter, histogram};

/// Load counters shared by every source built from one factory
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Signals loaded successfully
    pub signals_loaded: AtomicU64,

    /// Samples across all loaded signals
    pub samples_loaded: AtomicU64,

    /// Video frames decoded into brightness samples
    pub frames_read: AtomicU64,

    /// Failed loads
    pub load_errors: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful load
    pub fn record_loaded(&self, view: &ViewId, kind: SignalKind, samples: usize, elapsed: Duration) {
        self.signals_loaded.fetch_add(1, Ordering::Relaxed);
        self.samples_loaded
            .fetch_add(samples as u64, Ordering::Relaxed);

        let kind = match kind {
            SignalKind::Brightness => "brightness",
            SignalKind::Analog => "analog",
        };
        counter!("ledsync_ingestion_samples_total", "view" => view.to_string(), "kind" => kind)
            .increment(samples as u64);
        histogram!("ledsync_ingestion_load_seconds", "view" => view.to_string())
            .record(elapsed.as_secs_f64());
    }

    /// Record frames read from a video
    pub fn record_frames(&self, frames: u64) {
        self.frames_read.fetch_add(frames, Ordering::Relaxed);
    }

    /// Record a failed load
    pub fn record_error(&self, view: &ViewId) {
        self.load_errors.fetch_add(1, Ordering::Relaxed);
        counter!("ledsync_ingestion_errors_total", "view" => view.to_string()).increment(1);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            signals_loaded: self.signals_loaded.load(Ordering::Relaxed),
            samples_loaded: self.samples_loaded.load(Ordering::Relaxed),
            frames_read: self.frames_read.load(Ordering::Relaxed),
            load_errors: self.load_errors.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub signals_loaded: u64,
    pub samples_loaded: u64,
    pub frames_read: u64,
    pub load_errors: u64,
}
