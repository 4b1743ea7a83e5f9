//! Per-sink delivery metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Delivery counters of one sink worker
///
/// Mirrored to the global `metrics` recorder with a `sink` label.
#[derive(Debug)]
pub struct SinkMetrics {
    sink: String,
    queue_len: AtomicUsize,
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    write_micros: AtomicU64,
}

impl SinkMetrics {
    pub fn new(sink: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            queue_len: AtomicUsize::new(0),
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            write_micros: AtomicU64::new(0),
        }
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        metrics::gauge!("ledsync_sink_queue_len", "sink" => self.sink.clone()).set(len as f64);
    }

    /// Record a successful write and its latency
    pub fn record_written(&self, elapsed: Duration) {
        self.written.fetch_add(1, Ordering::Relaxed);
        self.write_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        metrics::counter!("ledsync_sink_reports_total", "sink" => self.sink.clone(), "status" => "written")
            .increment(1);
        metrics::histogram!("ledsync_sink_write_seconds", "sink" => self.sink.clone())
            .record(elapsed.as_secs_f64());
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("ledsync_sink_reports_total", "sink" => self.sink.clone(), "status" => "failed")
            .increment(1);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("ledsync_sink_reports_total", "sink" => self.sink.clone(), "status" => "dropped")
            .increment(1);
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let written = self.written();
        let micros = self.write_micros.load(Ordering::Relaxed);
        MetricsSnapshot {
            queue_len: self.queue_len.load(Ordering::Relaxed),
            written,
            failed: self.failed(),
            dropped: self.dropped(),
            avg_write_ms: if written > 0 {
                micros as f64 / written as f64 / 1000.0
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
    pub avg_write_ms: f64,
}
