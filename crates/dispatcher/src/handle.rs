//! SinkHandle - one sink behind its own queue and worker task

use std::sync::Arc;
use std::time::Instant;

use contracts::{AlignmentReport, ReportSink};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use crate::error::DispatcherError;
use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Arc<AlignmentReport>>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn a worker draining a queue of `queue_capacity` reports into `sink`
    pub fn spawn<S: ReportSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new(name.clone()));

        let worker = tokio::spawn(sink_worker(sink, rx, Arc::clone(&metrics), name.clone()));

        Self {
            name,
            tx,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a report, waiting while the queue is full
    ///
    /// Reports are whole recordings, so a slow sink applies backpressure
    /// instead of losing results. A report is only dropped when the worker
    /// is gone.
    pub async fn send(&self, report: Arc<AlignmentReport>) -> Result<(), DispatcherError> {
        if self.tx.capacity() == 0 {
            debug!(sink = %self.name, recording = %report.recording, "queue full, waiting");
        }
        match self.tx.send(report).await {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                Ok(())
            }
            Err(mpsc::error::SendError(report)) => {
                self.metrics.record_dropped();
                error!(sink = %self.name, recording = %report.recording, "sink worker closed, report dropped");
                Err(DispatcherError::WorkerClosed {
                    sink_name: self.name.clone(),
                    recording: report.recording.clone(),
                })
            }
        }
    }

    /// Close the queue and wait for the worker to flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "sink worker panicked");
        }
        debug!(sink = %self.name, "sink handle shut down");
    }
}

#[instrument(name = "sink_worker_loop", skip(sink, rx, metrics), fields(sink = %name))]
async fn sink_worker<S: ReportSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<AlignmentReport>>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!("sink worker started");

    while let Some(report) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        let started = Instant::now();
        match sink.write(&report).await {
            Ok(()) => metrics.record_written(started.elapsed()),
            Err(e) => {
                // keep draining: one bad report must not stop the sink
                metrics.record_failed();
                error!(recording = %report.recording, error = %e, "report write failed");
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "close failed on shutdown");
    }

    debug!("sink worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::ContractError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    struct MockSink {
        name: String,
        written: Arc<AtomicU64>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl MockSink {
        fn new(name: &str, written: Arc<AtomicU64>) -> Self {
            Self {
                name: name.to_string(),
                written,
                should_fail: false,
                delay_ms: 0,
            }
        }
    }

    impl ReportSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _report: &AlignmentReport) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.written.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn report(recording: &str) -> Arc<AlignmentReport> {
        Arc::new(AlignmentReport {
            recording: recording.to_string(),
            reference_view: "BC".into(),
            reference_pulses: 40,
            reference_rate: 100.0,
            generated_at: Utc::now(),
            results: BTreeMap::new(),
            failures: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_sink_handle_basic() {
        let written = Arc::new(AtomicU64::new(0));
        let handle = SinkHandle::spawn(MockSink::new("test", Arc::clone(&written)), 10);

        for i in 0..5 {
            handle.send(report(&format!("session{i}"))).await.unwrap();
        }

        let metrics = Arc::clone(handle.metrics());
        handle.shutdown().await;
        assert_eq!(written.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.written(), 5);
    }

    #[tokio::test]
    async fn test_slow_sink_gets_every_report() {
        let written = Arc::new(AtomicU64::new(0));
        let sink = MockSink {
            delay_ms: 5,
            ..MockSink::new("slow", Arc::clone(&written))
        };
        let handle = SinkHandle::spawn(sink, 2);

        for i in 0..20 {
            handle.send(report(&format!("session{i}"))).await.unwrap();
        }

        let metrics = Arc::clone(handle.metrics());
        handle.shutdown().await;
        assert_eq!(written.load(Ordering::Relaxed), 20);
        assert_eq!(metrics.dropped(), 0);
    }

    #[tokio::test]
    async fn test_sink_handle_failure_isolation() {
        let sink = MockSink {
            should_fail: true,
            ..MockSink::new("failing", Arc::new(AtomicU64::new(0)))
        };
        let handle = SinkHandle::spawn(sink, 10);

        for i in 0..3 {
            handle.send(report(&format!("session{i}"))).await.unwrap();
        }

        let metrics = Arc::clone(handle.metrics());
        handle.shutdown().await;
        assert_eq!(metrics.failed(), 3);
    }
}
