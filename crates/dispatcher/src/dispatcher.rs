//! Dispatcher - main loop for fan-out of reports to sinks

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{AlignmentReport, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::{FileSink, LogSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<AlignmentReport>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<AlignmentReport>) -> Self {
        Self { config, input_rx }
    }

    /// Create every sink and start its worker
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(sink_count = self.config.sinks.len())
    )]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = self
            .config
            .sinks
            .iter()
            .map(create_sink_handle)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => Ok(SinkHandle::spawn(
            LogSink::new(&config.name),
            config.queue_capacity,
        )),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Totals of a finished dispatcher
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchSummary {
    /// Reports received from the engine
    pub reports: u64,
    /// Final metrics per sink
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

/// Fans every alignment report out to all sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<AlignmentReport>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(
        handles: Vec<SinkHandle>,
        input_rx: mpsc::Receiver<AlignmentReport>,
    ) -> Self {
        Self { handles, input_rx }
    }

    /// Current metrics of all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Consume reports until the input closes, then drain and close sinks
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> DispatchSummary {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut reports: u64 = 0;
        while let Some(report) = self.input_rx.recv().await {
            reports += 1;
            debug!(
                recording = %report.recording,
                aligned = report.results.len(),
                failed = report.failures.len(),
                "dispatching report"
            );
            self.dispatch(Arc::new(report)).await;
        }

        info!(reports, "Dispatcher input closed, shutting down");

        let metrics: Vec<(String, Arc<SinkMetrics>)> = self
            .handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect();
        for handle in self.handles {
            handle.shutdown().await;
        }

        info!("Dispatcher shutdown complete");
        DispatchSummary {
            reports,
            sinks: metrics
                .into_iter()
                .map(|(name, m)| (name, m.snapshot()))
                .collect(),
        }
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<DispatchSummary> {
        tokio::spawn(self.run())
    }

    async fn dispatch(&self, report: Arc<AlignmentReport>) {
        for handle in &self.handles {
            // a closed worker is counted and logged by the handle
            let _ = handle.send(Arc::clone(&report)).await;
        }
    }
}

/// Build a dispatcher from sink configs
pub fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<AlignmentReport>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::AlignmentResult;
    use std::collections::{BTreeMap, HashMap};
    use tempfile::tempdir;

    fn report(recording: &str) -> AlignmentReport {
        AlignmentReport {
            recording: recording.to_string(),
            reference_view: "BC".into(),
            reference_pulses: 40,
            reference_rate: 100.0,
            generated_at: Utc::now(),
            results: BTreeMap::from([(
                "TL".into(),
                AlignmentResult::identity("TL".into(), 100.0),
            )]),
            failures: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_dispatcher_fanout() {
        let (input_tx, input_rx) = mpsc::channel(10);

        let handles = vec![
            SinkHandle::spawn(LogSink::new("sink1"), 10),
            SinkHandle::spawn(LogSink::new("sink2"), 10),
        ];
        let handle = Dispatcher::with_handles(handles, input_rx).spawn();

        for i in 0..5 {
            input_tx.send(report(&format!("session{i}"))).await.unwrap();
        }
        drop(input_tx);

        let summary = handle.await.unwrap();
        assert_eq!(summary.reports, 5);
        assert_eq!(summary.sinks.len(), 2);
        for (_, snapshot) in &summary.sinks {
            assert_eq!(snapshot.written, 5);
            assert_eq!(snapshot.dropped, 0);
        }
    }

    #[tokio::test]
    async fn test_small_queue_writes_every_report() {
        let dir = tempdir().unwrap();
        let (input_tx, input_rx) = mpsc::channel(64);

        let configs = vec![SinkConfig {
            name: "files".to_string(),
            sink_type: SinkType::File,
            queue_capacity: 2,
            params: HashMap::from([(
                "base_path".to_string(),
                dir.path().to_string_lossy().into_owned(),
            )]),
        }];
        let handle = create_dispatcher(configs, input_rx).unwrap().spawn();

        for i in 0..40 {
            input_tx.send(report(&format!("session{i}"))).await.unwrap();
        }
        drop(input_tx);

        let summary = handle.await.unwrap();
        assert_eq!(summary.reports, 40);
        assert_eq!(summary.sinks[0].1.written, 40);
        assert_eq!(summary.sinks[0].1.dropped, 0);
        for i in 0..40 {
            let dir = dir.path().join(format!("session{i}"));
            assert!(dir.join("alignment.json").exists(), "{}", dir.display());
        }
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_config() {
        let dir = tempdir().unwrap();
        let (input_tx, input_rx) = mpsc::channel(10);

        let configs = vec![
            SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 50,
                params: HashMap::new(),
            },
            SinkConfig {
                name: "files".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 4,
                params: HashMap::from([(
                    "base_path".to_string(),
                    dir.path().to_string_lossy().into_owned(),
                )]),
            },
        ];

        let dispatcher = create_dispatcher(configs, input_rx).unwrap();
        assert_eq!(dispatcher.metrics().len(), 2);
        let handle = dispatcher.spawn();

        input_tx.send(report("session1")).await.unwrap();
        drop(input_tx);

        let summary = handle.await.unwrap();
        assert_eq!(summary.reports, 1);
        assert!(dir.path().join("session1").join("alignment.json").exists());
        assert!(dir.path().join("session1").join("TL.align.json").exists());
    }
}
