//! Pipeline orchestrator - sources, engine and dispatcher for one run.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{RecordingConfig, RigBlueprint};
use ingestion::SourceFactory;
use sync_engine::SyncEngine;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn, Instrument};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The rig blueprint
    pub blueprint: RigBlueprint,

    /// Directory relative source paths are resolved against
    pub base_dir: Option<PathBuf>,

    /// Recordings to align (empty = all)
    pub recordings: Vec<String>,

    /// Report channel capacity
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Recordings selected by the config, in configuration order
    pub fn selected_recordings(&self) -> Result<Vec<&RecordingConfig>, CliError> {
        let blueprint = &self.config.blueprint;
        if self.config.recordings.is_empty() {
            return Ok(blueprint.recordings.iter().collect());
        }

        self.config
            .recordings
            .iter()
            .map(|name| {
                blueprint.recording(name).ok_or_else(|| {
                    CliError::unknown_recording(
                        name,
                        blueprint.recordings.iter().map(|r| r.name.as_str()),
                    )
                })
            })
            .collect()
    }

    /// Align every selected recording and dispatch the reports
    ///
    /// A recording whose sources cannot be built or whose reference view
    /// is unusable is logged and skipped; the rest still run.
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;
        let recordings = self.selected_recordings()?;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let mut factory = SourceFactory::new();
        if let Some(dir) = &self.config.base_dir {
            factory = factory.with_base_dir(dir.clone());
        }

        let engine = SyncEngine::new(blueprint.to_sync_engine_config());
        info!(
            reference = %blueprint.sync.ref_view,
            stages = ?blueprint.sync.pipeline,
            recordings = recordings.len(),
            "Sync engine configured"
        );

        let (report_tx, report_rx) = mpsc::channel(self.config.buffer_size.max(1));
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - reports are only summarized");
        }
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), report_rx)
            .context("Failed to create dispatcher")?;
        let dispatcher_handle = dispatcher.spawn();
        info!(sinks = blueprint.sinks.len(), "Dispatcher started");

        let mut stats = PipelineStats::default();
        for recording in recordings {
            let span = info_span!("recording", name = %recording.name);
            let outcome = async {
                let sources = factory
                    .build_recording(blueprint, recording)
                    .context("Failed to build signal sources")?;
                engine
                    .run(&recording.name, &sources)
                    .await
                    .context("Alignment failed")
            }
            .instrument(span)
            .await;

            match outcome {
                Ok(report) => {
                    info!(
                        recording = %report.recording,
                        aligned = report.results.len(),
                        failed = report.failures.len(),
                        "Recording aligned"
                    );
                    stats.alignment.update(&report);
                    if report_tx.send(report).await.is_err() {
                        warn!("Dispatcher channel closed");
                        break;
                    }
                }
                Err(e) => {
                    error!(recording = %recording.name, error = format!("{e:#}"), "Recording skipped");
                    stats
                        .failed_recordings
                        .push((recording.name.clone(), format!("{e:#}")));
                }
            }
        }

        // Closing the channel lets the dispatcher drain and close its sinks
        drop(report_tx);
        let summary = dispatcher_handle
            .await
            .context("Dispatcher task failed")?;

        stats.sinks = summary.sinks;
        stats.ingestion = factory.metrics().snapshot();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            reports = summary.reports,
            "Pipeline complete"
        );

        Ok(stats)
    }
}
