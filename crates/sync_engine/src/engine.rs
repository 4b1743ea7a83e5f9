//! Alignment pipeline orchestration.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use contracts::{
    AlignmentMethod, AlignmentReport, AlignmentResult, AlignmentStage, ContractError,
    SignalSource, SyncEngineConfig, SyncError, SyncSignal, ViewFailure, ViewId, ViewStream,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::crosscorr::CrossCorrAligner;
use crate::detector::PulseDetector;
use crate::mapping::ClockMapping;
use crate::regression::RegressionAligner;
use crate::samplerate::{correct_timeline, SampleRateCorrector};

/// Multi-view LED sync engine
///
/// Cheap to clone; clones share configuration and stages.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

#[derive(Debug)]
struct EngineInner {
    config: SyncEngineConfig,
    detector: PulseDetector,
    crosscorr: CrossCorrAligner,
    regression: RegressionAligner,
    samplerate: SampleRateCorrector,
}

impl SyncEngine {
    /// Create a new sync engine with the given configuration
    pub fn new(config: SyncEngineConfig) -> Self {
        let inner = EngineInner {
            detector: PulseDetector::new(config.detector.clone()),
            crosscorr: CrossCorrAligner::new(config.crosscorr.clone()),
            regression: RegressionAligner::new(config.regression.clone()),
            samplerate: SampleRateCorrector::new(config.regression.match_tolerance_ms),
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &SyncEngineConfig {
        &self.inner.config
    }

    /// Detect pulses in one view's signal, honouring per-view thresholds
    pub fn detect(&self, view: &ViewId, signal: &SyncSignal) -> Result<ViewStream, SyncError> {
        let threshold = self.inner.config.view_thresholds.get(view).copied();
        self.inner.detector.detect(view, signal, threshold)
    }

    /// Load and detect one view
    pub fn detect_source(
        &self,
        view: &ViewId,
        source: &dyn SignalSource,
    ) -> Result<ViewStream, SyncError> {
        let signal = source
            .load_signal()
            .map_err(|e| SyncError::source_unavailable(view.clone(), e.to_string()))?;
        self.detect(view, &signal)
    }

    /// Run the configured stages for one detected view
    ///
    /// The first failing stage stops the view. When regression is
    /// configured, the final mapping must still satisfy the RMSE ceiling.
    #[instrument(
        level = "debug",
        name = "sync_engine_align",
        skip_all,
        fields(view = %target.view, pulses = target.len())
    )]
    pub fn align_stream(
        &self,
        reference: &ViewStream,
        target: &ViewStream,
    ) -> Result<AlignmentResult, SyncError> {
        let inner = &self.inner;
        let mut mapping = ClockMapping::IDENTITY;
        let mut stages = Vec::with_capacity(inner.config.stages.len());
        let mut fit_rmse = None;
        let mut matched = 0;

        for stage in &inner.config.stages {
            let started = Instant::now();
            match stage {
                AlignmentStage::CrossCorr => {
                    let coarse = inner.crosscorr.align(reference, target)?;
                    mapping = coarse.mapping;
                    matched = coarse.peak;
                }
                AlignmentStage::Regression => {
                    let fit = inner.regression.align(reference, target, &mapping)?;
                    mapping = fit.mapping;
                    fit_rmse = Some(fit.rmse);
                    matched = fit.pairs;
                }
                AlignmentStage::SampleRate => {
                    let correction = inner.samplerate.refine(reference, target, &mapping);
                    mapping = correction.mapping;
                    if correction.ratio.is_some() {
                        fit_rmse = correction.rmse;
                        matched = correction.pairs;
                    }
                }
            }
            observability::record_stage_seconds(
                stage.method().as_str(),
                started.elapsed().as_secs_f64(),
            );
            stages.push(stage.method());
        }

        if inner.config.runs(AlignmentStage::Regression) {
            if let Some(rmse) = fit_rmse {
                inner.regression.check_rmse(target, rmse)?;
            }
        }

        let corrected_timestamps = (inner.config.emit_timeline
            && inner.config.runs(AlignmentStage::SampleRate))
        .then(|| correct_timeline(target.frame_count, target.frame_rate, &mapping));

        Ok(AlignmentResult {
            view: target.view.clone(),
            offset: mapping.intercept,
            offset_frames: mapping.intercept * reference.frame_rate,
            scale: mapping.slope,
            fit_rmse,
            method: stages.last().copied().unwrap_or(AlignmentMethod::Identity),
            stages,
            matched_pulses: matched,
            frame_rate: target.frame_rate,
            window: None,
            corrected_timestamps,
        })
    }

    /// Load, detect and align one view against the reference
    pub fn align_view(
        &self,
        reference: &ViewStream,
        view: &ViewId,
        source: &dyn SignalSource,
    ) -> Result<AlignmentResult, SyncError> {
        let target = self.detect_source(view, source)?;
        let mut result = self.align_stream(reference, &target)?;
        result.window = source.window().filter(|window| !window.is_unbounded());
        Ok(result)
    }

    /// Align every view of one recording against the reference view
    ///
    /// The reference is detected first; without it nothing can be aligned
    /// and the whole run fails. Every other view runs as an independent
    /// blocking job, and its failure lands in the report instead of
    /// aborting the run.
    #[instrument(
        name = "sync_engine_run",
        skip(self, sources),
        fields(reference = %self.inner.config.reference_view, views = sources.len())
    )]
    pub async fn run(
        &self,
        recording: &str,
        sources: &BTreeMap<ViewId, Arc<dyn SignalSource>>,
    ) -> Result<AlignmentReport, ContractError> {
        let started = Instant::now();
        let reference_view = self.inner.config.reference_view.clone();
        let reference_source =
            sources
                .get(&reference_view)
                .cloned()
                .ok_or_else(|| ContractError::MissingReference {
                    view: reference_view.clone(),
                })?;

        let reference = {
            let engine = self.clone();
            let view = reference_view.clone();
            tokio::task::spawn_blocking(move || {
                engine.detect_source(&view, reference_source.as_ref())
            })
            .await
            .map_err(|e| ContractError::Other(format!("reference detection task failed: {e}")))?
            .map_err(|source| ContractError::ReferenceUnavailable {
                view: reference_view.clone(),
                source,
            })?
        };
        info!(pulses = reference.len(), rate = reference.frame_rate, "reference detected");
        let reference = Arc::new(reference);

        let limiter = match self.inner.config.max_parallel_views {
            0 => None,
            permits => Some(Arc::new(Semaphore::new(permits))),
        };

        let mut jobs = JoinSet::new();
        for (view, source) in sources.iter().filter(|(view, _)| **view != reference_view) {
            let permit = match &limiter {
                Some(limiter) => Some(
                    limiter
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|e| ContractError::Other(e.to_string()))?,
                ),
                None => None,
            };

            let engine = self.clone();
            let reference = reference.clone();
            let source = source.clone();
            let view = view.clone();
            jobs.spawn_blocking(move || {
                let _permit = permit;
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    engine.align_view(&reference, &view, source.as_ref())
                }))
                .unwrap_or_else(|panic| {
                    Err(SyncError::source_unavailable(
                        view.clone(),
                        format!("alignment job panicked: {}", panic_message(&*panic)),
                    ))
                });
                (view, outcome)
            });
        }

        let mut results = BTreeMap::new();
        let mut failures = Vec::new();
        while let Some(joined) = jobs.join_next().await {
            let (view, outcome) =
                joined.map_err(|e| ContractError::Other(format!("alignment job failed: {e}")))?;
            match outcome {
                Ok(result) => {
                    debug!(
                        view = %view,
                        offset = result.offset,
                        scale = result.scale,
                        rmse = ?result.fit_rmse,
                        method = %result.method,
                        "view aligned"
                    );
                    observability::record_view_aligned(&result);
                    results.insert(view, result);
                }
                Err(err) => {
                    warn!(view = %view, error = %err, "view failed");
                    let failure = ViewFailure::from(&err);
                    observability::record_view_failed(&failure);
                    failures.push(failure);
                }
            }
        }
        failures.sort_by(|a, b| a.view.cmp(&b.view));

        let report = AlignmentReport {
            recording: recording.to_string(),
            reference_view,
            reference_pulses: reference.len(),
            reference_rate: reference.frame_rate,
            generated_at: Utc::now(),
            results,
            failures,
        };

        metrics::histogram!("ledsync_run_seconds").record(started.elapsed().as_secs_f64());
        observability::record_report(&report);
        info!(
            aligned = report.results.len(),
            failed = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "recording aligned"
        );
        Ok(report)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
