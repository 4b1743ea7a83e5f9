//! Source construction from configuration

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{
    CropRegion, RecordingConfig, RigBlueprint, SignalKind, SignalSource, SourceConfig,
    TimeWindow, ViewConfig, ViewId,
};
use tracing::debug;

use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;
use crate::synthetic::SyntheticLedSource;
use crate::trace::{AnalogTraceSource, BrightnessTraceSource, DEFAULT_ANALOG_CHANNEL};
use crate::video::VideoSignalSource;

/// Builds signal sources, resolving relative paths against a base directory
///
/// All sources share the factory's [`IngestionMetrics`].
#[derive(Debug, Clone, Default)]
pub struct SourceFactory {
    base_dir: Option<PathBuf>,
    metrics: Arc<IngestionMetrics>,
}

impl SourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `dir` (usually the config file's directory)
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Shared load metrics
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Build the source of one view
    ///
    /// Construction never touches the file system; read problems surface
    /// when the signal is loaded.
    pub fn build(
        &self,
        view: &ViewConfig,
        crop: CropRegion,
        source: &SourceConfig,
    ) -> Result<Arc<dyn SignalSource>> {
        if !(view.frame_rate > 0.0) {
            return Err(IngestionError::InvalidParams {
                view: view.id.clone(),
                message: format!("frame_rate must be > 0, got {}", view.frame_rate),
            });
        }

        debug!(view = %view.id, kind = source.kind_name(), "building signal source");
        let metrics = self.metrics.clone();
        let id = view.id.clone();
        let built: Arc<dyn SignalSource> = match source {
            SourceConfig::RawVideo {
                path,
                width,
                height,
            } => Arc::new(VideoSignalSource::new(
                id,
                self.resolve(path),
                (*width, *height),
                view.frame_rate,
                crop,
                metrics,
            )),
            SourceConfig::BrightnessTrace { path } => Arc::new(BrightnessTraceSource::new(
                id,
                self.resolve(path),
                view.frame_rate,
                metrics,
            )),
            SourceConfig::AnalogTrace {
                path,
                channel,
                time_start,
                time_end,
            } => {
                let window = TimeWindow::new(*time_start, *time_end);
                check_window(&id, &window)?;
                Arc::new(
                    AnalogTraceSource::new(id, self.resolve(path), view.frame_rate, metrics)
                        .with_channel(channel.unwrap_or(DEFAULT_ANALOG_CHANNEL))
                        .with_window(window),
                )
            }
            SourceConfig::Synthetic(params) => Arc::new(SyntheticLedSource::new(
                id,
                params.clone(),
                view.frame_rate,
                view.signal,
                metrics,
            )),
        };

        if source_kind(source).is_some_and(|kind| kind != view.signal) {
            debug!(
                view = %view.id,
                declared = ?view.signal,
                actual = ?built.signal_kind(),
                "source kind overrides the view's declared signal"
            );
        }
        Ok(built)
    }

    /// Build every source of `recording`, keyed by view
    pub fn build_recording(
        &self,
        blueprint: &RigBlueprint,
        recording: &RecordingConfig,
    ) -> Result<BTreeMap<ViewId, Arc<dyn SignalSource>>> {
        let mut sources = BTreeMap::new();
        for (view_id, source) in &recording.sources {
            let view = blueprint
                .view(view_id)
                .ok_or_else(|| IngestionError::InvalidParams {
                    view: view_id.clone(),
                    message: format!("view not declared for recording '{}'", recording.name),
                })?;
            let (crop, _) = blueprint.sync_crop(view);
            sources.insert(view_id.clone(), self.build(view, crop, source)?);
        }
        Ok(sources)
    }
}

/// Signal kind fixed by the source type itself
fn check_window(view: &ViewId, window: &TimeWindow) -> Result<()> {
    let invalid = |message: String| {
        Err(IngestionError::InvalidParams {
            view: view.clone(),
            message,
        })
    };
    match (window.time_start, window.time_end) {
        (Some(start), _) if !(start >= 0.0) => {
            invalid(format!("time_start must be >= 0, got {start}"))
        }
        (_, Some(end)) if !(end > 0.0) => invalid(format!("time_end must be > 0, got {end}")),
        (Some(start), Some(end)) if end <= start => {
            invalid(format!("time_end ({end}) must be after time_start ({start})"))
        }
        _ => Ok(()),
    }
}

fn source_kind(source: &SourceConfig) -> Option<SignalKind> {
    match source {
        SourceConfig::RawVideo { .. } | SourceConfig::BrightnessTrace { .. } => {
            Some(SignalKind::Brightness)
        }
        SourceConfig::AnalogTrace { .. } => Some(SignalKind::Analog),
        SourceConfig::Synthetic(_) => None,
    }
}
