//! RigBlueprint - Config Loader output
//!
//! Describes a complete rig: camera views and their crops, the sync
//! strategy, the recordings to align and the output routing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use validator::Validate;

use crate::{
    AlignmentStage, CropRegion, CrossCorrConfig, DetectorConfig, RegressionConfig, SignalKind,
    SyncEngineConfig, ViewId, DEFAULT_ANALOG_THRESHOLD, DEFAULT_LED_THRESHOLD,
    DEFAULT_MAX_REGRESSION_RMSE, DEFAULT_MIN_OFF_MS,
};

/// Crop name meaning "the view's main crop"
pub const DEFAULT_CROP: &str = "default";

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete rig configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Project metadata
    pub project: ProjectConfig,

    /// Sync strategy
    pub sync: SyncSettings,

    /// Camera views (and analog channels)
    pub views: Vec<ViewConfig>,

    /// Recordings to align
    #[serde(default)]
    pub recordings: Vec<RecordingConfig>,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Project metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

/// Sync strategy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncSettings {
    /// Stages to run, in order
    #[serde(default = "AlignmentStage::default_pipeline")]
    pub pipeline: Vec<AlignmentStage>,

    /// Normalized LED threshold
    #[serde(default = "default_led_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub led_threshold: f64,

    /// Regression RMSE ceiling (seconds)
    #[serde(default = "default_max_rmse")]
    #[validate(range(exclusive_min = 0.0))]
    pub max_regression_rmse: f64,

    /// Reference view
    pub ref_view: ViewId,

    /// Crop holding the sync LED
    #[serde(default = "default_ref_crop")]
    pub ref_crop: String,

    /// Minimum LED-off time between onsets (milliseconds)
    #[serde(default = "default_min_off_ms")]
    #[validate(range(min = 0.0))]
    pub min_off_ms: f64,

    #[serde(default = "default_min_correlation_ratio")]
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub min_correlation_ratio: f64,

    #[serde(default)]
    pub max_lag_frames: Option<u64>,

    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub match_tolerance_ms: Option<f64>,

    /// Views aligned concurrently (0 = unbounded)
    #[serde(default)]
    pub max_parallel_views: usize,

    /// Emit per-frame corrected timelines
    #[serde(default = "default_true")]
    pub emit_timeline: bool,
}

fn default_led_threshold() -> f64 {
    DEFAULT_LED_THRESHOLD
}

fn default_max_rmse() -> f64 {
    DEFAULT_MAX_REGRESSION_RMSE
}

fn default_min_off_ms() -> f64 {
    DEFAULT_MIN_OFF_MS
}

fn default_ref_crop() -> String {
    DEFAULT_CROP.to_string()
}

fn default_min_correlation_ratio() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

/// One camera view (or analog channel)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Unique identifier (e.g. "TL", "BC")
    pub id: ViewId,

    /// Frames (samples) per second, must be > 0
    pub frame_rate: f64,

    /// Signal interpretation
    #[serde(default)]
    pub signal: SignalKind,

    /// Threshold override for this view
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Main crop
    #[serde(default)]
    pub crop: CropRegion,

    /// Named additional crops (e.g. "sync_led")
    #[serde(default)]
    pub extra_crops: HashMap<String, CropRegion>,
}

impl ViewConfig {
    /// Crop called `name`, falling back to the main crop
    ///
    /// The flag is `true` when the fallback was taken for a non-default name.
    pub fn crop_named(&self, name: &str) -> (CropRegion, bool) {
        if name == DEFAULT_CROP {
            return (self.crop, false);
        }
        match self.extra_crops.get(name) {
            Some(crop) => (*crop, false),
            None => (self.crop, true),
        }
    }
}

/// One recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Unique recording name
    pub name: String,

    /// Signal source per view
    #[serde(default)]
    pub sources: BTreeMap<ViewId, SourceConfig>,
}

/// Where a view's sync signal comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Headerless gray8 frames, `width * height` bytes each
    RawVideo {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    /// Precomputed per-frame brightness, one value per line
    BrightnessTrace { path: PathBuf },
    /// Tab or whitespace separated columns from an acquisition system
    /// (`timestamp<TAB>signal` by default)
    AnalogTrace {
        path: PathBuf,
        /// Zero-based column holding the sync channel (default 1)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<usize>,
        /// Read from this time on (seconds)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_start: Option<f64>,
        /// Read up to this time (seconds)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_end: Option<f64>,
    },
    /// Generated LED pulse train
    Synthetic(SyntheticParams),
}

impl SourceConfig {
    /// Short type name for logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::RawVideo { .. } => "raw_video",
            Self::BrightnessTrace { .. } => "brightness_trace",
            Self::AnalogTrace { .. } => "analog_trace",
            Self::Synthetic(_) => "synthetic",
        }
    }
}

/// Synthetic LED train parameters
///
/// Pulse onsets are drawn in the reference clock from `seed`, so views
/// sharing a seed see the same train. A view's local clock relates to the
/// reference as `t_ref = (1 + drift_ppm * 1e-6) * t_view + offset_s`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticParams {
    /// Recording length in the view's clock (seconds)
    pub duration_s: f64,
    /// Mean time between pulse onsets (seconds)
    pub mean_interval_s: f64,
    /// Uniform jitter added to each interval (seconds)
    pub jitter_s: f64,
    /// LED on time (seconds)
    pub pulse_width_s: f64,
    /// View clock offset against the reference (seconds)
    pub offset_s: f64,
    /// View clock drift (parts per million)
    pub drift_ppm: f64,
    /// Uniform noise amplitude added to every sample
    pub noise: f64,
    /// Pulse train seed
    pub seed: u64,
    /// Noise seed (defaults to `seed + 1`, wrapping at `u64::MAX`)
    pub noise_seed: Option<u64>,
    /// Indices of pulses the view misses (occluded LED)
    pub dropped_pulses: Vec<usize>,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            duration_s: 60.0,
            mean_interval_s: 1.0,
            jitter_s: 0.3,
            pulse_width_s: 0.05,
            offset_s: 0.0,
            drift_ppm: 0.0,
            noise: 0.0,
            seed: 0,
            noise_seed: None,
            dropped_pulses: Vec::new(),
        }
    }
}

/// Sink output config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    16
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON/CSV file output
    File,
}

impl RigBlueprint {
    /// Build a SyncEngineConfig from the blueprint
    pub fn to_sync_engine_config(&self) -> SyncEngineConfig {
        let view_thresholds = self
            .views
            .iter()
            .filter_map(|view| view.threshold.map(|t| (view.id.clone(), t)))
            .collect();

        SyncEngineConfig {
            reference_view: self.sync.ref_view.clone(),
            stages: self.sync.pipeline.clone(),
            detector: DetectorConfig {
                led_threshold: self.sync.led_threshold,
                analog_threshold: DEFAULT_ANALOG_THRESHOLD,
                min_off_ms: self.sync.min_off_ms,
            },
            crosscorr: CrossCorrConfig {
                min_correlation_ratio: self.sync.min_correlation_ratio,
                max_lag_frames: self.sync.max_lag_frames,
            },
            regression: RegressionConfig {
                max_rmse: self.sync.max_regression_rmse,
                match_tolerance_ms: self.sync.match_tolerance_ms,
            },
            view_thresholds,
            max_parallel_views: self.sync.max_parallel_views,
            emit_timeline: self.sync.emit_timeline,
        }
    }

    /// Look up a view
    pub fn view(&self, id: &str) -> Option<&ViewConfig> {
        self.views.iter().find(|view| view.id == id)
    }

    /// Look up a recording
    pub fn recording(&self, name: &str) -> Option<&RecordingConfig> {
        self.recordings.iter().find(|rec| rec.name == name)
    }

    /// Sync crop of `view`, with the fallback flag of [`ViewConfig::crop_named`]
    pub fn sync_crop(&self, view: &ViewConfig) -> (CropRegion, bool) {
        view.crop_named(&self.sync.ref_crop)
    }

    /// Views lacking the configured sync crop
    pub fn views_without_sync_crop(&self) -> Vec<&ViewId> {
        self.views
            .iter()
            .filter(|view| view.signal == SignalKind::Brightness && self.sync_crop(view).1)
            .map(|view| &view.id)
            .collect()
    }
}
