//! Sync engine configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{AlignmentMethod, ViewId};

/// Default LED threshold on the normalized brightness scale
pub const DEFAULT_LED_THRESHOLD: f64 = 0.9;

/// Default absolute threshold for analog sync channels
pub const DEFAULT_ANALOG_THRESHOLD: f64 = 0.1;

/// Default LED-off period before a new onset counts (milliseconds)
pub const DEFAULT_MIN_OFF_MS: f64 = 20.0;

/// Default regression RMSE ceiling (seconds)
pub const DEFAULT_MAX_REGRESSION_RMSE: f64 = 1e-2;

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEngineConfig {
    /// Reference view ID (main clock source)
    pub reference_view: ViewId,

    /// Stages to run, in order
    pub stages: Vec<AlignmentStage>,

    /// Pulse detector configuration
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Cross-correlation configuration
    #[serde(default)]
    pub crosscorr: CrossCorrConfig,

    /// Regression configuration
    #[serde(default)]
    pub regression: RegressionConfig,

    /// Per-view threshold overrides
    #[serde(default)]
    pub view_thresholds: HashMap<ViewId, f64>,

    /// Upper bound on views aligned concurrently (0 = unbounded)
    #[serde(default)]
    pub max_parallel_views: usize,

    /// Emit per-frame corrected timelines from the samplerate stage
    #[serde(default = "default_emit_timeline")]
    pub emit_timeline: bool,
}

fn default_emit_timeline() -> bool {
    true
}

impl SyncEngineConfig {
    /// Configuration with the default stage order
    pub fn new(reference_view: impl Into<ViewId>) -> Self {
        Self {
            reference_view: reference_view.into(),
            stages: AlignmentStage::default_pipeline(),
            detector: DetectorConfig::default(),
            crosscorr: CrossCorrConfig::default(),
            regression: RegressionConfig::default(),
            view_thresholds: HashMap::new(),
            max_parallel_views: 0,
            emit_timeline: true,
        }
    }

    /// Whether `stage` is part of the pipeline
    pub fn runs(&self, stage: AlignmentStage) -> bool {
        self.stages.contains(&stage)
    }
}

/// Configurable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentStage {
    #[serde(rename = "crosscorr")]
    CrossCorr,
    Regression,
    #[serde(rename = "samplerate")]
    SampleRate,
}

impl AlignmentStage {
    /// crosscorr → regression → samplerate
    pub fn default_pipeline() -> Vec<Self> {
        vec![Self::CrossCorr, Self::Regression, Self::SampleRate]
    }

    /// Method recorded in results for this stage
    pub fn method(&self) -> AlignmentMethod {
        match self {
            Self::CrossCorr => AlignmentMethod::CrossCorr,
            Self::Regression => AlignmentMethod::Regression,
            Self::SampleRate => AlignmentMethod::SampleRate,
        }
    }
}

/// Pulse detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Normalized brightness threshold (0-1)
    pub led_threshold: f64,
    /// Absolute threshold for analog channels
    pub analog_threshold: f64,
    /// Minimum LED-off time before a new onset counts (milliseconds)
    pub min_off_ms: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            led_threshold: DEFAULT_LED_THRESHOLD,
            analog_threshold: DEFAULT_ANALOG_THRESHOLD,
            min_off_ms: DEFAULT_MIN_OFF_MS,
        }
    }
}

/// Cross-correlation configuration
///
/// The search visits every reference/target onset pair and keeps one
/// counter per reachable lag. Without `max_lag_frames` the counters cover
/// the full recording span (two per grid frame of recording length, about
/// 5.8 MB for an hour at 100 Hz). Setting it caps the histogram at
/// `2 * max_lag_frames + 1` entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossCorrConfig {
    /// Peak must reach this fraction of the smaller pulse count
    pub min_correlation_ratio: f64,
    /// Largest lag searched, in reference frames (None = unbounded)
    pub max_lag_frames: Option<u64>,
}

impl Default for CrossCorrConfig {
    fn default() -> Self {
        Self {
            min_correlation_ratio: 0.5,
            max_lag_frames: None,
        }
    }
}

/// Regression configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionConfig {
    /// Residual RMSE ceiling (seconds)
    pub max_rmse: f64,
    /// Pulse matching tolerance in milliseconds
    /// (None = half the median reference inter-pulse interval)
    pub match_tolerance_ms: Option<f64>,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            max_rmse: DEFAULT_MAX_REGRESSION_RMSE,
            match_tolerance_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_order() {
        let config = SyncEngineConfig::new("BC");
        assert_eq!(
            config.stages,
            vec![
                AlignmentStage::CrossCorr,
                AlignmentStage::Regression,
                AlignmentStage::SampleRate
            ]
        );
        assert!(config.runs(AlignmentStage::Regression));
        assert_eq!(config.detector.led_threshold, 0.9);
        assert_eq!(config.detector.min_off_ms, 20.0);
        assert_eq!(config.regression.max_rmse, 0.01);
    }

    #[test]
    fn test_stage_names() {
        let stages: Vec<AlignmentStage> =
            serde_json::from_str(r#"["crosscorr", "regression", "samplerate"]"#).unwrap();
        assert_eq!(stages, AlignmentStage::default_pipeline());
        assert!(serde_json::from_str::<AlignmentStage>("\"fft\"").is_err());
    }

    #[test]
    fn test_stage_method() {
        assert_eq!(
            AlignmentStage::SampleRate.method(),
            AlignmentMethod::SampleRate
        );
    }
}
