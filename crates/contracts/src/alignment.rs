//! AlignmentReport - Sync Engine output
//!
//! Mapping convention: a timestamp `t` in a view's clock lands at
//! `scale * t + offset` in the reference clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{SyncError, SyncErrorKind, TimeWindow, ViewId};

/// Alignment stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentMethod {
    /// No stage configured; the view is assumed to share the reference clock
    Identity,
    /// Integer-frame lag from onset cross-correlation
    #[serde(rename = "crosscorr")]
    CrossCorr,
    /// Least-squares fit of matched pulse times
    Regression,
    /// Rate correction from inter-pulse intervals
    #[serde(rename = "samplerate")]
    SampleRate,
}

impl AlignmentMethod {
    /// Configuration name of the stage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::CrossCorr => "crosscorr",
            Self::Regression => "regression",
            Self::SampleRate => "samplerate",
        }
    }
}

impl fmt::Display for AlignmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepted alignment of one non-reference view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Aligned view
    pub view: ViewId,

    /// Offset into the reference clock (seconds)
    pub offset: f64,

    /// Offset expressed in reference frames (sub-frame precision)
    pub offset_frames: f64,

    /// Clock-rate correction factor (1.0 = no drift)
    pub scale: f64,

    /// Residual RMSE of the final mapping over matched pulses (seconds)
    pub fit_rmse: Option<f64>,

    /// Last stage that shaped the mapping
    pub method: AlignmentMethod,

    /// Every stage applied, in order
    pub stages: Vec<AlignmentMethod>,

    /// Pulse pairs matched against the reference
    pub matched_pulses: usize,

    /// Nominal sample rate of the view (Hz)
    pub frame_rate: f64,

    /// Part of the view's source that was aligned; frame 0 is its start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeWindow>,

    /// Per-frame timestamps in the reference clock (samplerate stage only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_timestamps: Option<Vec<f64>>,
}

impl AlignmentResult {
    /// Identity alignment for `view`
    pub fn identity(view: ViewId, frame_rate: f64) -> Self {
        Self {
            view,
            offset: 0.0,
            offset_frames: 0.0,
            scale: 1.0,
            fit_rmse: None,
            method: AlignmentMethod::Identity,
            stages: Vec::new(),
            matched_pulses: 0,
            frame_rate,
            window: None,
            corrected_timestamps: None,
        }
    }

    /// Map a view timestamp into the reference clock
    #[inline]
    pub fn to_reference(&self, t: f64) -> f64 {
        self.scale * t + self.offset
    }

    /// Sample rate of the view measured in the reference clock (Hz)
    pub fn effective_rate(&self) -> f64 {
        self.frame_rate / self.scale
    }

    /// Clock drift in parts per million
    pub fn drift_ppm(&self) -> f64 {
        (self.scale - 1.0) * 1e6
    }
}

/// A view that could not be aligned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewFailure {
    pub view: ViewId,
    pub kind: SyncErrorKind,
    pub message: String,
}

impl From<&SyncError> for ViewFailure {
    fn from(err: &SyncError) -> Self {
        Self {
            view: err.view().clone(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of one synchronization run over a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentReport {
    /// Recording (session) name
    pub recording: String,

    /// Reference view all results are relative to
    pub reference_view: ViewId,

    /// Pulses detected in the reference view
    pub reference_pulses: usize,

    /// Reference stream sample rate (Hz)
    pub reference_rate: f64,

    /// When the report was produced
    pub generated_at: DateTime<Utc>,

    /// Accepted alignments (reference view excluded)
    pub results: BTreeMap<ViewId, AlignmentResult>,

    /// Views that failed, sorted by view
    pub failures: Vec<ViewFailure>,
}

impl AlignmentReport {
    /// Whether every view aligned
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of views attempted (reference excluded)
    pub fn attempted(&self) -> usize {
        self.results.len() + self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_serde_names() {
        let json = serde_json::to_string(&AlignmentMethod::CrossCorr).unwrap();
        assert_eq!(json, "\"crosscorr\"");
        let json = serde_json::to_string(&AlignmentMethod::SampleRate).unwrap();
        assert_eq!(json, "\"samplerate\"");
        let parsed: AlignmentMethod = serde_json::from_str("\"regression\"").unwrap();
        assert_eq!(parsed, AlignmentMethod::Regression);
    }

    #[test]
    fn test_identity_mapping() {
        let result = AlignmentResult::identity("TL".into(), 100.0);
        assert_eq!(result.to_reference(12.5), 12.5);
        assert_eq!(result.drift_ppm(), 0.0);
    }

    #[test]
    fn test_failure_from_sync_error() {
        let err = SyncError::InsufficientSyncSignal {
            view: "L".into(),
            detected: 0,
        };
        let failure = ViewFailure::from(&err);
        assert_eq!(failure.view, "L");
        assert_eq!(failure.kind, SyncErrorKind::InsufficientSyncSignal);
        assert!(failure.message.contains("0 pulse(s)"));
    }

    #[test]
    fn test_timeline_skipped_when_absent() {
        let result = AlignmentResult::identity("R".into(), 100.0);
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("corrected_timestamps"));
    }
}
