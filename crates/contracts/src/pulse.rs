//! PulseEvent / ViewStream - Pulse Detector output
//!
//! Time model: every stream keeps its own clock. `timestamp` is
//! `frame_index / sample_rate` of that stream; mapping into the reference
//! clock is the job of the aligners.

use serde::{Deserialize, Serialize};

use crate::ViewId;

/// One detected LED onset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseEvent {
    /// View the pulse was detected in
    pub view: ViewId,

    /// Sample (frame) index of the onset
    pub frame_index: u64,

    /// Onset time in the stream's own clock (seconds)
    pub timestamp: f64,
}

impl PulseEvent {
    /// Create an event at `frame_index` for a stream sampled at `sample_rate`
    pub fn new(view: ViewId, frame_index: u64, sample_rate: f64) -> Self {
        Self {
            view,
            frame_index,
            timestamp: frame_index as f64 / sample_rate,
        }
    }
}

/// Pulse onsets detected in one view
///
/// Events are strictly increasing in `frame_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewStream {
    /// View identifier
    pub view: ViewId,

    /// Detected onsets
    pub events: Vec<PulseEvent>,

    /// Nominal sample rate (frames or samples per second)
    pub frame_rate: f64,

    /// Total number of samples in the source signal
    pub frame_count: u64,
}

impl ViewStream {
    /// Number of detected pulses
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no pulse was detected
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Onset timestamps in the stream's own clock
    pub fn timestamps(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.timestamp).collect()
    }

    /// Stream duration in seconds
    pub fn duration(&self) -> f64 {
        self.frame_count as f64 / self.frame_rate
    }
}

/// How a raw sync signal should be interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Mean brightness of a crop region; normalized before thresholding
    #[default]
    Brightness,
    /// Analog voltage (ephys sync channel); thresholded as-is
    Analog,
}

/// A fully loaded sync signal
#[derive(Debug, Clone)]
pub struct SyncSignal {
    /// One value per frame / sample
    pub samples: Vec<f64>,

    /// Sample rate (Hz)
    pub sample_rate: f64,

    /// Signal interpretation
    pub kind: SignalKind,
}

impl SyncSignal {
    /// Signal duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }
}

/// Part of a source that was read, in seconds of the source's own clock
///
/// Frame indices (and so pulse timestamps) of a windowed signal count from
/// `time_start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub time_start: Option<f64>,
    pub time_end: Option<f64>,
}

impl TimeWindow {
    pub fn new(time_start: Option<f64>, time_end: Option<f64>) -> Self {
        Self {
            time_start,
            time_end,
        }
    }

    /// Whether the window covers the whole source
    pub fn is_unbounded(&self) -> bool {
        self.time_start.is_none() && self.time_end.is_none()
    }

    /// Sample index range of the window within `len` samples at `sample_rate`
    ///
    /// Bounds are rounded to the nearest sample and clamped to the signal.
    pub fn sample_range(&self, len: usize, sample_rate: f64) -> std::ops::Range<usize> {
        let index = |t: f64| ((t * sample_rate).round().max(0.0) as usize).min(len);
        let start = self.time_start.map_or(0, index);
        let end = self.time_end.map_or(len, index);
        start..end.max(start)
    }
}
