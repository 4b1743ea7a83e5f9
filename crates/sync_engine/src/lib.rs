//! # Sync Engine
//!
//! LED-pulse alignment of camera views (and ephys channels) against a
//! reference view.
//!
//! Stages, run in the configured order:
//! - Pulse detection: onsets from normalized brightness or raw analog
//! - Cross-correlation: integer frame lag between onset trains
//! - Regression: least-squares `t_ref = slope * t_view + intercept`
//! - Sample-rate correction: rate ratio from inter-pulse intervals and the
//!   per-frame timeline in the reference clock
//!
//! ## Usage
//!
//! ```ignore
//! use sync_engine::{SyncEngine, SyncEngineConfig};
//!
//! let engine = SyncEngine::new(SyncEngineConfig::new("BC"));
//! let report = engine.run("session1", &sources).await?;
//!
//! for (view, result) in &report.results {
//!     println!("{view}: offset {:.4}s, drift {:.1}ppm", result.offset, result.drift_ppm());
//! }
//! ```

mod crosscorr;
mod detector;
mod engine;
mod mapping;
mod regression;
mod samplerate;

pub use crosscorr::{CoarseAlignment, CrossCorrAligner};
pub use detector::{detect_onsets, min_off_samples, normalize_brightness, PulseDetector};
pub use engine::SyncEngine;
pub use mapping::{match_pulses, ClockMapping, PulsePair};
pub use regression::{fit_line, RegressionAligner, RegressionFit};
pub use samplerate::{correct, correct_timeline, RateCorrection, SampleRateCorrector};

// Re-exports
pub use contracts::{
    AlignmentStage, CrossCorrConfig, DetectorConfig, RegressionConfig, SyncEngineConfig,
};
