//! # Ingestion
//!
//! Sync signal sources.
//!
//! Responsibilities:
//! - Read raw gray8 videos and reduce each frame to the mean brightness of
//!   the sync crop
//! - Read precomputed brightness traces and analog (ephys) sync channels
//! - Generate synthetic LED trains for tests and demos
//! - Build sources from configuration (`SourceFactory`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::SourceFactory;
//!
//! let factory = SourceFactory::new().with_base_dir(config_dir);
//! let sources = factory.build_recording(&blueprint, &blueprint.recordings[0])?;
//! for (view, source) in &sources {
//!     let signal = source.load_signal()?;
//!     println!("{view}: {} samples", signal.samples.len());
//! }
//! ```

mod error;
mod factory;
mod metrics;
mod synthetic;
mod trace;
mod video;

// Re-exports
pub use error::{IngestionError, Result};
pub use factory::SourceFactory;
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use synthetic::{generate as generate_synthetic, pulse_onsets, SyntheticLedSource};
pub use trace::{
    parse_analog_trace, parse_brightness_trace, window_samples, AnalogTraceSource,
    BrightnessTraceSource, DEFAULT_ANALOG_CHANNEL,
};
pub use video::{crop_brightness, RawVideoSource, VideoSignalSource};
