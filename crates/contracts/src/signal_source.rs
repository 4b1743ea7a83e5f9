//! SignalSource / FrameSource traits - Sync signal abstraction
//!
//! Decouples the sync engine from where a view's LED signal comes from:
//! decoded video frames, a precomputed brightness trace, an ephys analog
//! channel, or a synthetic generator for tests.

use crate::{ContractError, GrayFrame, SignalKind, SyncSignal, TimeWindow, ViewId};

/// Source of one view's sync signal
///
/// Loading is blocking; the orchestrator calls it from a blocking worker.
///
/// # Example
///
/// ```ignore
/// let source: Arc<dyn SignalSource> = build_source(&view, &source_config)?;
/// let signal = source.load_signal()?;
/// println!("{} samples at {} Hz", signal.samples.len(), signal.sample_rate);
/// ```
pub trait SignalSource: Send + Sync {
    /// View this source belongs to
    fn view_id(&self) -> &ViewId;

    /// Nominal sample rate (Hz)
    fn sample_rate(&self) -> f64;

    /// How the samples should be thresholded
    fn signal_kind(&self) -> SignalKind;

    /// Load the full signal, one value per frame / sample
    ///
    /// # Errors
    /// Returns `ContractError::SourceRead` (or `Io`) when the backing data
    /// cannot be read.
    fn load_signal(&self) -> Result<SyncSignal, ContractError>;

    /// Time window `load_signal` is restricted to, if any
    fn window(&self) -> Option<TimeWindow> {
        None
    }
}

/// Random access to decoded gray frames of one video
pub trait FrameSource: Send + Sync {
    /// View this video belongs to
    fn view_id(&self) -> &ViewId;

    /// Frames per second
    fn frame_rate(&self) -> f64;

    /// Number of frames available
    fn frame_count(&self) -> u64;

    /// Read frame `index`
    ///
    /// # Errors
    /// Out-of-range index or read failure.
    fn frame(&self, index: u64) -> Result<GrayFrame, ContractError>;
}
