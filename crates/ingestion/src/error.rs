//! Ingestion error types

use std::path::PathBuf;

use contracts::{ContractError, ViewId};
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Backing file could not be read
    #[error("cannot read {path:?} for view {view}: {source}")]
    Io {
        view: ViewId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A trace line could not be parsed
    #[error("{path:?} line {line} (view {view}): {message}")]
    Parse {
        view: ViewId,
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Video file length is not a whole number of frames
    #[error("view {view}: video of {len} bytes is not a multiple of the {frame_len}-byte frame size")]
    FrameSize {
        view: ViewId,
        len: usize,
        frame_len: usize,
    },

    /// Frame index past the end of the video
    #[error("view {view}: frame {index} out of range ({count} frames)")]
    FrameOutOfRange { view: ViewId, index: u64, count: u64 },

    /// Crop region does not intersect the frame
    #[error("view {view}: crop lies outside the {width}x{height} frame")]
    CropOutsideFrame { view: ViewId, width: u32, height: u32 },

    /// Source produced no samples
    #[error("view {view}: source contains no samples")]
    EmptySignal { view: ViewId },

    /// Source parameters are unusable
    #[error("view {view}: {message}")]
    InvalidParams { view: ViewId, message: String },
}

impl IngestionError {
    /// View the error belongs to
    pub fn view(&self) -> &ViewId {
        match self {
            Self::Io { view, .. }
            | Self::Parse { view, .. }
            | Self::FrameSize { view, .. }
            | Self::FrameOutOfRange { view, .. }
            | Self::CropOutsideFrame { view, .. }
            | Self::EmptySignal { view }
            | Self::InvalidParams { view, .. } => view,
        }
    }
}

impl From<IngestionError> for ContractError {
    fn from(err: IngestionError) -> Self {
        ContractError::source_read(err.view().clone(), err.to_string())
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
