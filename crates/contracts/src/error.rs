//! Layered error definitions
//!
//! Categorized by source: config / source / sync / sink.
//!
//! [`SyncError`] is the per-view failure surfaced inside an
//! `AlignmentReport`; [`ContractError`] is the crate-level error returned
//! when a whole operation cannot proceed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ViewId;

/// Per-view synchronization failure
///
/// None of these abort a run: the orchestrator records them next to the
/// successful results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// Too few LED pulses (or matched pulse pairs) to align on
    #[error("insufficient sync signal for view '{view}': {detected} pulse(s) usable, need at least 2")]
    InsufficientSyncSignal { view: ViewId, detected: usize },

    /// Coarse cross-correlation has no peak above the floor
    #[error("no correlation peak for view '{view}': peak {peak} below floor {floor:.2}")]
    NoCorrelationPeak { view: ViewId, peak: usize, floor: f64 },

    /// Linear fit residual exceeds the configured ceiling
    #[error("regression fit rejected for view '{view}': rmse {rmse:.6}s > max {max_rmse:.6}s")]
    RegressionFitRejected {
        view: ViewId,
        rmse: f64,
        max_rmse: f64,
    },

    /// The view's signal could not be loaded
    #[error("sync source unavailable for view '{view}': {message}")]
    SourceUnavailable { view: ViewId, message: String },
}

impl SyncError {
    /// View the failure belongs to
    pub fn view(&self) -> &ViewId {
        match self {
            Self::InsufficientSyncSignal { view, .. }
            | Self::NoCorrelationPeak { view, .. }
            | Self::RegressionFitRejected { view, .. }
            | Self::SourceUnavailable { view, .. } => view,
        }
    }

    /// Serializable discriminant
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            Self::InsufficientSyncSignal { .. } => SyncErrorKind::InsufficientSyncSignal,
            Self::NoCorrelationPeak { .. } => SyncErrorKind::NoCorrelationPeak,
            Self::RegressionFitRejected { .. } => SyncErrorKind::RegressionFitRejected,
            Self::SourceUnavailable { .. } => SyncErrorKind::SourceUnavailable,
        }
    }

    /// Create source unavailable error
    pub fn source_unavailable(view: impl Into<ViewId>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            view: view.into(),
            message: message.into(),
        }
    }
}

/// Failure kind as written into reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    InsufficientSyncSignal,
    NoCorrelationPeak,
    RegressionFitRejected,
    SourceUnavailable,
}

impl SyncErrorKind {
    /// Name as written into reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientSyncSignal => "insufficient_sync_signal",
            Self::NoCorrelationPeak => "no_correlation_peak",
            Self::RegressionFitRejected => "regression_fit_rejected",
            Self::SourceUnavailable => "source_unavailable",
        }
    }
}

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Sync Errors =====
    /// No source was provided for the reference view
    #[error("no sync source provided for reference view '{view}'")]
    MissingReference { view: ViewId },

    /// Reference view could not produce a usable pulse stream
    #[error("reference view '{view}' unusable: {source}")]
    ReferenceUnavailable {
        view: ViewId,
        #[source]
        source: SyncError,
    },

    // ===== Source Errors =====
    /// Frame or sample read error
    #[error("source read error for view '{view}': {message}")]
    SourceRead { view: ViewId, message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create source read error
    pub fn source_read(view: impl Into<ViewId>, message: impl Into<String>) -> Self {
        Self::SourceRead {
            view: view.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
