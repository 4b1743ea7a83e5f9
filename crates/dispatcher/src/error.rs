//! Dispatcher error types

use thiserror::Error;

/// Dispatcher errors
///
/// Write failures inside a sink are counted in its metrics, never returned.
#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Sink worker stopped before the dispatcher, report dropped
    #[error("worker for sink '{sink_name}' is gone, report for '{recording}' dropped")]
    WorkerClosed {
        sink_name: String,
        recording: String,
    },
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
