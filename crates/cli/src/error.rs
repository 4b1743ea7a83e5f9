//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// `--recording` names a recording the config does not declare
    #[error("Unknown recording '{name}' (configured: {known})")]
    UnknownRecording { name: String, known: String },

    /// `--strict` run with failures
    #[error(
        "{failed_views} view(s) and {failed_recordings} recording(s) failed to align, \
         {lost_writes} sink write(s) lost"
    )]
    AlignmentIncomplete {
        failed_views: u64,
        failed_recordings: usize,
        lost_writes: u64,
    },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn unknown_recording<'a>(
        name: impl Into<String>,
        known: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self::UnknownRecording {
            name: name.into(),
            known: known.into_iter().collect::<Vec<_>>().join(", "),
        }
    }
}
