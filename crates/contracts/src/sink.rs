//! ReportSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for report sinks.

use crate::{AlignmentReport, ContractError};

/// Report output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(ReportSink: Send)]
pub trait LocalReportSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one alignment report
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, report: &AlignmentReport) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}

/// File-system-safe form of a recording or view name
///
/// Path separators become `_`. Names made only of dots (or empty) get a
/// leading `_` so they never resolve to the current or parent folder.
pub fn path_safe_name(name: &str) -> String {
    let mut safe: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    if safe.chars().all(|c| c == '.') {
        safe.insert(0, '_');
    }
    safe
}
