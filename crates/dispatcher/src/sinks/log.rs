//! LogSink - report summaries via tracing

use contracts::{AlignmentReport, ContractError, ReportSink};
use tracing::{debug, info, instrument, warn};

/// Sink that logs one summary line per report and a warning per failed view
pub struct LogSink {
    name: String,
    reports: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reports: 0,
        }
    }

    fn log_report(&self, report: &AlignmentReport) {
        info!(
            sink = %self.name,
            recording = %report.recording,
            reference = %report.reference_view,
            reference_pulses = report.reference_pulses,
            aligned = report.results.len(),
            failed = report.failures.len(),
            "alignment report"
        );

        for (view, result) in &report.results {
            debug!(
                sink = %self.name,
                view = %view,
                offset_s = result.offset,
                drift_ppm = result.drift_ppm(),
                rmse = ?result.fit_rmse,
                method = %result.method,
                "view aligned"
            );
        }

        for failure in &report.failures {
            warn!(
                sink = %self.name,
                recording = %report.recording,
                view = %failure.view,
                kind = failure.kind.as_str(),
                "{}",
                failure.message
            );
        }
    }
}

impl ReportSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, report),
        fields(sink = %self.name, recording = %report.recording)
    )]
    async fn write(&mut self, report: &AlignmentReport) -> Result<(), ContractError> {
        self.reports += 1;
        self.log_report(report);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, reports = self.reports, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{SyncErrorKind, ViewFailure};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let report = AlignmentReport {
            recording: "session1".into(),
            reference_view: "BC".into(),
            reference_pulses: 12,
            reference_rate: 100.0,
            generated_at: Utc::now(),
            results: BTreeMap::new(),
            failures: vec![ViewFailure {
                view: "L".into(),
                kind: SyncErrorKind::InsufficientSyncSignal,
                message: "no pulses".into(),
            }],
        };

        assert!(sink.write(&report).await.is_ok());
        assert_eq!(sink.reports, 1);
        assert!(sink.close().await.is_ok());
    }

    #[test]
    fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
