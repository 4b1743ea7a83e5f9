//! Run statistics.

use std::time::Duration;

use observability::AlignmentMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Per-report alignment metrics
    pub alignment: AlignmentMetricsAggregator,

    /// Recordings that produced no report, with the reason
    pub failed_recordings: Vec<(String, String)>,

    /// Signal loading counters
    pub ingestion: ingestion::MetricsSnapshot,

    /// Final metrics per sink
    pub sinks: Vec<(String, dispatcher::MetricsSnapshot)>,

    /// Total duration of the run
    pub duration: Duration,
}

impl PipelineStats {
    /// Views attempted but not aligned
    pub fn failed_views(&self) -> u64 {
        self.alignment.total_views - self.alignment.aligned_views
    }

    /// Reports some sink failed to write or never received
    pub fn lost_writes(&self) -> u64 {
        self.sinks
            .iter()
            .map(|(_, snapshot)| snapshot.failed + snapshot.dropped)
            .sum()
    }

    /// Whether every recording and view aligned and every report reached
    /// every sink
    pub fn is_complete(&self) -> bool {
        self.failed_views() == 0 && self.failed_recordings.is_empty() && self.lost_writes() == 0
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Reports: {}", self.alignment.total_reports);
        println!("   ├─ Skipped recordings: {}", self.failed_recordings.len());
        println!("   ├─ Signals loaded: {}", self.ingestion.signals_loaded);
        println!("   ├─ Samples loaded: {}", self.ingestion.samples_loaded);
        println!("   └─ Load errors: {}", self.ingestion.load_errors);

        println!("\n{}", self.alignment.summary());

        if !self.failed_recordings.is_empty() {
            println!("Skipped Recordings");
            for (name, reason) in &self.failed_recordings {
                println!("   ├─ {}: {}", name, reason);
            }
        }

        if !self.sinks.is_empty() {
            println!("\nSinks");
            for (name, snapshot) in &self.sinks {
                println!(
                    "   ├─ {}: written={} failed={} dropped={} avg_write={:.2}ms",
                    name,
                    snapshot.written,
                    snapshot.failed,
                    snapshot.dropped,
                    snapshot.avg_write_ms
                );
            }
        }

        println!();
    }
}
