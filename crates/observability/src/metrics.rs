//! Alignment metrics
//!
//! Records Prometheus metrics for every detected stream, accepted alignment
//! and failed view, and aggregates them in memory for run summaries.

use std::collections::BTreeMap;

use contracts::{AlignmentReport, AlignmentResult, ViewFailure};
use metrics::{counter, gauge, histogram};

/// Record pulses detected in one view
pub fn record_pulses_detected(view: &str, count: usize) {
    counter!("ledsync_pulses_detected_total", "view" => view.to_string()).increment(count as u64);
    gauge!("ledsync_pulses_last", "view" => view.to_string()).set(count as f64);
}

/// Record time spent in one pipeline stage
pub fn record_stage_seconds(stage: &'static str, seconds: f64) {
    histogram!("ledsync_stage_seconds", "stage" => stage).record(seconds);
}

/// Record an accepted alignment
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_view_aligned;
///
/// for result in report.results.values() {
///     record_view_aligned(result);
/// }
/// ```
pub fn record_view_aligned(result: &AlignmentResult) {
    let view = result.view.to_string();
    counter!(
        "ledsync_views_total",
        "status" => "aligned",
        "method" => result.method.as_str()
    )
    .increment(1);
    gauge!("ledsync_view_offset_seconds", "view" => view.clone()).set(result.offset);
    gauge!("ledsync_view_drift_ppm", "view" => view.clone()).set(result.drift_ppm());
    if let Some(rmse) = result.fit_rmse {
        histogram!("ledsync_fit_rmse_ms", "view" => view).record(rmse * 1000.0);
    }
}

/// Record a failed view
pub fn record_view_failed(failure: &ViewFailure) {
    let kind = failure.kind.as_str();
    counter!("ledsync_views_total", "status" => "failed", "kind" => kind).increment(1);
}

/// Record a finished report
pub fn record_report(report: &AlignmentReport) {
    counter!("ledsync_reports_total").increment(1);
    gauge!("ledsync_report_failed_views").set(report.failures.len() as f64);
    gauge!("ledsync_reference_pulses").set(report.reference_pulses as f64);
}

/// Alignment metrics aggregator
///
/// Aggregates reports in memory for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct AlignmentMetricsAggregator {
    /// Reports seen
    pub total_reports: u64,

    /// Views attempted (reference excluded)
    pub total_views: u64,

    /// Views aligned
    pub aligned_views: u64,

    /// Reports with at least one failed view
    pub incomplete_reports: u64,

    /// Offset per view (ms)
    pub offset_stats: BTreeMap<String, RunningStats>,

    /// Drift (ppm)
    pub drift_stats: RunningStats,

    /// Final fit RMSE (ms)
    pub rmse_stats: RunningStats,

    /// Matched pulses per view
    pub matched_stats: RunningStats,

    /// Failures per view
    pub failure_counts: BTreeMap<String, u64>,
}

impl AlignmentMetricsAggregator {
    /// Create new aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with one report
    pub fn update(&mut self, report: &AlignmentReport) {
        self.total_reports += 1;
        self.total_views += report.attempted() as u64;
        self.aligned_views += report.results.len() as u64;
        if !report.is_complete() {
            self.incomplete_reports += 1;
        }

        for (view, result) in &report.results {
            self.offset_stats
                .entry(view.to_string())
                .or_default()
                .push(result.offset * 1000.0);
            self.drift_stats.push(result.drift_ppm());
            if let Some(rmse) = result.fit_rmse {
                self.rmse_stats.push(rmse * 1000.0);
            }
            self.matched_stats.push(result.matched_pulses as f64);
        }

        for failure in &report.failures {
            *self
                .failure_counts
                .entry(failure.view.to_string())
                .or_insert(0) += 1;
        }
    }

    /// Build summary
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_reports: self.total_reports,
            total_views: self.total_views,
            aligned_views: self.aligned_views,
            incomplete_reports: self.incomplete_reports,
            success_rate: if self.total_views > 0 {
                self.aligned_views as f64 / self.total_views as f64 * 100.0
            } else {
                0.0
            },
            offset_ms: self
                .offset_stats
                .iter()
                .map(|(view, stats)| (view.clone(), StatsSummary::from(stats)))
                .collect(),
            drift_ppm: StatsSummary::from(&self.drift_stats),
            fit_rmse_ms: StatsSummary::from(&self.rmse_stats),
            matched_pulses: StatsSummary::from(&self.matched_stats),
            failure_counts: self.failure_counts.clone(),
        }
    }

    /// Reset statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_reports: u64,
    pub total_views: u64,
    pub aligned_views: u64,
    pub incomplete_reports: u64,
    pub success_rate: f64,
    pub offset_ms: BTreeMap<String, StatsSummary>,
    pub drift_ppm: StatsSummary,
    pub fit_rmse_ms: StatsSummary,
    pub matched_pulses: StatsSummary,
    pub failure_counts: BTreeMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Alignment Metrics Summary ===")?;
        writeln!(f, "Reports: {}", self.total_reports)?;
        writeln!(
            f,
            "Views aligned: {}/{} ({:.2}%)",
            self.aligned_views, self.total_views, self.success_rate
        )?;
        writeln!(f, "Incomplete reports: {}", self.incomplete_reports)?;
        writeln!(f, "Drift (ppm): {}", self.drift_ppm)?;
        writeln!(f, "Fit RMSE (ms): {}", self.fit_rmse_ms)?;
        writeln!(f, "Matched pulses: {}", self.matched_pulses)?;

        if !self.offset_ms.is_empty() {
            writeln!(f, "Offsets (ms):")?;
            for (view, stats) in &self.offset_ms {
                writeln!(f, "  {}: {}", view, stats)?;
            }
        }

        if !self.failure_counts.is_empty() {
            writeln!(f, "Failed views:")?;
            for (view, count) in &self.failure_counts {
                writeln!(f, "  {}: {}", view, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
