//! Text trace sources
//!
//! - Brightness traces: one value per frame, one per line. CSV lines use
//!   their last column.
//! - Analog traces: tab or whitespace separated columns from an acquisition
//!   system, `timestamp<TAB>signal` unless another channel column is chosen.
//!   An optional time window restricts the samples that are kept.
//!
//! Blank lines and `#` comments are skipped everywhere; a non-numeric first
//! data line is taken as a header.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use contracts::{ContractError, SignalKind, SignalSource, SyncSignal, TimeWindow, ViewId};
use tracing::{debug, instrument};

use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;

/// Per-frame brightness trace file
pub struct BrightnessTraceSource {
    view: ViewId,
    path: PathBuf,
    sample_rate: f64,
    metrics: Arc<IngestionMetrics>,
}

impl BrightnessTraceSource {
    pub fn new(
        view: ViewId,
        path: PathBuf,
        sample_rate: f64,
        metrics: Arc<IngestionMetrics>,
    ) -> Self {
        Self {
            view,
            path,
            sample_rate,
            metrics,
        }
    }
}

impl SignalSource for BrightnessTraceSource {
    fn view_id(&self) -> &ViewId {
        &self.view
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn signal_kind(&self) -> SignalKind {
        SignalKind::Brightness
    }

    #[instrument(name = "brightness_trace_load", skip(self), fields(view = %self.view))]
    fn load_signal(&self) -> std::result::Result<SyncSignal, ContractError> {
        load_brightness_trace(&self.view, &self.path, self.sample_rate, &self.metrics)
    }
}

/// Column of the sync channel when none is configured
pub const DEFAULT_ANALOG_CHANNEL: usize = 1;

/// Analog sync channel exported as a multi-column text file
pub struct AnalogTraceSource {
    view: ViewId,
    path: PathBuf,
    sample_rate: f64,
    channel: usize,
    window: TimeWindow,
    metrics: Arc<IngestionMetrics>,
}

impl AnalogTraceSource {
    pub fn new(
        view: ViewId,
        path: PathBuf,
        sample_rate: f64,
        metrics: Arc<IngestionMetrics>,
    ) -> Self {
        Self {
            view,
            path,
            sample_rate,
            channel: DEFAULT_ANALOG_CHANNEL,
            window: TimeWindow::default(),
            metrics,
        }
    }

    /// Read the sync signal from zero-based column `channel`
    pub fn with_channel(mut self, channel: usize) -> Self {
        self.channel = channel;
        self
    }

    /// Keep only the samples inside `window`
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }
}

impl SignalSource for AnalogTraceSource {
    fn view_id(&self) -> &ViewId {
        &self.view
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn signal_kind(&self) -> SignalKind {
        SignalKind::Analog
    }

    #[instrument(
        name = "analog_trace_load",
        skip(self),
        fields(view = %self.view, channel = self.channel)
    )]
    fn load_signal(&self) -> std::result::Result<SyncSignal, ContractError> {
        let started = Instant::now();
        let result = read_trace(&self.view, &self.path).and_then(|content| {
            let samples = parse_analog_trace(&self.view, &self.path, &content, self.channel)?;
            window_samples(&self.view, samples, &self.window, self.sample_rate)
        });

        let samples = match result {
            Ok(samples) => samples,
            Err(err) => {
                self.metrics.record_error(&self.view);
                return Err(err.into());
            }
        };

        debug!(samples = samples.len(), window = ?self.window, "analog trace parsed");
        self.metrics
            .record_loaded(&self.view, SignalKind::Analog, samples.len(), started.elapsed());
        Ok(SyncSignal {
            samples,
            sample_rate: self.sample_rate,
            kind: SignalKind::Analog,
        })
    }

    fn window(&self) -> Option<TimeWindow> {
        Some(self.window)
    }
}

fn read_trace(view: &ViewId, path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| IngestionError::Io {
        view: view.clone(),
        path: path.to_path_buf(),
        source,
    })
}

fn load_brightness_trace(
    view: &ViewId,
    path: &Path,
    sample_rate: f64,
    metrics: &IngestionMetrics,
) -> std::result::Result<SyncSignal, ContractError> {
    let started = Instant::now();
    let result =
        read_trace(view, path).and_then(|content| parse_brightness_trace(view, path, &content));

    let samples = match result {
        Ok(samples) => samples,
        Err(err) => {
            metrics.record_error(view);
            return Err(err.into());
        }
    };

    debug!(samples = samples.len(), "trace parsed");
    metrics.record_loaded(view, SignalKind::Brightness, samples.len(), started.elapsed());
    Ok(SyncSignal {
        samples,
        sample_rate,
        kind: SignalKind::Brightness,
    })
}

/// Cut `samples` down to `window`; an empty cut is an error
pub fn window_samples(
    view: &ViewId,
    mut samples: Vec<f64>,
    window: &TimeWindow,
    sample_rate: f64,
) -> Result<Vec<f64>> {
    if window.is_unbounded() {
        return Ok(samples);
    }
    let range = window.sample_range(samples.len(), sample_rate);
    if range.is_empty() {
        return Err(IngestionError::InvalidParams {
            view: view.clone(),
            message: format!(
                "time window {:?}..{:?} s selects no samples of a {:.3} s trace",
                window.time_start,
                window.time_end,
                samples.len() as f64 / sample_rate
            ),
        });
    }
    samples.truncate(range.end);
    samples.drain(..range.start);
    Ok(samples)
}

/// Parse a brightness trace: the last comma-separated column of each line
pub fn parse_brightness_trace(view: &ViewId, path: &Path, content: &str) -> Result<Vec<f64>> {
    parse_lines(view, path, content, |line| line.rsplit(',').next())
}

/// Parse an analog trace: zero-based tab (or whitespace) separated `column`
pub fn parse_analog_trace(
    view: &ViewId,
    path: &Path,
    content: &str,
    column: usize,
) -> Result<Vec<f64>> {
    parse_lines(view, path, content, |line| {
        if line.contains('\t') {
            line.split('\t').nth(column)
        } else {
            line.split_whitespace().nth(column)
        }
    })
}

fn parse_lines<'a>(
    view: &ViewId,
    path: &Path,
    content: &'a str,
    field: impl Fn(&'a str) -> Option<&'a str>,
) -> Result<Vec<f64>> {
    let mut samples = Vec::new();
    let mut seen_data_line = false;

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let first_data_line = !seen_data_line;
        seen_data_line = true;

        let parse_err = |message: String| IngestionError::Parse {
            view: view.clone(),
            path: path.to_path_buf(),
            line: idx + 1,
            message,
        };

        let Some(text) = field(line) else {
            return Err(parse_err("missing signal column".into()));
        };
        match text.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => samples.push(value),
            Ok(value) => return Err(parse_err(format!("non-finite value {value}"))),
            Err(_) if first_data_line => continue,
            Err(e) => return Err(parse_err(format!("invalid number '{}': {e}", text.trim()))),
        }
    }

    if samples.is_empty() {
        return Err(IngestionError::EmptySignal { view: view.clone() });
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ViewId {
        "TL".into()
    }

    #[test]
    fn test_brightness_plain_lines() {
        let content = "# LED brightness\n12.5\n13\n\n240.0\n";
        let samples = parse_brightness_trace(&view(), Path::new("t.txt"), content).unwrap();
        assert_eq!(samples, vec![12.5, 13.0, 240.0]);
    }

    #[test]
    fn test_brightness_csv_with_header() {
        let content = "frame,brightness\n0,10.0\n1,200.0\n";
        let samples = parse_brightness_trace(&view(), Path::new("t.csv"), content).unwrap();
        assert_eq!(samples, vec![10.0, 200.0]);
    }

    #[test]
    fn test_brightness_bad_line_reports_position() {
        let content = "10.0\n11.0\nabc\n";
        let err = parse_brightness_trace(&view(), Path::new("t.txt"), content).unwrap_err();
        match err {
            IngestionError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_analog_tab_separated() {
        let content = "0.000\t0.01\n0.001\t4.9\n0.002\t0.02\n";
        let samples =
            parse_analog_trace(&view(), Path::new("led.tsv"), content, DEFAULT_ANALOG_CHANNEL)
                .unwrap();
        assert_eq!(samples, vec![0.01, 4.9, 0.02]);
    }

    #[test]
    fn test_analog_channel_column() {
        let content = "time\tch0\tch1\tsync\n0.000\t1.5\t2.5\t0.0\n0.001\t1.6\t2.4\t5.0\n";
        let samples = parse_analog_trace(&view(), Path::new("ephys.tsv"), content, 3).unwrap();
        assert_eq!(samples, vec![0.0, 5.0]);

        assert!(matches!(
            parse_analog_trace(&view(), Path::new("ephys.tsv"), content, 4),
            Err(IngestionError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_window_samples() {
        let samples: Vec<f64> = (0..1000).map(f64::from).collect();
        let window = TimeWindow::new(Some(2.0), Some(5.0));
        let cut = window_samples(&view(), samples.clone(), &window, 100.0).unwrap();
        assert_eq!(cut.len(), 300);
        assert_eq!(cut[0], 200.0);
        assert_eq!(cut[299], 499.0);

        let open_end = TimeWindow::new(Some(9.5), None);
        assert_eq!(window_samples(&view(), samples.clone(), &open_end, 100.0).unwrap().len(), 50);

        let past_end = TimeWindow::new(Some(20.0), None);
        assert!(matches!(
            window_samples(&view(), samples, &past_end, 100.0),
            Err(IngestionError::InvalidParams { .. })
        ));
    }

    #[test]
    fn test_analog_missing_column() {
        let content = "0.000\t0.01\n0.001\n";
        assert!(matches!(
            parse_analog_trace(&view(), Path::new("led.tsv"), content, DEFAULT_ANALOG_CHANNEL),
            Err(IngestionError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_empty_trace() {
        let content = "# nothing\n\n";
        assert!(matches!(
            parse_brightness_trace(&view(), Path::new("t.txt"), content),
            Err(IngestionError::EmptySignal { .. })
        ));
    }

    #[test]
    fn test_load_from_file_records_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ephys_led.tsv");
        std::fs::write(&path, "0.0\t0.0\n0.001\t1.0\n0.002\t0.0\n").unwrap();

        let metrics = Arc::new(IngestionMetrics::new());
        let source = AnalogTraceSource::new("ephys".into(), path, 1000.0, metrics.clone());
        let signal = source.load_signal().unwrap();
        assert_eq!(signal.kind, SignalKind::Analog);
        assert_eq!(signal.samples.len(), 3);
        assert_eq!(metrics.snapshot().samples_loaded, 3);
    }

    #[test]
    fn test_windowed_channel_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ephys.tsv");
        let content: String = (0..100)
            .map(|i| format!("{:.3}\t0.5\t{}\n", i as f64 / 10.0, i))
            .collect();
        std::fs::write(&path, content).unwrap();

        let window = TimeWindow::new(Some(1.0), Some(3.0));
        let source = AnalogTraceSource::new(
            "ephys".into(),
            path,
            10.0,
            Arc::new(IngestionMetrics::new()),
        )
        .with_channel(2)
        .with_window(window);

        let signal = source.load_signal().unwrap();
        assert_eq!(signal.samples.len(), 20);
        assert_eq!(signal.samples[0], 10.0);
        assert_eq!(source.window(), Some(window));
    }
}
