//! FileSink - writes reports to disk, one folder per recording
//!
//! ```text
//! <base_path>/<recording>/alignment.json      full report
//! <base_path>/<recording>/<view>.align.json   per-view alignment parameters
//! <base_path>/<recording>/<view>.timeline.csv corrected frame timestamps
//! ```

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{
    path_safe_name, AlignmentReport, AlignmentResult, ContractError, ReportSink, ViewId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
    /// Write `<view>.timeline.csv` when a corrected timeline exists
    pub write_timeline: bool,
}

impl FileSinkConfig {
    /// Read `base_path` (default `./sync-output`) and `timeline`
    /// (default `true`) from sink params
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./sync-output"));
        let write_timeline = params
            .get("timeline")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        Self {
            base_path,
            write_timeline,
        }
    }
}

/// Per-view alignment parameters as written to `<view>.align.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewAlignmentRecord {
    pub reference: ViewId,
    pub target: ViewId,
    /// Offset added after scaling (seconds)
    pub lag_time: f64,
    pub slope: f64,
    /// View sample rate measured in the reference clock (Hz)
    pub sample_rate: f64,
    pub fit_rmse: Option<f64>,
    pub method: String,
    /// Analysed slice of the source (seconds), `null` when the whole trace was used
    pub time_start: Option<f64>,
    pub time_end: Option<f64>,
}

impl ViewAlignmentRecord {
    pub fn new(reference: &ViewId, result: &AlignmentResult) -> Self {
        Self {
            reference: reference.clone(),
            target: result.view.clone(),
            lag_time: result.offset,
            slope: result.scale,
            sample_rate: result.effective_rate(),
            fit_rmse: result.fit_rmse,
            method: result.method.to_string(),
            time_start: result.window.and_then(|w| w.time_start),
            time_end: result.window.and_then(|w| w.time_end),
        }
    }
}

/// Sink that writes reports to disk files
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    created_dirs: HashSet<PathBuf>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            created_dirs: HashSet::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    /// Output folder of one recording
    pub fn recording_dir(&self, recording: &str) -> PathBuf {
        self.config.base_path.join(sanitize(recording))
    }

    fn write_report_to_disk(&mut self, report: &AlignmentReport) -> std::io::Result<()> {
        let dir = self.recording_dir(&report.recording);
        if !self.created_dirs.contains(&dir) {
            fs::create_dir_all(&dir)?;
            self.created_dirs.insert(dir.clone());
        }

        write_json(&dir.join("alignment.json"), report)?;

        for (view, result) in &report.results {
            let record = ViewAlignmentRecord::new(&report.reference_view, result);
            write_json(&dir.join(format!("{}.align.json", sanitize(view))), &record)?;

            if let (true, Some(timeline)) =
                (self.config.write_timeline, &result.corrected_timestamps)
            {
                let path = dir.join(format!("{}.timeline.csv", sanitize(view)));
                write_timeline(&path, timeline)?;
            }
        }

        debug!(
            sink = %self.name,
            dir = %dir.display(),
            views = report.results.len(),
            "report written"
        );
        Ok(())
    }

    fn persist_report(&mut self, report: &AlignmentReport) -> Result<(), ContractError> {
        self.write_report_to_disk(report).map_err(|e| {
            error!(sink = %self.name, recording = %report.recording, error = %e, "write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

/// Keep recording and view names inside the output folder
fn sanitize(name: &str) -> String {
    path_safe_name(name)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut file, value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    // BufWriter drops flush errors silently
    file.flush()
}

fn write_timeline(path: &Path, timeline: &[f64]) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "frame,t_ref")?;
    for (frame, t) in timeline.iter().enumerate() {
        writeln!(file, "{frame},{t:.9}")?;
    }
    file.flush()
}

impl ReportSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, report),
        fields(sink = %self.name, recording = %report.recording)
    )]
    async fn write(&mut self, report: &AlignmentReport) -> Result<(), ContractError> {
        self.persist_report(report)
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{AlignmentMethod, TimeWindow};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn report() -> AlignmentReport {
        let aligned = AlignmentResult {
            offset: 0.25,
            offset_frames: 25.0,
            scale: 1.0001,
            fit_rmse: Some(0.002),
            method: AlignmentMethod::SampleRate,
            stages: vec![
                AlignmentMethod::CrossCorr,
                AlignmentMethod::Regression,
                AlignmentMethod::SampleRate,
            ],
            matched_pulses: 58,
            corrected_timestamps: Some(vec![0.25, 0.26, 0.27]),
            window: Some(TimeWindow::new(Some(2.0), Some(60.0))),
            ..AlignmentResult::identity("TL".into(), 100.0)
        };
        let coarse = AlignmentResult {
            offset: -0.1,
            method: AlignmentMethod::CrossCorr,
            ..AlignmentResult::identity("TR".into(), 100.0)
        };

        AlignmentReport {
            recording: "mouse1/session2".into(),
            reference_view: "BC".into(),
            reference_pulses: 60,
            reference_rate: 100.0,
            generated_at: Utc::now(),
            results: BTreeMap::from([("TL".into(), aligned), ("TR".into(), coarse)]),
            failures: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_file_sink_layout() {
        let dir = tempdir().unwrap();
        let config = FileSinkConfig {
            base_path: dir.path().to_path_buf(),
            write_timeline: true,
        };
        let mut sink = FileSink::new("test_file", config).unwrap();

        sink.write(&report()).await.unwrap();
        sink.flush().await.unwrap();

        let out = dir.path().join("mouse1_session2");
        assert!(out.join("alignment.json").exists());
        assert!(out.join("TR.align.json").exists());
        assert!(!out.join("TR.timeline.csv").exists());

        let record: ViewAlignmentRecord =
            serde_json::from_str(&fs::read_to_string(out.join("TL.align.json")).unwrap()).unwrap();
        assert_eq!(record.reference, "BC");
        assert_eq!(record.target, "TL");
        assert_eq!(record.lag_time, 0.25);
        assert_eq!(record.method, "samplerate");
        assert!((record.sample_rate - 100.0 / 1.0001).abs() < 1e-9);
        assert_eq!(record.time_start, Some(2.0));
        assert_eq!(record.time_end, Some(60.0));

        let raw = fs::read_to_string(out.join("TR.align.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["time_start"].is_null());
        assert!(value["time_end"].is_null());

        let timeline = fs::read_to_string(out.join("TL.timeline.csv")).unwrap();
        let lines: Vec<&str> = timeline.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "frame,t_ref");
        assert_eq!(lines[2], "1,0.260000000");
    }

    #[tokio::test]
    async fn test_timeline_can_be_disabled() {
        let dir = tempdir().unwrap();
        let params = HashMap::from([
            (
                "base_path".to_string(),
                dir.path().to_string_lossy().into_owned(),
            ),
            ("timeline".to_string(), "false".to_string()),
        ]);
        let mut sink = FileSink::from_params("files", &params).unwrap();

        sink.write(&report()).await.unwrap();
        let out = sink.recording_dir("mouse1/session2");
        assert!(out.join("TL.align.json").exists());
        assert!(!out.join("TL.timeline.csv").exists());
    }

    #[test]
    fn test_default_params() {
        let config = FileSinkConfig::from_params(&HashMap::new());
        assert_eq!(config.base_path, PathBuf::from("./sync-output"));
        assert!(config.write_timeline);
    }

    #[tokio::test]
    async fn test_dot_recording_names_stay_in_base() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("out");
        let config = FileSinkConfig {
            base_path: base.clone(),
            write_timeline: false,
        };
        let mut sink = FileSink::new("dots", config).unwrap();

        for name in [".", ".."] {
            let mut r = report();
            r.recording = name.into();
            sink.write(&r).await.unwrap();
            assert_eq!(sink.recording_dir(name).parent(), Some(base.as_path()));
        }
        assert!(base.join("_.").join("alignment.json").exists());
        assert!(base.join("_..").join("alignment.json").exists());
        assert!(!base.join("alignment.json").exists());
        assert!(!dir.path().join("alignment.json").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_json_reports_flush_error() {
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        // Small enough to sit in the BufWriter until flush
        let err = write_json(full, &report()).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(28));
    }
}
