//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Contract snapshots
//! - Synthetic rig e2e runs: config -> sources -> engine -> dispatcher

#[cfg(test)]
mod contract_tests {
    use contracts::{AlignmentMethod, AlignmentResult, SyncError, SyncErrorKind, ViewFailure};

    #[test]
    fn test_result_json_shape() {
        let result = AlignmentResult {
            offset: 0.25,
            method: AlignmentMethod::CrossCorr,
            stages: vec![AlignmentMethod::CrossCorr],
            ..AlignmentResult::identity("TL".into(), 100.0)
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["view"], "TL");
        assert_eq!(json["method"], "crosscorr");
        assert_eq!(json["stages"][0], "crosscorr");
        assert!(json.get("corrected_timestamps").is_none());
    }

    #[test]
    fn test_failure_json_shape() {
        let failure = ViewFailure::from(&SyncError::NoCorrelationPeak {
            view: "TR".into(),
            peak: 3,
            floor: 20.0,
        });
        assert_eq!(failure.kind, SyncErrorKind::NoCorrelationPeak);
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "no_correlation_peak");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::path::Path;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{AlignmentMethod, AlignmentReport, RigBlueprint, SyncErrorKind};
    use dispatcher::{create_dispatcher, ViewAlignmentRecord};
    use ingestion::SourceFactory;
    use sync_engine::SyncEngine;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    /// Four-camera rig plus one dark and one unreadable view
    ///
    /// BC and TL/TR/L/R run at 1 kHz, BL at 100 Hz. TR drifts 8 ppm, which
    /// keeps the accumulated drift under one frame over the recording.
    fn rig_config(dir: &Path) -> String {
        fs::write(dir.join("dark.csv"), "30.0\n".repeat(5000)).unwrap();

        format!(
            r#"
[project]
name = "e2e"

[sync]
ref_view = "BC"
pipeline = ["crosscorr", "regression", "samplerate"]
max_parallel_views = 2
emit_timeline = true

[[views]]
id = "BC"
frame_rate = 1000.0

[[views]]
id = "TL"
frame_rate = 1000.0

[[views]]
id = "TR"
frame_rate = 1000.0

[[views]]
id = "BL"
frame_rate = 100.0

[[views]]
id = "L"
frame_rate = 1000.0

[[views]]
id = "R"
frame_rate = 1000.0

[[recordings]]
name = "session1"

[recordings.sources.BC]
kind = "synthetic"
duration_s = 120.0
seed = 11

[recordings.sources.TL]
kind = "synthetic"
duration_s = 120.0
seed = 11
offset_s = 0.25
dropped_pulses = [3, 10, 40]

[recordings.sources.TR]
kind = "synthetic"
duration_s = 120.0
seed = 11
offset_s = -0.4
drift_ppm = 8.0

[recordings.sources.BL]
kind = "synthetic"
duration_s = 120.0
seed = 11
offset_s = 0.1

[recordings.sources.L]
kind = "brightness_trace"
path = "dark.csv"

[recordings.sources.R]
kind = "brightness_trace"
path = "missing.csv"

[[sinks]]
name = "log"
sink_type = "log"

[[sinks]]
name = "files"
sink_type = "file"
params = {{ base_path = "{}" }}
"#,
            dir.join("out").display()
        )
    }

    fn load(dir: &Path) -> RigBlueprint {
        ConfigLoader::load_from_str(&rig_config(dir), ConfigFormat::Toml).unwrap()
    }

    async fn align(blueprint: &RigBlueprint, dir: &Path) -> AlignmentReport {
        let factory = SourceFactory::new().with_base_dir(dir);
        let sources = factory
            .build_recording(blueprint, &blueprint.recordings[0])
            .unwrap();
        SyncEngine::new(blueprint.to_sync_engine_config())
            .run("session1", &sources)
            .await
            .unwrap()
    }

    /// End-to-end: synthetic rig -> SyncEngine
    #[tokio::test]
    async fn test_e2e_recovers_offsets_and_drift() {
        let dir = tempdir().unwrap();
        let blueprint = load(dir.path());
        let report = align(&blueprint, dir.path()).await;

        assert_eq!(report.reference_view, "BC");
        assert_eq!(report.reference_rate, 1000.0);
        assert!(report.reference_pulses > 100);

        let tl = &report.results["TL"];
        assert_eq!(tl.method, AlignmentMethod::SampleRate);
        assert_eq!(
            tl.stages,
            vec![
                AlignmentMethod::CrossCorr,
                AlignmentMethod::Regression,
                AlignmentMethod::SampleRate
            ]
        );
        assert!((tl.offset - 0.25).abs() < 2e-3, "TL offset {}", tl.offset);
        assert!(tl.drift_ppm().abs() < 5.0, "TL drift {}", tl.drift_ppm());
        assert!(tl.matched_pulses > 100);

        let tr = &report.results["TR"];
        assert!((tr.offset + 0.4).abs() < 2e-3, "TR offset {}", tr.offset);
        assert!((tr.drift_ppm() - 8.0).abs() < 5.0, "TR drift {}", tr.drift_ppm());

        // 100 Hz quantization biases the offset by up to one view frame
        let bl = &report.results["BL"];
        assert!((bl.offset - 0.1).abs() < 1e-2, "BL offset {}", bl.offset);
        assert!((bl.scale - 1.0).abs() < 1e-4, "BL scale {}", bl.scale);
        assert_eq!(bl.corrected_timestamps.as_ref().map(Vec::len), Some(12_000));
    }

    #[tokio::test]
    async fn test_e2e_failed_views_do_not_abort_run() {
        let dir = tempdir().unwrap();
        let blueprint = load(dir.path());
        let report = align(&blueprint, dir.path()).await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.attempted(), 5);
        assert!(!report.is_complete());

        let failed: Vec<(&str, SyncErrorKind)> = report
            .failures
            .iter()
            .map(|f| (f.view.as_str(), f.kind))
            .collect();
        assert_eq!(
            failed,
            vec![
                ("L", SyncErrorKind::InsufficientSyncSignal),
                ("R", SyncErrorKind::SourceUnavailable),
            ]
        );
    }

    /// End-to-end: SyncEngine -> Dispatcher -> FileSink on disk
    #[tokio::test]
    async fn test_e2e_file_output() {
        let dir = tempdir().unwrap();
        let blueprint = load(dir.path());
        let report = align(&blueprint, dir.path()).await;

        let (tx, rx) = mpsc::channel(4);
        let dispatcher = create_dispatcher(blueprint.sinks.clone(), rx).unwrap();
        let handle = dispatcher.spawn();
        tx.send(report).await.unwrap();
        drop(tx);

        let summary = handle.await.unwrap();
        assert_eq!(summary.reports, 1);
        for (name, snapshot) in &summary.sinks {
            assert_eq!(snapshot.written, 1, "sink {name}");
            assert_eq!(snapshot.failed, 0, "sink {name}");
        }

        let out = dir.path().join("out").join("session1");
        let written: AlignmentReport =
            serde_json::from_str(&fs::read_to_string(out.join("alignment.json")).unwrap())
                .unwrap();
        assert_eq!(written.results.len(), 3);
        assert_eq!(written.failures.len(), 2);

        let record: ViewAlignmentRecord =
            serde_json::from_str(&fs::read_to_string(out.join("TR.align.json")).unwrap())
                .unwrap();
        assert_eq!(record.reference, "BC");
        assert_eq!(record.method, "samplerate");
        assert!((record.lag_time + 0.4).abs() < 2e-3);
        assert!((record.sample_rate - 1000.0).abs() < 0.01);

        let timeline = fs::read_to_string(out.join("TL.timeline.csv")).unwrap();
        let mut lines = timeline.lines();
        assert_eq!(lines.next(), Some("frame,t_ref"));
        assert_eq!(lines.count(), 120_000);

        assert!(!out.join("L.align.json").exists());
        assert!(!out.join("R.align.json").exists());
    }

    #[tokio::test]
    async fn test_e2e_report_feeds_metrics_summary() {
        let dir = tempdir().unwrap();
        let blueprint = load(dir.path());
        let report = align(&blueprint, dir.path()).await;

        let mut aggregator = observability::AlignmentMetricsAggregator::new();
        aggregator.update(&report);
        let summary = aggregator.summary();

        assert_eq!(summary.total_views, 5);
        assert_eq!(summary.aligned_views, 3);
        assert_eq!(summary.incomplete_reports, 1);
        assert_eq!(summary.failure_counts.get("R"), Some(&1));
        assert_eq!(summary.offset_ms.len(), 3);
    }
}
