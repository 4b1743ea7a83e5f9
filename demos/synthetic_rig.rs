//! Synthetic Rig Example
//!
//! Aligns a generated four-camera LED rig end to end, with no recorded data.
//! Pass a config file to align its first recording instead.
//!
//! Run with: cargo run -p demos --bin synthetic_rig [config.toml]

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use config_loader::ConfigLoader;
use contracts::{
    AlignmentStage, ConfigVersion, CropRegion, ProjectConfig, RecordingConfig, RigBlueprint,
    SignalKind, SinkConfig, SinkType, SourceConfig, SyncSettings, SyntheticParams, ViewConfig,
    DEFAULT_CROP, DEFAULT_LED_THRESHOLD, DEFAULT_MAX_REGRESSION_RMSE,
};
use ingestion::SourceFactory;
use observability::{AlignmentMetricsAggregator, ObservabilityConfig};
use sync_engine::SyncEngine;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_with_config(ObservabilityConfig::default())?;

    tracing::info!("Starting Synthetic Rig Demo");

    // ==== Stage 1: Use the generated rig or load from file ====
    let (blueprint, base_dir) = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading blueprint config");
        let path = Path::new(&path);
        (
            ConfigLoader::load_from_path(path)?,
            path.parent().map(Path::to_path_buf),
        )
    } else {
        (create_demo_blueprint(), None)
    };
    for warning in ConfigLoader::warnings(&blueprint) {
        tracing::warn!("{warning}");
    }

    let Some(recording) = blueprint.recordings.first() else {
        tracing::warn!("No recordings configured, nothing to align");
        return Ok(());
    };

    // ==== Stage 2: Build signal sources ====
    let mut factory = SourceFactory::new();
    if let Some(dir) = base_dir {
        factory = factory.with_base_dir(dir);
    }
    let sources = factory.build_recording(&blueprint, recording)?;
    tracing::info!(
        recording = %recording.name,
        views = sources.len(),
        "Signal sources built"
    );

    // ==== Stage 3: Start dispatcher ====
    let (report_tx, report_rx) = mpsc::channel(4);
    let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), report_rx)?;
    let dispatcher_handle = dispatcher.spawn();

    // ==== Stage 4: Align ====
    let engine = SyncEngine::new(blueprint.to_sync_engine_config());
    let report = engine.run(&recording.name, &sources).await?;

    for (view, result) in &report.results {
        tracing::info!(
            view = %view,
            offset_ms = format!("{:.3}", result.offset * 1000.0),
            drift_ppm = format!("{:.2}", result.drift_ppm()),
            rmse_ms = ?result.fit_rmse.map(|r| r * 1000.0),
            method = %result.method,
            "View aligned"
        );
    }
    for failure in &report.failures {
        tracing::warn!(view = %failure.view, kind = ?failure.kind, "{}", failure.message);
    }

    let mut aggregator = AlignmentMetricsAggregator::new();
    aggregator.update(&report);

    // ==== Stage 5: Flush sinks ====
    report_tx.send(report).await?;
    drop(report_tx);
    let summary = dispatcher_handle.await?;
    tracing::info!(reports = summary.reports, "Dispatcher finished");

    println!("\n{}", aggregator.summary());
    Ok(())
}

fn synthetic(offset_s: f64, drift_ppm: f64) -> SourceConfig {
    SourceConfig::Synthetic(SyntheticParams {
        duration_s: 120.0,
        offset_s,
        drift_ppm,
        noise: 4.0,
        seed: 2024,
        ..Default::default()
    })
}

fn view(id: &str, frame_rate: f64) -> ViewConfig {
    ViewConfig {
        id: id.into(),
        frame_rate,
        signal: SignalKind::Brightness,
        threshold: None,
        crop: CropRegion::full(),
        extra_crops: HashMap::new(),
    }
}

fn create_demo_blueprint() -> RigBlueprint {
    RigBlueprint {
        version: ConfigVersion::V1,
        project: ProjectConfig {
            name: "synthetic-rig".to_string(),
        },
        sync: SyncSettings {
            pipeline: AlignmentStage::default_pipeline(),
            led_threshold: DEFAULT_LED_THRESHOLD,
            max_regression_rmse: DEFAULT_MAX_REGRESSION_RMSE,
            ref_view: "BC".into(),
            ref_crop: DEFAULT_CROP.to_string(),
            min_off_ms: 20.0,
            min_correlation_ratio: 0.5,
            max_lag_frames: None,
            match_tolerance_ms: None,
            max_parallel_views: 0,
            emit_timeline: false,
        },
        views: vec![
            view("BC", 1000.0),
            view("TL", 1000.0),
            view("TR", 1000.0),
            view("BL", 200.0),
        ],
        recordings: vec![RecordingConfig {
            name: "demo".to_string(),
            sources: BTreeMap::from([
                ("BC".into(), synthetic(0.0, 0.0)),
                ("TL".into(), synthetic(0.25, 0.0)),
                ("TR".into(), synthetic(-0.4, 5.0)),
                ("BL".into(), synthetic(1.3, 0.0)),
            ]),
        }],
        sinks: vec![SinkConfig {
            name: "log".to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 4,
            params: HashMap::new(),
        }],
    }
}
