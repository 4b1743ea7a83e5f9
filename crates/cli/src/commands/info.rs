//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::RigBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    project: String,
    sync: SyncInfo,
    views: Vec<ViewInfo>,
    recordings: Vec<RecordingInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SyncInfo {
    ref_view: String,
    ref_crop: String,
    pipeline: Vec<String>,
    led_threshold: f64,
    max_regression_rmse: f64,
    min_off_ms: f64,
    min_correlation_ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_lag_frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    match_tolerance_ms: Option<f64>,
    max_parallel_views: usize,
    emit_timeline: bool,
}

#[derive(Serialize)]
struct ViewInfo {
    id: String,
    frame_rate: f64,
    signal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold: Option<f64>,
    /// Crop the sync LED is read from
    sync_crop: String,
    crop_fallback: bool,
}

#[derive(Serialize)]
struct RecordingInfo {
    name: String,
    sources: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    params: std::collections::HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &RigBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sync = &blueprint.sync;

    let views = blueprint
        .views
        .iter()
        .map(|view| {
            let (crop, fallback) = blueprint.sync_crop(view);
            ViewInfo {
                id: view.id.to_string(),
                frame_rate: view.frame_rate,
                signal: format!("{:?}", view.signal),
                threshold: view.threshold,
                sync_crop: format!("{:?}", crop),
                crop_fallback: fallback,
            }
        })
        .collect();

    let recordings = blueprint
        .recordings
        .iter()
        .map(|recording| RecordingInfo {
            name: recording.name.clone(),
            sources: recording
                .sources
                .iter()
                .map(|(view, source)| (view.to_string(), source.kind_name().to_string()))
                .collect(),
        })
        .collect();

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
                params: s.params.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        project: blueprint.project.name.clone(),
        sync: SyncInfo {
            ref_view: sync.ref_view.to_string(),
            ref_crop: sync.ref_crop.clone(),
            pipeline: sync
                .pipeline
                .iter()
                .map(|stage| stage.method().to_string())
                .collect(),
            led_threshold: sync.led_threshold,
            max_regression_rmse: sync.max_regression_rmse,
            min_off_ms: sync.min_off_ms,
            min_correlation_ratio: sync.min_correlation_ratio,
            max_lag_frames: sync.max_lag_frames,
            match_tolerance_ms: sync.match_tolerance_ms,
            max_parallel_views: sync.max_parallel_views,
            emit_timeline: sync.emit_timeline,
        },
        views,
        recordings,
        sinks,
    }
}

fn print_config_info(blueprint: &RigBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  ledsync Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Project");
    println!("   ├─ Name: {}", blueprint.project.name);
    println!("   └─ Version: {:?}", blueprint.version);

    let sync = &blueprint.sync;
    let stages: Vec<&str> = sync.pipeline.iter().map(|s| s.method().as_str()).collect();
    println!("\nSync Settings");
    println!("   ├─ Reference view: {} (crop '{}')", sync.ref_view, sync.ref_crop);
    println!("   ├─ Pipeline: [{}]", stages.join(", "));
    println!("   ├─ LED threshold: {}", sync.led_threshold);
    println!("   ├─ Min LED-off: {} ms", sync.min_off_ms);
    println!("   ├─ Min correlation ratio: {}", sync.min_correlation_ratio);
    match sync.max_lag_frames {
        Some(lag) => println!("   ├─ Max lag: {} frames", lag),
        None => println!("   ├─ Max lag: unbounded"),
    }
    println!("   ├─ Max regression RMSE: {} s", sync.max_regression_rmse);
    println!("   └─ Parallel views: {}", match sync.max_parallel_views {
        0 => "unbounded".to_string(),
        n => n.to_string(),
    });

    println!("\nViews ({})", blueprint.views.len());
    for (i, view) in blueprint.views.iter().enumerate() {
        let is_last = i == blueprint.views.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} ({:?}, {} Hz)", prefix, view.id, view.signal, view.frame_rate);
        if args.views {
            let (crop, fallback) = blueprint.sync_crop(view);
            if let Some(threshold) = view.threshold {
                println!("   {}  ├─ Threshold: {}", child_prefix, threshold);
            }
            println!(
                "   {}  └─ Sync crop: {:?}{}",
                child_prefix,
                crop,
                if fallback { " (fallback)" } else { "" }
            );
        }
    }

    println!("\nRecordings ({})", blueprint.recordings.len());
    for (i, recording) in blueprint.recordings.iter().enumerate() {
        let prefix = if i == blueprint.recordings.len() - 1 { "└─" } else { "├─" };
        let sources: Vec<String> = recording
            .sources
            .iter()
            .map(|(view, source)| format!("{}={}", view, source.kind_name()))
            .collect();
        println!("   {} {} [{}]", prefix, recording.name, sources.join(", "));
    }

    if args.sinks && !blueprint.sinks.is_empty() {
        println!("\nSinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let prefix = if i == blueprint.sinks.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {} ({:?}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}
