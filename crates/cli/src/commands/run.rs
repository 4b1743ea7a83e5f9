//! `run` command implementation.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use contracts::{RigBlueprint, SinkConfig, SinkType};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(ref output) = args.output {
        info!(output = %output.display(), "Overriding file output directory from CLI");
        apply_output_override(&mut blueprint, output);
    }

    info!(
        project = %blueprint.project.name,
        reference = %blueprint.sync.ref_view,
        views = blueprint.views.len(),
        recordings = blueprint.recordings.len(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        base_dir: args.config.parent().map(Path::to_path_buf),
        recordings: args.recordings.clone(),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    });

    info!("Starting alignment...");

    tokio::select! {
        result = pipeline.run() => {
            let stats = result.context("Pipeline execution failed")?;
            info!(
                reports = stats.alignment.total_reports,
                failed_views = stats.failed_views(),
                skipped_recordings = stats.failed_recordings.len(),
                duration_secs = stats.duration.as_secs_f64(),
                "Alignment finished"
            );
            stats.print_summary();

            if args.strict && !stats.is_complete() {
                return Err(CliError::AlignmentIncomplete {
                    failed_views: stats.failed_views(),
                    failed_recordings: stats.failed_recordings.len(),
                    lost_writes: stats.lost_writes(),
                }
                .into());
            }
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping alignment...");
        }
    }

    info!("ledsync finished");
    Ok(())
}

/// Point every file sink at `output`, adding one when none is configured
fn apply_output_override(blueprint: &mut RigBlueprint, output: &Path) {
    let base_path = output.display().to_string();
    let mut found = false;
    for sink in blueprint
        .sinks
        .iter_mut()
        .filter(|sink| sink.sink_type == SinkType::File)
    {
        sink.params.insert("base_path".into(), base_path.clone());
        found = true;
    }

    if !found {
        blueprint.sinks.push(SinkConfig {
            name: "output".into(),
            sink_type: SinkType::File,
            queue_capacity: 16,
            params: HashMap::from([("base_path".to_string(), base_path)]),
        });
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &RigBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Project: {}", blueprint.project.name);

    println!("\nSync:");
    println!("  Reference view: {}", blueprint.sync.ref_view);
    println!("  Sync crop: {}", blueprint.sync.ref_crop);
    let stages: Vec<&str> = blueprint
        .sync
        .pipeline
        .iter()
        .map(|s| s.method().as_str())
        .collect();
    println!("  Pipeline: [{}]", stages.join(", "));

    println!("\nViews ({}):", blueprint.views.len());
    for view in &blueprint.views {
        println!("  - {} ({:?}, {} Hz)", view.id, view.signal, view.frame_rate);
    }

    println!("\nRecordings ({}):", blueprint.recordings.len());
    for recording in &blueprint.recordings {
        println!("  - {} ({} sources)", recording.name, recording.sources.len());
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
