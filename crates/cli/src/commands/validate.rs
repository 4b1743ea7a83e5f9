//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::RigBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    project: String,
    reference_view: String,
    pipeline: Vec<String>,
    view_count: usize,
    recording_count: usize,
    sink_count: usize,
}

impl ConfigSummary {
    fn new(blueprint: &RigBlueprint) -> Self {
        Self {
            version: format!("{:?}", blueprint.version),
            project: blueprint.project.name.clone(),
            reference_view: blueprint.sync.ref_view.to_string(),
            pipeline: blueprint
                .sync
                .pipeline
                .iter()
                .map(|stage| stage.method().to_string())
                .collect(),
            view_count: blueprint.views.len(),
            recording_count: blueprint.recordings.len(),
            sink_count: blueprint.sinks.len(),
        }
    }
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: Vec::new(),
            summary: None,
        };
    }

    match ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: ConfigLoader::warnings(&blueprint),
            summary: Some(ConfigSummary::new(&blueprint)),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Project: {}", summary.project);
            println!("  Reference view: {}", summary.reference_view);
            println!("  Pipeline: [{}]", summary.pipeline.join(", "));
            println!("  Views: {}", summary.view_count);
            println!("  Recordings: {}", summary.recording_count);
            println!("  Sinks: {}", summary.sink_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn args(config: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config,
            json: false,
        }
    }

    #[test]
    fn missing_file_is_invalid() {
        let result = validate_config(&args(PathBuf::from("/nonexistent/rig.toml")));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn valid_config_reports_crop_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rig.toml");
        fs::write(
            &path,
            r#"
[project]
name = "bench"

[sync]
ref_view = "BC"
ref_crop = "sync_led"

[[views]]
id = "BC"
frame_rate = 100.0
[views.extra_crops.sync_led]
x_start = 0
x_end = 10
y_start = 0
y_end = 10

[[views]]
id = "TL"
frame_rate = 100.0
"#,
        )
        .unwrap();

        let result = validate_config(&args(path));
        assert!(result.valid, "{:?}", result.error);
        let summary = result.summary.unwrap();
        assert_eq!(summary.view_count, 2);
        assert_eq!(summary.pipeline, vec!["crosscorr", "regression", "samplerate"]);
        assert!(result.warnings.iter().any(|w| w.contains("view 'TL'")));
    }

    #[test]
    fn invalid_config_carries_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rig.toml");
        fs::write(
            &path,
            "[project]\nname = \"x\"\n\n[sync]\nref_view = \"BC\"\n\n\
             [[views]]\nid = \"BC\"\nframe_rate = 0.0\n",
        )
        .unwrap();

        let result = validate_config(&args(path));
        assert!(!result.valid);
        assert!(result.error.is_some());
    }
}
