//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `RigBlueprint`
//! - Surface non-fatal warnings (e.g. crop fallbacks)
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("Views: {}", blueprint.views.len());
//! ```

mod parser;
mod rules;

pub use contracts::RigBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RigBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RigBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Non-fatal findings on an already validated blueprint
    pub fn warnings(blueprint: &RigBlueprint) -> Vec<String> {
        let mut warnings: Vec<String> = blueprint
            .views_without_sync_crop()
            .into_iter()
            .map(|view| {
                format!(
                    "view '{view}' has no crop '{}', falling back to its default crop",
                    blueprint.sync.ref_crop
                )
            })
            .collect();

        if blueprint.sync.pipeline.is_empty() {
            warnings.push("sync.pipeline is empty, every view gets the identity mapping".into());
        }
        if blueprint.recordings.is_empty() {
            warnings.push("no recordings configured".into());
        }
        if blueprint.sinks.is_empty() {
            warnings.push("no sinks configured, reports are only summarized".into());
        }
        warnings
    }

    /// Serialize RigBlueprint to TOML string
    pub fn to_toml(blueprint: &RigBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize RigBlueprint to JSON string
    pub fn to_json(blueprint: &RigBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RigBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        rules::validate(&blueprint)?;
        Ok(blueprint)
    }
}
