//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ledsync - align multi-camera recordings on a shared LED pulse train
#[derive(Parser, Debug)]
#[command(
    name = "ledsync",
    author,
    version,
    about = "Multi-camera LED pulse synchronization",
    long_about = "Aligns the clocks of several cameras (and analog channels) that all \n\
                  observe the same blinking sync LED.\n\n\
                  Detects pulse onsets per view, estimates offset and drift against a \n\
                  reference view, and writes per-view alignment parameters to the \n\
                  configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LEDSYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "LEDSYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level used when `RUST_LOG` is unset
    pub fn default_log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Align recordings and dispatch the reports
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "LEDSYNC_CONFIG")]
    pub config: PathBuf,

    /// Only align these recordings (repeatable; default: all)
    #[arg(short, long = "recording", value_name = "NAME")]
    pub recordings: Vec<String>,

    /// Write file output here, overriding every file sink's base_path
    #[arg(short, long, env = "LEDSYNC_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Exit with an error when any view or recording failed
    #[arg(long, env = "LEDSYNC_STRICT")]
    pub strict: bool,

    /// Validate configuration and exit without aligning
    #[arg(long)]
    pub dry_run: bool,

    /// Report channel capacity between engine and dispatcher
    #[arg(long, default_value = "16", env = "LEDSYNC_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "LEDSYNC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml", env = "LEDSYNC_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "LEDSYNC_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show detailed view information
    #[arg(long)]
    pub views: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
