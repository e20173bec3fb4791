//! CLI argument definitions
//!
//! All Clap derive structs for `knockgate` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Hidden click-sequence challenge gate.
#[derive(Parser, Debug)]
#[command(name = "knockgate", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "KNOCKGATE_COLOR")]
    pub color: ColorChoice,

    /// Log line format on stderr.
    #[arg(long, default_value = "human", global = true, env = "KNOCKGATE_LOG_FORMAT")]
    pub log_format: OutputFormat,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the challenge, fed from stdin or a click script.
    Run(RunArgs),

    /// Validate configuration files.
    Check(CheckArgs),

    /// Follow the push stream and print refreshed fragments.
    Watch(WatchArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "KNOCKGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Origin of the host; overrides `activation.base_url`.
    #[arg(long, env = "KNOCKGATE_BASE_URL")]
    pub base_url: Option<String>,

    /// Replay a YAML click script instead of reading stdin.
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Output format for the final report.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "KNOCKGATE_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for `check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "KNOCKGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Origin of the host; overrides `activation.base_url`.
    #[arg(long, env = "KNOCKGATE_BASE_URL")]
    pub base_url: Option<String>,

    /// Fixed CSRF token instead of reading the page metadata.
    #[arg(long, env = "KNOCKGATE_CSRF_TOKEN")]
    pub csrf_token: Option<String>,

    /// Output format for swapped fragments.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "KNOCKGATE_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

impl From<OutputFormat> for LogFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => Self::Human,
            OutputFormat::Json => Self::Json,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_script() {
        let cli = Cli::try_parse_from(["knockgate", "run", "--script", "clicks.yaml"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.script, Some(PathBuf::from("clicks.yaml")));
        assert_eq!(args.format, OutputFormat::Human);
    }

    #[test]
    fn test_check_requires_files() {
        assert!(Cli::try_parse_from(["knockgate", "check"]).is_err());
        assert!(Cli::try_parse_from(["knockgate", "check", "a.yaml", "--strict"]).is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["knockgate", "version", "-vv", "--color", "never"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.color, ColorChoice::Never);
    }

    #[test]
    fn test_help_output() {
        let err = Cli::try_parse_from(["knockgate", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_output() {
        let err = Cli::try_parse_from(["knockgate", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_log_format_maps_to_logging() {
        assert_eq!(LogFormat::from(OutputFormat::Json), LogFormat::Json);
    }
}
