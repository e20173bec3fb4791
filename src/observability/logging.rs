//! Log output on stderr.
//!
//! Gate activity is logged under the `knockgate` target. The `-v` count
//! only raises that target; the HTTP stack stays at `warn` unless
//! `KNOCKGATE_LOG_LEVEL` supplies a complete filter of its own.

use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable holding a full `EnvFilter` directive string.
pub const LOG_LEVEL_ENV: &str = "KNOCKGATE_LOG_LEVEL";

/// Shape of each log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One readable line per event
    #[default]
    Human,
    /// One flat JSON object per event
    Json,
}

/// How stderr logging is set up for one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogSettings {
    /// Line shape
    pub format: LogFormat,
    /// Number of `-v` flags
    pub verbosity: u8,
    /// `-q`: errors only, whatever the verbosity
    pub quiet: bool,
    /// Color control for human lines
    pub color: ColorChoice,
}

impl LogSettings {
    /// Level applied to `knockgate` events.
    #[must_use]
    pub const fn gate_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Filter used when the environment does not provide one.
    #[must_use]
    pub fn default_directives(&self) -> String {
        let dependencies = if self.quiet { "error" } else { "warn" };
        format!("{dependencies},knockgate={}", self.gate_level()).to_ascii_lowercase()
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new(self.default_directives()))
    }
}

/// Whether human lines carry ANSI colors.
fn ansi_enabled(color: ColorChoice, stderr_is_tty: bool, no_color: bool) -> bool {
    match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => stderr_is_tty && !no_color,
    }
}

/// Installs the global subscriber. Later calls leave the first one in place.
pub fn init_logging(settings: LogSettings) {
    // module paths are noise until someone is debugging
    let with_targets = settings.verbosity >= 2 && !settings.quiet;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(settings.filter())
        .with_target(with_targets)
        .with_writer(std::io::stderr);

    let _ = match settings.format {
        LogFormat::Human => builder
            .with_ansi(ansi_enabled(
                settings.color,
                std::io::stderr().is_terminal(),
                std::env::var_os("NO_COLOR").is_some(),
            ))
            .try_init(),
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init(),
    };
}
