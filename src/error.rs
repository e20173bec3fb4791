//! Error types for `knockgate`
//!
//! The hierarchy mirrors the process boundaries: configuration, the
//! verification call, the live-refresh collaborator, and the challenge
//! failures that always end in a reset.

use std::path::PathBuf;
use thiserror::Error;

use crate::gate::stage::{Stage, TimingWindow};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `knockgate` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Verification endpoint or push stream unreachable
    pub const TRANSPORT_ERROR: i32 = 4;

    /// Usage error (invalid arguments, malformed click script)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `knockgate` operations.
#[derive(Debug, Error)]
pub enum KnockGateError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Verification call error outside of a running challenge
    #[error(transparent)]
    Activation(#[from] ActivationError),

    /// Live refresh collaborator error
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl KnockGateError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Activation(_) | Self::Refresh(_) => ExitCode::TRANSPORT_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable required by `${VAR:?message}` is not set
    #[error("environment variable '{var}' not set: {message}")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message from the reference
        message: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g., "windows.first")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl ValidationIssue {
    /// Creates an error-severity issue.
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// Creates a warning-severity issue.
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Reported, but the configuration still loads
    Warning,
}

// ============================================================================
// Challenge Errors
// ============================================================================

/// Reasons an attempt fails.
///
/// Every variant is handled the same way: the attempt is torn down and a
/// fresh session starts at [`Stage::Idle`]. The distinction only exists for
/// logging and metrics.
#[derive(Debug, Clone, Error)]
pub enum ChallengeError {
    /// A click landed outside the window required by the current stage
    #[error("click at stage {stage} after {elapsed_ms} ms is outside window {window}")]
    TimingViolation {
        /// Stage the click was evaluated against
        stage: Stage,
        /// Milliseconds since the last accepted click
        elapsed_ms: u64,
        /// Window the click had to land in
        window: TimingWindow,
    },

    /// The burst tally was below the threshold when the window closed
    #[error(
        "burst tally {tally} below threshold {required} ({} short)",
        required.saturating_sub(*tally)
    )]
    InsufficientRate {
        /// Clicks counted during the burst window
        tally: usize,
        /// Clicks required to pass
        required: usize,
    },

    /// The verification call failed or returned no target
    #[error("verification failed: {0}")]
    CommunicationFailure(#[from] ActivationError),
}

impl ChallengeError {
    /// Short label used for log fields and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TimingViolation { .. } => "timing_violation",
            Self::InsufficientRate { .. } => "insufficient_rate",
            Self::CommunicationFailure(_) => "communication_failure",
        }
    }

    /// Number of clicks missing from the burst tally, if this is a rate failure.
    #[must_use]
    pub const fn shortfall(&self) -> Option<usize> {
        match self {
            Self::InsufficientRate { tally, required } => Some(required.saturating_sub(*tally)),
            _ => None,
        }
    }
}

// ============================================================================
// Activation Errors
// ============================================================================

/// Verification endpoint errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActivationError {
    /// Configured base URL is not an absolute URL
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Connection or request failure
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout
    #[error("verification request timed out")]
    Timeout,

    /// Endpoint answered with a non-success status
    #[error("verification endpoint returned HTTP {0}")]
    HttpStatus(u16),

    /// Body was not the expected JSON shape
    #[error("invalid verification response: {0}")]
    InvalidResponse(String),

    /// Body parsed but carried no navigation target
    #[error("verification response has no navigation target")]
    MissingTarget,
}

// ============================================================================
// Refresh Errors
// ============================================================================

/// Live refresh collaborator errors.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Configured base URL is not an absolute URL
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Connection or request failure
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success status
    #[error("push stream returned HTTP {0}")]
    HttpStatus(u16),

    /// No CSRF token configured and none found in the page metadata
    #[error("no csrf-token meta tag found at {0}")]
    MissingCsrfToken(String),
}
