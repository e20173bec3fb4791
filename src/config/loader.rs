//! Configuration loading.
//!
//! Pipeline: read file, substitute `${VAR}` references in the raw text,
//! parse YAML into [`GateConfig`], then run the [`Validator`]. Warnings
//! never stop loading; errors always do.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::GateConfig;
use crate::config::validation::Validator;
use crate::error::{ConfigError, ValidationIssue};

/// Default upper bound for configuration file size.
pub const DEFAULT_MAX_CONFIG_SIZE: usize = 256 * 1024;

/// Options controlling the loader.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Largest accepted file, in bytes
    pub max_config_size: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_config_size: DEFAULT_MAX_CONFIG_SIZE,
        }
    }
}

/// Result of loading a configuration.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration
    pub config: Arc<GateConfig>,
    /// Substitution and validation warnings
    pub warnings: Vec<ValidationIssue>,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or too large, if YAML
    /// parsing fails, if a required environment variable is unset, or if
    /// validation reports any error.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > self.options.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{size} bytes"),
                expected: format!("at most {} bytes", self.options.max_config_size),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_named(&raw, path)
    }

    /// Loads and validates configuration text that did not come from a file.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigLoader::load`], minus the file checks.
    pub fn load_from_str(&self, raw: &str) -> Result<LoadResult, ConfigError> {
        self.load_named(raw, Path::new("<inline>"))
    }

    fn load_named(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut warnings = Vec::new();
        let substituted = substitute_env(raw, path, &mut warnings)?;

        let config = parse(&substituted, path)?;

        let result = Validator::new().validate(&config);
        if !result.is_valid() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }
        warnings.extend(result.warnings);

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

/// Parses YAML text; a blank or comment-only document yields the defaults.
fn parse(text: &str, path: &Path) -> Result<GateConfig, ConfigError> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;

    if value.is_null() {
        return Ok(GateConfig::default());
    }

    serde_yaml::from_value(value).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        line: None,
        message: e.to_string(),
    })
}

/// Expands `${VAR}`, `${VAR:-default}` and `${VAR:?message}` in raw text.
///
/// `$$` is a literal `$`. An unset `${VAR}` without a default expands to
/// the empty string and records a warning.
fn substitute_env(
    raw: &str,
    path: &Path,
    warnings: &mut Vec<ValidationIssue>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        if let Some(after) = tail.strip_prefix('$') {
            out.push('$');
            rest = after;
            continue;
        }

        let Some(body_start) = tail.strip_prefix('{') else {
            out.push('$');
            rest = tail;
            continue;
        };

        let close = body_start.find('}').ok_or_else(|| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: None,
            message: "unclosed environment variable reference".to_string(),
        })?;
        let spec = &body_start[..close];
        rest = &body_start[close + 1..];

        out.push_str(&expand(spec, path, warnings)?);
    }

    out.push_str(rest);
    Ok(out)
}

fn expand(
    spec: &str,
    path: &Path,
    warnings: &mut Vec<ValidationIssue>,
) -> Result<String, ConfigError> {
    let (name, fallback) = match spec.split_once(':') {
        Some((name, modifier)) => (name, Some(modifier)),
        None => (spec, None),
    };

    if let Ok(value) = std::env::var(name) {
        return Ok(value);
    }

    if let Some(default) = fallback.and_then(|m| m.strip_prefix('-')) {
        return Ok(default.to_string());
    }
    if let Some(message) = fallback.and_then(|m| m.strip_prefix('?')) {
        return Err(ConfigError::EnvVarNotSet {
            var: name.to_string(),
            message: message.to_string(),
        });
    }

    warnings.push(ValidationIssue::warning(
        path.display().to_string(),
        format!("environment variable '{name}' is not set, using empty string"),
    ));
    Ok(String::new())
}

/// Returns the path a configuration error refers to, if any.
#[must_use]
pub fn error_path(err: &ConfigError) -> Option<PathBuf> {
    match err {
        ConfigError::ParseError { path, .. } | ConfigError::MissingFile { path } => {
            Some(path.clone())
        }
        ConfigError::ValidationError { path, .. } => Some(PathBuf::from(path)),
        ConfigError::InvalidValue { .. } | ConfigError::EnvVarNotSet { .. } => None,
    }
}
