//! Semantic validation of a parsed [`GateConfig`].
//!
//! Validation collects every issue instead of stopping at the first one,
//! so `knockgate check` can report a whole file in one pass.

use std::time::Duration;

use crate::config::schema::{ActivationConfig, BurstConfig, GateConfig, RefreshConfig};
use crate::error::ValidationIssue;
use crate::gate::stage::TimingWindow;

/// Burst rates above this many clicks per second are reported as a warning.
const IMPLAUSIBLE_RATE_PER_SEC: f64 = 100.0;

/// Longest duration any setting may hold.
pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of validating a configuration.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Issues that prevent the configuration from loading
    pub errors: Vec<ValidationIssue>,
    /// Informational issues
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &GateConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.check_window("windows.first", config.windows.first);
        self.check_window("windows.second", config.windows.second);
        self.check_window("windows.blind", config.windows.blind);
        self.check_burst(&config.burst);
        self.check_duration("overlay.tick", config.overlay.tick);
        self.check_zones(config);
        self.check_activation(&config.activation);
        self.check_refresh(&config.refresh);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn check_window(&mut self, path: &str, window: TimingWindow) {
        if window.min_ms > window.max_ms {
            self.errors.push(ValidationIssue::error(
                path,
                format!("min_ms ({}) exceeds max_ms ({})", window.min_ms, window.max_ms),
            ));
        } else if window.max_ms == 0 {
            self.errors
                .push(ValidationIssue::error(path, "window must allow a non-zero delay"));
        } else if window.min_ms == window.max_ms {
            self.warnings.push(ValidationIssue::warning(
                path,
                "window is a single millisecond wide",
            ));
        }
    }

    fn check_burst(&mut self, burst: &BurstConfig) {
        self.check_duration("burst.duration", burst.duration);
        self.check_duration("burst.sample_interval", burst.sample_interval);
        self.check_duration("burst.rate_window", burst.rate_window);

        if burst.threshold == 0 {
            self.errors.push(ValidationIssue::error(
                "burst.threshold",
                "threshold must be at least 1",
            ));
        }

        let secs = burst.duration.as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let rate = burst.threshold as f64 / secs;
        if secs > 0.0 && rate > IMPLAUSIBLE_RATE_PER_SEC {
            self.warnings.push(ValidationIssue::warning(
                "burst.threshold",
                format!("threshold requires {rate:.0} clicks per second"),
            ));
        }
    }

    fn check_zones(&mut self, config: &GateConfig) {
        for (name, geometry) in [
            ("zones.a", config.zones.a),
            ("zones.b", config.zones.b),
            ("zones.c", config.zones.c),
        ] {
            if geometry.width == 0 || geometry.height == 0 {
                self.errors
                    .push(ValidationIssue::error(name, "zone must have a non-zero size"));
            }
        }
        if config.zones.button_size == 0 {
            self.errors.push(ValidationIssue::error(
                "zones.button_size",
                "button must have a non-zero size",
            ));
        }
    }

    fn check_activation(&mut self, activation: &ActivationConfig) {
        self.check_base_url("activation.base_url", &activation.base_url);
        self.check_path("activation.path", &activation.path);
        self.check_duration("activation.timeout", activation.timeout);
    }

    fn check_refresh(&mut self, refresh: &RefreshConfig) {
        self.check_path("refresh.page_path", &refresh.page_path);
        self.check_path("refresh.stream_path", &refresh.stream_path);
        self.check_duration("refresh.retry", refresh.retry);
        for (i, fragment) in refresh.fragments.iter().enumerate() {
            self.check_path(&format!("refresh.fragments[{i}].path"), &fragment.path);
            if fragment.container.trim().is_empty() {
                self.errors.push(ValidationIssue::error(
                    format!("refresh.fragments[{i}].container"),
                    "container id cannot be empty",
                ));
            }
        }
        if refresh.csrf_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            self.errors.push(ValidationIssue::error(
                "refresh.csrf_token",
                "token cannot be empty; omit the field to read it from the page",
            ));
        }
    }

    fn check_base_url(&mut self, path: &str, raw: &str) {
        match reqwest::Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => self.errors.push(ValidationIssue::error(
                path,
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => self
                .errors
                .push(ValidationIssue::error(path, format!("not an absolute URL: {e}"))),
        }
    }

    fn check_path(&mut self, path: &str, value: &str) {
        if !value.starts_with('/') {
            self.errors
                .push(ValidationIssue::error(path, "path must start with '/'"));
        }
    }

    fn check_duration(&mut self, path: &str, value: Duration) {
        if value.is_zero() {
            self.errors
                .push(ValidationIssue::error(path, "duration must be greater than zero"));
        } else if value > MAX_DURATION {
            self.errors.push(ValidationIssue::error(
                path,
                format!(
                    "duration must be at most {}",
                    humantime::format_duration(MAX_DURATION)
                ),
            ));
        }
    }
}
