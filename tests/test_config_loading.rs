use std::path::PathBuf;
use std::time::Duration;

use knockgate::config::ConfigLoader;
use knockgate::config::schema::GateConfig;
use knockgate::error::ConfigError;
use knockgate::gate::TimingWindow;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Spelling out every stock value yields the same config as the defaults.
#[test]
fn stock_fixture_matches_defaults() {
    let loaded = ConfigLoader::with_defaults()
        .load(&fixture("stock.yaml"))
        .unwrap();
    assert_eq!(*loaded.config, GateConfig::default());
    assert!(loaded.warnings.is_empty());
}

#[test]
fn partial_file_keeps_other_defaults() {
    let loaded = ConfigLoader::with_defaults()
        .load(&fixture("fast.yaml"))
        .unwrap();
    let config = &loaded.config;
    assert_eq!(config.windows.first, TimingWindow::new(100, 1500));
    assert_eq!(config.burst.duration, Duration::from_millis(300));
    assert_eq!(config.burst.threshold, 5);
    // untouched sections
    assert_eq!(config.burst.sample_interval, Duration::from_millis(100));
    assert_eq!(config.activation.path, "/_s_a_p_");
    assert_eq!(config.refresh, GateConfig::default().refresh);
}

#[test]
fn inverted_window_names_the_field() {
    let err = ConfigLoader::with_defaults()
        .load(&fixture("inverted_window.yaml"))
        .unwrap_err();
    let ConfigError::ValidationError { errors, .. } = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "windows.second");
}

#[test]
fn single_millisecond_window_is_a_warning() {
    let loaded = ConfigLoader::with_defaults()
        .load(&fixture("pinpoint_window.yaml"))
        .unwrap();
    assert_eq!(loaded.warnings.len(), 1);
    assert_eq!(loaded.warnings[0].path, "windows.blind");
}

#[test]
fn binary_content_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binary.yaml");
    std::fs::write(&path, b"\x00\x01\x02\x03\xff\xfe\xfd\xfc").unwrap();
    assert!(ConfigLoader::with_defaults().load(&path).is_err());
}

#[test]
fn unknown_keys_rejected() {
    let err = ConfigLoader::with_defaults()
        .load_from_str("burst:\n  treshold: 10\n")
        .unwrap_err();
    assert!(
        matches!(err, ConfigError::ParseError { .. }),
        "expected parse error, got {err:?}"
    );
}

#[test]
fn env_default_fills_base_url() {
    let loaded = ConfigLoader::with_defaults()
        .load_from_str(
            "activation:\n  base_url: ${KNOCKGATE_TEST_SURELY_UNSET_HOST:-http://10.0.0.7:8080}\n",
        )
        .unwrap();
    assert_eq!(loaded.config.activation.base_url, "http://10.0.0.7:8080");
}

#[test]
fn required_env_var_reports_message() {
    let err = ConfigLoader::with_defaults()
        .load_from_str(
            "activation:\n  base_url: ${KNOCKGATE_TEST_SURELY_UNSET_HOST:?host origin required}\n",
        )
        .unwrap_err();
    assert!(
        err.to_string().contains("host origin required"),
        "unexpected error: {err}"
    );
}
