//! `check` command: validate configuration files.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::args::{CheckArgs, OutputFormat};
use crate::config::ConfigLoader;
use crate::config::loader::error_path;
use crate::error::{ConfigError, KnockGateError, ValidationIssue};

/// Outcome for one file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: PathBuf,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validates every file and prints a report.
///
/// All files are checked even after a failure.
///
/// # Errors
///
/// Returns the error of the first invalid file. Under `--strict`, a file
/// with warnings counts as invalid.
pub fn run(args: &CheckArgs) -> Result<(), KnockGateError> {
    let loader = ConfigLoader::with_defaults();
    let mut first_failure: Option<ConfigError> = None;
    let mut reports = Vec::with_capacity(args.files.len());

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let report = match loader.load(path) {
            Ok(loaded) => {
                let warnings = render(&loaded.warnings);
                let valid = !(args.strict && !warnings.is_empty());
                if !valid && first_failure.is_none() {
                    first_failure = Some(ConfigError::ValidationError {
                        path: path.display().to_string(),
                        errors: loaded.warnings.clone(),
                    });
                }
                FileReport {
                    file: path.clone(),
                    valid,
                    errors: Vec::new(),
                    warnings,
                }
            }
            Err(err) => {
                let report = failure_report(path, &err);
                first_failure.get_or_insert(err);
                report
            }
        };
        reports.push(report);
    }

    print_reports(&reports, args.format)?;

    first_failure.map_or(Ok(()), |err| Err(err.into()))
}

fn failure_report(path: &Path, err: &ConfigError) -> FileReport {
    let errors = match err {
        ConfigError::ValidationError { errors, .. } => render(errors),
        other => vec![other.to_string()],
    };
    FileReport {
        file: error_path(err).unwrap_or_else(|| path.to_path_buf()),
        valid: false,
        errors,
        warnings: Vec::new(),
    }
}

fn render(issues: &[ValidationIssue]) -> Vec<String> {
    issues.iter().map(ToString::to_string).collect()
}

fn print_reports(reports: &[FileReport], format: OutputFormat) -> Result<(), KnockGateError> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(reports)?);
        }
        OutputFormat::Human => {
            for report in reports {
                let verdict = if report.valid { "ok" } else { "invalid" };
                println!("{}: {verdict}", report.file.display());
                for line in report.errors.iter().chain(&report.warnings) {
                    println!("  {line}");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn file(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn args(files: Vec<PathBuf>, strict: bool) -> CheckArgs {
        CheckArgs {
            files,
            format: OutputFormat::Json,
            strict,
        }
    }

    #[test]
    fn test_valid_file_passes() {
        let good = file("burst:\n  threshold: 150\n");
        assert!(run(&args(vec![good.path().to_path_buf()], false)).is_ok());
    }

    #[test]
    fn test_invalid_file_fails_with_config_exit_code() {
        let good = file("");
        let bad = file("windows:\n  blind: { min_ms: 5000, max_ms: 100 }\n");
        let err = run(&args(
            vec![good.path().to_path_buf(), bad.path().to_path_buf()],
            false,
        ))
        .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_strict_turns_warnings_into_failure() {
        let warned = file("windows:\n  first: { min_ms: 2000, max_ms: 2000 }\n");
        assert!(run(&args(vec![warned.path().to_path_buf()], false)).is_ok());
        assert!(run(&args(vec![warned.path().to_path_buf()], true)).is_err());
    }

    #[test]
    fn test_missing_file_reported() {
        let report = failure_report(
            Path::new("/nope.yaml"),
            &ConfigError::MissingFile {
                path: PathBuf::from("/nope.yaml"),
            },
        );
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
    }
}
