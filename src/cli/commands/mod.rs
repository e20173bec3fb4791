//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod check;
pub mod run;
pub mod version;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::activation::parse_base_url;
use crate::cli::args::{Cli, Commands};
use crate::config::ConfigLoader;
use crate::config::schema::GateConfig;
use crate::error::{ConfigError, KnockGateError};

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), KnockGateError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Check(args) => check::run(&args),
        Commands::Watch(args) => watch::run(&args, cancel).await,
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Loads the configuration file, or the defaults when none is given, and
/// applies a base URL override.
///
/// # Errors
///
/// Returns a config error if loading fails or the override is not an
/// absolute http(s) URL.
pub fn load_config(
    path: Option<&Path>,
    base_url: Option<&str>,
) -> Result<Arc<GateConfig>, KnockGateError> {
    let mut config = match path {
        Some(path) => {
            tracing::info!(config = %path.display(), "loading configuration");
            let loaded = ConfigLoader::with_defaults().load(path)?;
            for warning in &loaded.warnings {
                tracing::warn!(location = %warning.path, "{}", warning.message);
            }
            loaded.config
        }
        None => Arc::new(GateConfig::default()),
    };

    if let Some(url) = base_url {
        parse_base_url(url).map_err(|_| ConfigError::InvalidValue {
            field: "base_url".to_string(),
            value: url.to_string(),
            expected: "an absolute http(s) URL".to_string(),
        })?;
        Arc::make_mut(&mut config).activation.base_url = url.to_string();
    }

    Ok(config)
}
