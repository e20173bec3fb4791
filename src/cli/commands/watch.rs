//! `watch` command: follow the host's push stream and print fragment swaps.

use std::io::Write;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::args::{OutputFormat, WatchArgs};
use crate::cli::commands::load_config;
use crate::error::KnockGateError;
use crate::refresh::{FragmentSink, LiveRefresh};

/// One swap as printed in JSON mode.
#[derive(Debug, Serialize)]
struct SwapLine<'a> {
    container: &'a str,
    bytes: usize,
}

/// Sink that writes one line per swapped fragment.
struct PrintSink<W> {
    out: W,
    format: OutputFormat,
}

impl<W: Write + Send> FragmentSink for PrintSink<W> {
    fn swap(&mut self, container: &str, html: String) {
        let line = match self.format {
            OutputFormat::Human => format!("swapped #{container} ({} bytes)", html.len()),
            OutputFormat::Json => {
                let line = SwapLine {
                    container,
                    bytes: html.len(),
                };
                match serde_json::to_string(&line) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode swap line");
                        return;
                    }
                }
            }
        };
        if let Err(e) = writeln!(self.out, "{line}") {
            tracing::warn!(error = %e, "failed to write swap line");
        }
    }
}

/// Subscribes to the push stream until cancelled.
///
/// # Errors
///
/// Returns a config error if the configuration cannot be loaded, or a
/// refresh error if no CSRF token can be obtained.
pub async fn run(args: &WatchArgs, cancel: CancellationToken) -> Result<(), KnockGateError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let config = load_config(args.config.as_deref(), args.base_url.as_deref())?;
    let mut refresh_config = config.refresh.clone();
    if let Some(token) = &args.csrf_token {
        refresh_config.csrf_token = Some(token.clone());
    }

    let refresh = LiveRefresh::new(&config.activation.base_url, refresh_config)?;
    info!(
        base_url = %config.activation.base_url,
        fragments = config.refresh.fragments.len(),
        "watching for content updates"
    );

    let mut sink = PrintSink {
        out: std::io::stdout(),
        format: args.format,
    };
    refresh.run(&mut sink, cancel).await?;
    Ok(())
}
