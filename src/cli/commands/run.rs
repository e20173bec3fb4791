//! `run` command: drive the challenge from stdin or a click script.
//!
//! Interactive input is one command per line:
//!
//! | Line | Effect |
//! |---|---|
//! | `a`, `b`, `c` | click that zone |
//! | `start`, `click` | click zone C |
//! | `burst N` | click zone C `N` times |
//! | `quit`, `exit` | stop |

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::activation::HttpActivator;
use crate::cli::args::{OutputFormat, RunArgs};
use crate::cli::commands::load_config;
use crate::config::schema::GateConfig;
use crate::error::KnockGateError;
use crate::gate::{Gate, GateEvent, GateExit, ZoneId};
use crate::surface::{RecordingSurface, TerminalSurface};

/// Longest interactive input line accepted.
const MAX_INPUT_LINE: usize = 1024;

/// Most clicks a single `burst N` line may request.
const MAX_BURST_CLICKS: u32 = 10_000;

/// Extra time after the last scripted click for the burst and the
/// verification call to finish.
const SCRIPT_GRACE: Duration = Duration::from_secs(1);

/// A parsed interactive line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Clicks { zone: ZoneId, count: u32 },
    Quit,
    Blank,
}

/// A timed click sequence replayed by `run --script`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickScript {
    /// Steps in time order
    pub steps: Vec<ClickStep>,
}

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickStep {
    /// Offset from the start of the replay
    pub at_ms: u64,
    /// Zone to click
    pub zone: ZoneId,
    /// Number of clicks at this instant
    #[serde(default = "one")]
    pub count: u32,
}

const fn one() -> u32 {
    1
}

impl ClickScript {
    /// Parses and checks a script.
    ///
    /// # Errors
    ///
    /// Returns a usage error if the YAML is malformed, the script is
    /// empty, or the steps are not in time order.
    pub fn parse(raw: &str) -> Result<Self, KnockGateError> {
        let script: Self = serde_yaml::from_str(raw)
            .map_err(|e| KnockGateError::Usage(format!("invalid click script: {e}")))?;

        if script.steps.is_empty() {
            return Err(KnockGateError::Usage("click script has no steps".to_string()));
        }
        if let Some(pair) = script.steps.windows(2).find(|w| w[1].at_ms < w[0].at_ms) {
            return Err(KnockGateError::Usage(format!(
                "click script steps out of order: {} ms after {} ms",
                pair[1].at_ms, pair[0].at_ms
            )));
        }
        Ok(script)
    }

    /// Offset of the last step.
    #[must_use]
    pub fn span(&self) -> Duration {
        Duration::from_millis(self.steps.last().map_or(0, |s| s.at_ms))
    }
}

/// Final report of a run.
#[derive(Debug, Serialize)]
struct RunReport {
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resets: Option<usize>,
}

/// Runs the challenge.
///
/// # Errors
///
/// Returns a config error if the configuration cannot be loaded, a usage
/// error for a malformed click script, or an I/O error if stdin fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), KnockGateError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let config = load_config(args.config.as_deref(), args.base_url.as_deref())?;
    let activator = Arc::new(HttpActivator::new(&config.activation)?);

    let report = match &args.script {
        Some(path) => run_script(path, config, activator, cancel).await?,
        None => run_interactive(config, activator, cancel).await?,
    };

    print_report(&report, args.format)
}

async fn run_interactive(
    config: Arc<GateConfig>,
    activator: Arc<HttpActivator>,
    cancel: CancellationToken,
) -> Result<RunReport, KnockGateError> {
    let gate = Gate::new(config, TerminalSurface::new(), activator);
    let sender = gate.sender();
    let gate_cancel = cancel.child_token();
    let mut gate_task = tokio::spawn(gate.run(gate_cancel.clone()));

    let mut lines = FramedRead::new(
        tokio::io::stdin(),
        LinesCodec::new_with_max_length(MAX_INPUT_LINE),
    );
    info!("reading clicks from stdin (a, b, c, start, burst N, quit)");

    loop {
        tokio::select! {
            exit = &mut gate_task => return Ok(exit_report(join(exit)?, None)),
            line = lines.next() => match line {
                None => break,
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!(max = MAX_INPUT_LINE, "input line too long, skipped");
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    gate_cancel.cancel();
                    return Err(e.into());
                }
                Some(Ok(line)) => match parse_input(&line) {
                    Ok(Input::Clicks { zone, count }) => post_clicks(&sender, zone, count),
                    Ok(Input::Quit) => break,
                    Ok(Input::Blank) => {}
                    Err(msg) => warn!(input = %line, "{msg}"),
                },
            },
        }
    }

    gate_cancel.cancel();
    Ok(exit_report(join(gate_task.await)?, None))
}

async fn run_script(
    path: &Path,
    config: Arc<GateConfig>,
    activator: Arc<HttpActivator>,
    cancel: CancellationToken,
) -> Result<RunReport, KnockGateError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let script = ClickScript::parse(&raw)?;
    info!(steps = script.steps.len(), span_ms = script.span().as_millis(), "replaying click script");

    let grace = config
        .burst
        .duration
        .saturating_add(config.activation.timeout)
        .saturating_add(SCRIPT_GRACE);
    let surface = RecordingSurface::new();
    let gate = Gate::new(config, surface.clone(), activator);
    let sender = gate.sender();
    let gate_cancel = cancel.child_token();

    let feeder_cancel = gate_cancel.clone();
    let feeder = tokio::spawn(async move {
        let start = Instant::now();
        for step in &script.steps {
            tokio::select! {
                () = feeder_cancel.cancelled() => return,
                () = tokio::time::sleep_until(start + Duration::from_millis(step.at_ms)) => {}
            }
            debug!(at_ms = step.at_ms, zone = %step.zone, count = step.count, "scripted clicks");
            post_clicks(&sender, step.zone, step.count);
        }
        tokio::select! {
            () = feeder_cancel.cancelled() => {}
            () = tokio::time::sleep(grace) => feeder_cancel.cancel(),
        }
    });

    let exit = gate.run(gate_cancel.clone()).await;
    gate_cancel.cancel();
    let _ = feeder.await;

    Ok(exit_report(exit, Some(surface.snapshot().reloads)))
}

fn post_clicks(sender: &mpsc::UnboundedSender<GateEvent>, zone: ZoneId, count: u32) {
    for _ in 0..count {
        if sender.send(GateEvent::Click(zone)).is_err() {
            return;
        }
    }
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(Input::Blank);
    };
    let head = head.to_ascii_lowercase();

    let input = match head.as_str() {
        "quit" | "exit" => Input::Quit,
        "start" | "click" => Input::Clicks {
            zone: ZoneId::C,
            count: 1,
        },
        "burst" => {
            let count = words
                .next()
                .ok_or_else(|| "burst needs a click count".to_string())?
                .parse::<u32>()
                .map_err(|e| format!("invalid burst count: {e}"))?;
            if count > MAX_BURST_CLICKS {
                return Err(format!("burst count above {MAX_BURST_CLICKS}"));
            }
            Input::Clicks {
                zone: ZoneId::C,
                count,
            }
        }
        other => Input::Clicks {
            zone: other.parse()?,
            count: 1,
        },
    };

    if words.next().is_some() {
        return Err(format!("unexpected arguments after '{head}'"));
    }
    Ok(input)
}

fn join(result: Result<GateExit, tokio::task::JoinError>) -> Result<GateExit, KnockGateError> {
    result.map_err(|e| KnockGateError::Io(std::io::Error::other(e.to_string())))
}

fn exit_report(exit: GateExit, resets: Option<usize>) -> RunReport {
    match exit {
        GateExit::Navigated(target) => RunReport {
            outcome: "navigated",
            target: Some(target),
            resets,
        },
        GateExit::Cancelled => RunReport {
            outcome: "stopped",
            target: None,
            resets,
        },
    }
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<(), KnockGateError> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(report)?),
        OutputFormat::Human => {
            match &report.target {
                Some(target) => println!("navigated to {target}"),
                None => println!("stopped without passing the challenge"),
            }
            if let Some(resets) = report.resets {
                println!("resets: {resets}");
            }
        }
    }
    Ok(())
}
