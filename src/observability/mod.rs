//! Observability module
//!
//! Logging and metrics for the gate and the refresh collaborator.

pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, LogSettings, init_logging};
pub use metrics::init_metrics;
