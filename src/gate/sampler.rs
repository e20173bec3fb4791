//! Rolling click-rate display during the burst.
//!
//! Purely observational: the sampler reads the click buffer and pushes a
//! count to the button label. It never decides success or failure.

use std::time::Duration;

use tokio::time::Instant;

use super::tasks::{TaskHandle, TaskRegistry};

/// Counts timestamps strictly younger than `window` at `now`.
///
/// `clicks` must be in arrival order. Timestamps later than `now` count
/// as zero age.
#[must_use]
pub fn rolling_count(clicks: &[Instant], now: Instant, window: Duration) -> usize {
    clicks
        .iter()
        .rev()
        .take_while(|&&at| now.saturating_duration_since(at) < window)
        .count()
}

/// Periodic sampler of the burst click rate.
#[derive(Debug)]
pub struct ClickRateSampler {
    window: Duration,
    interval: Duration,
    task: Option<TaskHandle>,
}

impl ClickRateSampler {
    /// Creates an idle sampler.
    #[must_use]
    pub const fn new(window: Duration, interval: Duration) -> Self {
        Self {
            window,
            interval,
            task: None,
        }
    }

    /// Whether the sampling interval is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Starts posting `tick_event` every sample interval.
    ///
    /// A running interval is replaced, so at most one exists.
    pub fn start<E: Clone + Send + 'static>(&mut self, tasks: &mut TaskRegistry<E>, tick_event: E) {
        self.stop();
        self.task = Some(tasks.repeat(self.interval, tick_event));
    }

    /// Cancels the interval. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }

    /// Current rolling rate over the configured window.
    #[must_use]
    pub fn sample(&self, clicks: &[Instant], now: Instant) -> usize {
        rolling_count(clicks, now, self.window)
    }
}
