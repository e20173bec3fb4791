//! Attempt teardown.

use tracing::warn;

use super::overlay::TimerOverlay;
use super::sampler::ClickRateSampler;
use super::tasks::TaskRegistry;
use super::zones::TriggerZoneManager;
use crate::error::ChallengeError;
use crate::observability::metrics;
use crate::surface::Surface;

/// Tears an attempt down after any failure.
///
/// Every [`ChallengeError`] is handled the same way: all tasks are
/// cancelled, the overlay and the rate display are stopped, and the page is
/// reloaded. Rebuilding the session is left to the owner. Running a reset
/// twice leaves the page exactly as running it once.
#[derive(Debug, Default)]
pub struct ResetController {
    resets: u64,
}

impl ResetController {
    /// Creates a controller that has not reset anything yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { resets: 0 }
    }

    /// Number of resets performed.
    #[must_use]
    pub const fn resets(&self) -> u64 {
        self.resets
    }

    /// Cancels every task, removes the overlay, and reloads the page.
    pub fn tear_down<S, E>(
        &mut self,
        reason: &ChallengeError,
        surface: &mut S,
        tasks: &mut TaskRegistry<E>,
        overlay: &mut TimerOverlay,
        sampler: &mut ClickRateSampler,
        zones: &mut TriggerZoneManager,
    ) where
        S: Surface + ?Sized,
        E: Send + 'static,
    {
        warn!(
            reason = reason.kind(),
            shortfall = ?reason.shortfall(),
            error = %reason,
            "attempt failed, reloading"
        );

        tasks.cancel_all();
        overlay.stop(surface);
        sampler.stop();
        surface.reload();
        zones.forget();

        self.resets += 1;
        metrics::record_reset(reason.kind());
    }
}
