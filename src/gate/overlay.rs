//! Floating elapsed-time readout.
//!
//! At most one overlay exists at a time. Starting a new one replaces the
//! old one, and the readout removes itself once its duration has elapsed.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::tasks::{TaskHandle, TaskRegistry};
use crate::surface::{Corner, Element, ElementKind, Shape, Style, Surface};

/// Element id of the readout.
pub const OVERLAY_ID: &str = "knock-timer";

const OVERLAY_STYLE: Style = Style {
    anchor: Corner::TopRight,
    inset: 8,
    width: 64,
    height: 24,
    shape: Shape::Rect,
    visible: true,
};

#[derive(Debug)]
struct ActiveOverlay {
    started_at: Instant,
    duration: Duration,
    task: TaskHandle,
}

/// The elapsed-time overlay.
#[derive(Debug)]
pub struct TimerOverlay {
    active: Option<ActiveOverlay>,
    tick: Duration,
}

impl TimerOverlay {
    /// Creates an idle overlay refreshing every `tick` once started.
    #[must_use]
    pub const fn new(tick: Duration) -> Self {
        Self { active: None, tick }
    }

    /// Whether the readout is on the page.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Mounts the readout and starts the repeating update.
    ///
    /// `tick_event` is posted every tick; the owner answers it by calling
    /// [`TimerOverlay::tick`].
    pub fn start<S, E>(
        &mut self,
        surface: &mut S,
        tasks: &mut TaskRegistry<E>,
        duration: Duration,
        now: Instant,
        tick_event: E,
    ) where
        S: Surface + ?Sized,
        E: Clone + Send + 'static,
    {
        self.stop(surface);

        surface.mount(&Element {
            id: OVERLAY_ID.to_string(),
            kind: ElementKind::Overlay,
            style: OVERLAY_STYLE,
        });
        surface.set_label(OVERLAY_ID, &format_elapsed(Duration::ZERO));

        let task = tasks.repeat(self.tick, tick_event);
        self.active = Some(ActiveOverlay {
            started_at: now,
            duration,
            task,
        });
    }

    /// Refreshes the readout, removing it once the duration has elapsed.
    pub fn tick<S: Surface + ?Sized>(&mut self, surface: &mut S, now: Instant) {
        let Some(active) = &self.active else {
            return;
        };

        let elapsed = now.saturating_duration_since(active.started_at);
        if elapsed >= active.duration {
            trace!(elapsed_ms = elapsed.as_millis(), "overlay expired");
            self.stop(surface);
            return;
        }
        surface.set_label(OVERLAY_ID, &format_elapsed(elapsed));
    }

    /// Cancels the update and removes the readout. Idempotent.
    pub fn stop<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        if let Some(active) = self.active.take() {
            active.task.cancel();
            surface.unmount(OVERLAY_ID);
        }
    }
}

/// Elapsed seconds with one decimal, e.g. `"2.4"`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    // truncate to tenths so the readout never runs ahead of the clock
    let tenths = elapsed.as_millis() / 100;
    format!("{}.{}", tenths / 10, tenths % 10)
}
