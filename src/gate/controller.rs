//! The gate event loop.
//!
//! [`Gate`] owns the session and every component around it, and processes
//! one [`GateEvent`] at a time from a single queue. Clicks come from the
//! host; timer ticks, the burst deadline and the verification result come
//! from tasks started through the [`TaskRegistry`]. Those tasks only post
//! events, so all state changes happen on the gate's own turn.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::machine::{EntryAction, Outcome, SequenceStateMachine, Transition};
use super::overlay::TimerOverlay;
use super::reset::ResetController;
use super::sampler::ClickRateSampler;
use super::session::Session;
use super::stage::Stage;
use super::tasks::TaskRegistry;
use super::zones::{TriggerZoneManager, ZoneId};
use crate::activation::Activator;
use crate::config::schema::GateConfig;
use crate::error::{ActivationError, ChallengeError};
use crate::observability::metrics;
use crate::surface::Surface;

/// Which timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Overlay readout refresh
    OverlayTick,
    /// Rolling rate display refresh
    RateTick,
    /// Burst window closed
    BurstDeadline,
}

/// Input to the gate.
#[derive(Debug, Clone)]
pub enum GateEvent {
    /// A click on a trigger zone
    Click(ZoneId),
    /// A timer fired; stale generations are dropped
    Timer {
        /// Attempt that started the timer
        generation: u64,
        /// Timer that fired
        kind: TimerKind,
    },
    /// The verification call finished
    Activation {
        /// Attempt that made the call
        generation: u64,
        /// Navigation target or the failure
        result: Result<String, ActivationError>,
    },
}

/// Why [`Gate::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateExit {
    /// The challenge passed and the surface navigated away
    Navigated(String),
    /// Shutdown was requested
    Cancelled,
}

/// The challenge controller.
pub struct Gate<S: Surface> {
    machine: SequenceStateMachine,
    surface: S,
    zones: TriggerZoneManager,
    overlay: TimerOverlay,
    sampler: ClickRateSampler,
    resets: ResetController,
    activator: Arc<dyn Activator>,
    tasks: TaskRegistry<GateEvent>,
    events_tx: mpsc::UnboundedSender<GateEvent>,
    events_rx: mpsc::UnboundedReceiver<GateEvent>,
    navigated: Option<String>,
}

impl<S: Surface> std::fmt::Debug for Gate<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("session", self.machine.session())
            .field("mounted", &self.zones.mounted())
            .field("overlay_active", &self.overlay.is_active())
            .field("navigated", &self.navigated)
            .finish_non_exhaustive()
    }
}

impl<S: Surface> Gate<S> {
    /// Creates a gate and mounts zone A on `surface`.
    pub fn new(config: Arc<GateConfig>, surface: S, activator: Arc<dyn Activator>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut gate = Self {
            machine: SequenceStateMachine::new(Arc::clone(&config), 0),
            zones: TriggerZoneManager::new(config.zones.clone()),
            overlay: TimerOverlay::new(config.overlay.tick),
            sampler: ClickRateSampler::new(config.burst.rate_window, config.burst.sample_interval),
            resets: ResetController::new(),
            tasks: TaskRegistry::new(events_tx.clone()),
            surface,
            activator,
            events_tx,
            events_rx,
            navigated: None,
        };
        gate.boot(1);
        gate
    }

    /// Sender for posting clicks from outside the gate.
    #[must_use]
    pub fn sender(&self) -> mpsc::UnboundedSender<GateEvent> {
        self.events_tx.clone()
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.machine.stage()
    }

    /// The live session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        self.machine.session()
    }

    /// Current attempt generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.machine.session().generation()
    }

    /// The rendering surface.
    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// Zone currently mounted.
    #[must_use]
    pub const fn mounted_zone(&self) -> Option<ZoneId> {
        self.zones.mounted()
    }

    /// Whether the overlay is on the page.
    #[must_use]
    pub const fn overlay_active(&self) -> bool {
        self.overlay.is_active()
    }

    /// Whether the rate display is running.
    #[must_use]
    pub const fn rate_display_active(&self) -> bool {
        self.sampler.is_active()
    }

    /// Number of timers and calls still able to post an event.
    pub fn active_tasks(&mut self) -> usize {
        self.tasks.active()
    }

    /// Number of resets since the gate was created.
    #[must_use]
    pub const fn resets(&self) -> u64 {
        self.resets.resets()
    }

    /// Navigation target, once the challenge has passed.
    #[must_use]
    pub fn navigated(&self) -> Option<&str> {
        self.navigated.as_deref()
    }

    /// Handles a click on `zone` right now.
    pub fn click(&mut self, zone: ZoneId) {
        self.click_at(zone, Instant::now());
    }

    /// Handles a click on `zone` at `now`.
    pub fn click_at(&mut self, zone: ZoneId, now: Instant) {
        let outcome = self.machine.click(zone, now);
        self.apply(outcome, now);
    }

    /// Handles one event.
    pub fn handle(&mut self, event: GateEvent) {
        let now = Instant::now();
        match event {
            GateEvent::Click(zone) => self.click_at(zone, now),
            GateEvent::Timer { generation, kind } => {
                if generation != self.generation() {
                    trace!(generation, ?kind, "stale timer dropped");
                    return;
                }
                self.on_timer(kind, now);
            }
            GateEvent::Activation { generation, result } => {
                if generation != self.generation() || self.stage() != Stage::Success {
                    debug!(generation, "stale verification result dropped");
                    return;
                }
                self.on_activation(result);
            }
        }
    }

    /// Handles every event already queued, without waiting.
    ///
    /// Returns the number of events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Processes events until the challenge navigates away or `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) -> GateExit {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.tasks.cancel_all();
                    return GateExit::Cancelled;
                }
                event = self.events_rx.recv() => {
                    // the gate holds a sender, so the queue never closes
                    let Some(event) = event else {
                        return GateExit::Cancelled;
                    };
                    self.handle(event);
                    if let Some(target) = self.navigated.take() {
                        return GateExit::Navigated(target);
                    }
                }
            }
        }
    }

    /// Tears the attempt down and starts a fresh one.
    pub fn reset(&mut self, reason: &ChallengeError) {
        self.resets.tear_down(
            reason,
            &mut self.surface,
            &mut self.tasks,
            &mut self.overlay,
            &mut self.sampler,
            &mut self.zones,
        );
        let next = self.generation() + 1;
        self.boot(next);
    }

    fn boot(&mut self, generation: u64) {
        self.machine.restart(generation);
        self.zones.mount(&mut self.surface, ZoneId::A);
        metrics::set_current_stage(Stage::Idle);
        info!(
            generation,
            attempt = %self.machine.session().attempt_id(),
            "challenge ready"
        );
    }

    fn apply(&mut self, outcome: Outcome, now: Instant) {
        match outcome {
            Outcome::Ignored(why) => {
                debug!(stage = %self.stage(), why, "input ignored");
            }
            Outcome::Counted { tally } => {
                trace!(tally, "burst click counted");
            }
            Outcome::Advanced(transition) => self.enter(transition, now),
            Outcome::Failed(err) => self.reset(&err),
        }
    }

    fn enter(&mut self, transition: Transition, now: Instant) {
        info!(
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            attempt = %self.machine.session().attempt_id(),
            "stage advanced"
        );
        metrics::record_stage_transition(transition.to);

        for action in transition.actions {
            self.run_action(action, now);
        }
    }

    fn run_action(&mut self, action: EntryAction, now: Instant) {
        let generation = self.generation();
        match action {
            EntryAction::StartOverlay(duration) => self.overlay.start(
                &mut self.surface,
                &mut self.tasks,
                duration,
                now,
                GateEvent::Timer {
                    generation,
                    kind: TimerKind::OverlayTick,
                },
            ),
            EntryAction::StopOverlay => self.overlay.stop(&mut self.surface),
            EntryAction::SwapZone { from, to } => self.zones.swap(&mut self.surface, from, to),
            EntryAction::Restyle { zone, skin } => {
                self.zones.restyle(&mut self.surface, zone, skin);
            }
            EntryAction::StartBurst { duration } => {
                self.tasks.schedule(
                    duration,
                    GateEvent::Timer {
                        generation,
                        kind: TimerKind::BurstDeadline,
                    },
                );
                self.sampler.start(
                    &mut self.tasks,
                    GateEvent::Timer {
                        generation,
                        kind: TimerKind::RateTick,
                    },
                );
            }
            EntryAction::StopRateDisplay => self.sampler.stop(),
            EntryAction::Activate => {
                let activator = Arc::clone(&self.activator);
                self.tasks.spawn(async move {
                    GateEvent::Activation {
                        generation,
                        result: activator.activate().await,
                    }
                });
            }
        }
    }

    fn on_timer(&mut self, kind: TimerKind, now: Instant) {
        match kind {
            TimerKind::OverlayTick => self.overlay.tick(&mut self.surface, now),
            TimerKind::RateTick => {
                if self.stage() != Stage::Burst {
                    return;
                }
                let rate = self
                    .sampler
                    .sample(self.machine.session().clicks().as_slice(), now);
                self.zones
                    .set_label(&mut self.surface, ZoneId::C, &rate.to_string());
            }
            TimerKind::BurstDeadline => {
                if self.stage() == Stage::Burst {
                    metrics::record_burst_tally(self.machine.session().clicks().len());
                }
                let outcome = self.machine.evaluate_burst();
                self.apply(outcome, now);
            }
        }
    }

    fn on_activation(&mut self, result: Result<String, ActivationError>) {
        match result {
            Ok(target) => {
                metrics::record_activation(true);
                info!(
                    attempt = %self.machine.session().attempt_id(),
                    destination = %target,
                    "challenge passed"
                );
                self.tasks.cancel_all();
                self.surface.navigate(&target);
                self.navigated = Some(target);
            }
            Err(err) => {
                metrics::record_activation(false);
                self.reset(&ChallengeError::CommunicationFailure(err));
            }
        }
    }
}
