//! The challenge state machine.
//!
//! [`SequenceStateMachine`] is a pure decision object. It owns the session,
//! validates each click against the current stage and timing window, and
//! answers with an [`Outcome`]. It never touches the surface or spawns
//! anything: a successful transition lists the [`EntryAction`]s its owner
//! must carry out.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::session::Session;
use super::stage::{Stage, TimingWindow, whole_millis};
use super::zones::{ZoneId, ZoneSkin};
use crate::config::schema::GateConfig;
use crate::error::ChallengeError;

/// Side effect to run on entering a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    /// Start (or restart) the elapsed-time overlay for this long
    StartOverlay(Duration),
    /// Remove the overlay
    StopOverlay,
    /// Unmount `from`, then mount `to`
    SwapZone {
        /// Zone leaving the page
        from: ZoneId,
        /// Zone joining the page
        to: ZoneId,
    },
    /// Apply a skin to a zone
    Restyle {
        /// Zone to restyle
        zone: ZoneId,
        /// Skin to apply
        skin: ZoneSkin,
    },
    /// Schedule the burst evaluation and start the rate display
    StartBurst {
        /// Time until the burst is evaluated
        duration: Duration,
    },
    /// Stop the rate display
    StopRateDisplay,
    /// Call the verification endpoint
    Activate,
}

/// A forward stage change and what it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Stage before the change
    pub from: Stage,
    /// Stage after the change
    pub to: Stage,
    /// Why the change happened
    pub reason: String,
    /// Effects to run, in order
    pub actions: Vec<EntryAction>,
}

/// Answer to a click or a burst evaluation.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Nothing changed
    Ignored(&'static str),
    /// A burst click was appended to the buffer
    Counted {
        /// Buffer length after the append
        tally: usize,
    },
    /// The stage moved forward
    Advanced(Transition),
    /// The attempt failed and must be reset
    Failed(ChallengeError),
}

/// Stage machine for one attempt.
#[derive(Debug)]
pub struct SequenceStateMachine {
    config: Arc<GateConfig>,
    session: Session,
}

impl SequenceStateMachine {
    /// Creates a machine with a fresh session.
    #[must_use]
    pub fn new(config: Arc<GateConfig>, generation: u64) -> Self {
        Self {
            config,
            session: Session::new(generation),
        }
    }

    /// The live session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.session.stage()
    }

    /// Discards the session and starts a fresh one at [`Stage::Idle`].
    pub fn restart(&mut self, generation: u64) {
        self.session = Session::new(generation);
    }

    /// Timing window the click leaving `stage` must land in, if any.
    #[must_use]
    pub fn window_for(&self, stage: Stage) -> Option<TimingWindow> {
        let windows = &self.config.windows;
        match stage {
            Stage::FirstClick => Some(windows.first),
            Stage::SecondClick => Some(windows.second),
            Stage::FirstBlind => Some(windows.blind),
            Stage::Idle | Stage::Armed | Stage::Burst | Stage::Success => None,
        }
    }

    /// Evaluates a click on `zone` at `now`.
    pub fn click(&mut self, zone: ZoneId, now: Instant) -> Outcome {
        let stage = self.session.stage();
        let Some(expected) = stage.expected_zone() else {
            return Outcome::Ignored("challenge already complete");
        };
        if zone != expected {
            return Outcome::Ignored("zone is not mounted at this stage");
        }

        if let Some(window) = self.window_for(stage) {
            let elapsed_ms = self
                .session
                .last_accepted()
                .map_or(0, |last| whole_millis(now.saturating_duration_since(last)));
            if !window.contains(elapsed_ms) {
                return Outcome::Failed(ChallengeError::TimingViolation {
                    stage,
                    elapsed_ms,
                    window,
                });
            }
        }

        let windows = &self.config.windows;
        let (to, actions) = match stage {
            Stage::Idle => (
                Stage::FirstClick,
                vec![
                    EntryAction::StartOverlay(windows.first.max_duration()),
                    EntryAction::SwapZone {
                        from: ZoneId::A,
                        to: ZoneId::B,
                    },
                ],
            ),
            Stage::FirstClick => (
                Stage::SecondClick,
                vec![
                    EntryAction::StartOverlay(windows.second.max_duration()),
                    EntryAction::SwapZone {
                        from: ZoneId::B,
                        to: ZoneId::C,
                    },
                ],
            ),
            Stage::SecondClick => (
                Stage::FirstBlind,
                vec![EntryAction::StartOverlay(windows.blind.max_duration())],
            ),
            Stage::FirstBlind => (
                Stage::Armed,
                vec![
                    EntryAction::StopOverlay,
                    EntryAction::Restyle {
                        zone: ZoneId::C,
                        skin: ZoneSkin::StartButton,
                    },
                ],
            ),
            Stage::Armed => {
                let duration = self.config.burst.duration;
                self.session.open_burst(now);
                return Outcome::Advanced(Transition {
                    from: stage,
                    to: Stage::Burst,
                    reason: "start button pressed".to_string(),
                    actions: vec![
                        EntryAction::StartOverlay(duration),
                        EntryAction::StartBurst { duration },
                    ],
                });
            }
            Stage::Burst => {
                self.session.record_click(now);
                return Outcome::Counted {
                    tally: self.session.clicks().len(),
                };
            }
            Stage::Success => return Outcome::Ignored("challenge already complete"),
        };

        let reason = self.window_for(stage).map_or_else(
            || format!("zone {zone} clicked"),
            |window| format!("zone {zone} clicked inside {window}"),
        );
        self.session.advance(to, now);
        Outcome::Advanced(Transition {
            from: stage,
            to,
            reason,
            actions,
        })
    }

    /// Evaluates the burst once its window has closed.
    ///
    /// Does nothing unless the session is still in [`Stage::Burst`].
    pub fn evaluate_burst(&mut self) -> Outcome {
        if self.session.stage() != Stage::Burst {
            return Outcome::Ignored("burst is not running");
        }

        let tally = self.session.clicks().len();
        let required = self.config.burst.threshold;
        if tally < required {
            return Outcome::Failed(ChallengeError::InsufficientRate { tally, required });
        }

        self.session.succeed();
        Outcome::Advanced(Transition {
            from: Stage::Burst,
            to: Stage::Success,
            reason: format!("burst tally {tally} reached threshold {required}"),
            actions: vec![
                EntryAction::StopOverlay,
                EntryAction::StopRateDisplay,
                EntryAction::Restyle {
                    zone: ZoneId::C,
                    skin: ZoneSkin::Success,
                },
                EntryAction::Activate,
            ],
        })
    }
}
