//! Per-attempt session state.
//!
//! A session lives for exactly one attempt. The stage, the last accepted
//! timestamp and the click buffer are mutated only by the state machine;
//! everything else reads them through the accessors here.

use tokio::time::Instant;
use uuid::Uuid;

use super::stage::Stage;

/// Timestamps of clicks collected during the burst window.
///
/// Append-only while the burst runs. Cleared once, on entry to
/// [`Stage::Burst`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickBuffer(Vec<Instant>);

impl ClickBuffer {
    /// Number of recorded clicks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no click has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Recorded timestamps in arrival order.
    #[must_use]
    pub fn as_slice(&self) -> &[Instant] {
        &self.0
    }

    pub(super) fn push(&mut self, at: Instant) {
        self.0.push(at);
    }

    pub(super) fn clear(&mut self) {
        self.0.clear();
    }
}

/// State of one attempt.
#[derive(Debug, Clone)]
pub struct Session {
    generation: u64,
    attempt_id: Uuid,
    stage: Stage,
    last_accepted: Option<Instant>,
    clicks: ClickBuffer,
    burst_started_at: Option<Instant>,
}

impl Session {
    /// Starts a fresh attempt at [`Stage::Idle`].
    #[must_use]
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            attempt_id: Uuid::new_v4(),
            stage: Stage::Idle,
            last_accepted: None,
            clicks: ClickBuffer::default(),
            burst_started_at: None,
        }
    }

    /// Attempt generation; timer events from older generations are stale.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Random id for correlating the log lines of one attempt.
    #[must_use]
    pub const fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Instant of the last accepted transition-causing click.
    #[must_use]
    pub const fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }

    /// Clicks recorded during the burst.
    #[must_use]
    pub const fn clicks(&self) -> &ClickBuffer {
        &self.clicks
    }

    /// Instant the burst window opened.
    #[must_use]
    pub const fn burst_started_at(&self) -> Option<Instant> {
        self.burst_started_at
    }

    /// Whether this session is indistinguishable from a freshly booted one.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.stage == Stage::Idle
            && self.last_accepted.is_none()
            && self.clicks.is_empty()
            && self.burst_started_at.is_none()
    }

    /// Moves forward to `next`, stamping the click that caused it.
    pub(super) fn advance(&mut self, next: Stage, at: Instant) {
        debug_assert!(next > self.stage, "stages only move forward");
        self.stage = next;
        self.last_accepted = Some(at);
    }

    /// Enters the burst: clears the buffer and opens the window.
    pub(super) fn open_burst(&mut self, at: Instant) {
        self.advance(Stage::Burst, at);
        self.clicks.clear();
        self.burst_started_at = Some(at);
    }

    pub(super) fn record_click(&mut self, at: Instant) {
        self.clicks.push(at);
    }

    pub(super) fn succeed(&mut self) {
        debug_assert!(self.stage == Stage::Burst);
        self.stage = Stage::Success;
    }
}
