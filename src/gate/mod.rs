//! The hidden challenge.
//!
//! A visitor proves intent by clicking three invisible zones inside strict
//! timing windows, pressing the START button that then appears, and
//! clicking it fast enough during a short burst. [`Gate`] wires the pieces
//! together around one event queue:
//!
//! - [`SequenceStateMachine`] decides what every click means.
//! - [`TriggerZoneManager`] keeps the right zone mounted.
//! - [`TimerOverlay`] shows the elapsed time between clicks.
//! - [`ClickRateSampler`] shows the rolling click rate during the burst.
//! - [`ResetController`] tears down a failed attempt.

pub mod controller;
pub mod machine;
pub mod overlay;
pub mod reset;
pub mod sampler;
pub mod session;
pub mod stage;
pub mod tasks;
pub mod zones;

pub use controller::{Gate, GateEvent, GateExit, TimerKind};
pub use machine::{EntryAction, Outcome, SequenceStateMachine, Transition};
pub use overlay::TimerOverlay;
pub use reset::ResetController;
pub use sampler::ClickRateSampler;
pub use session::{ClickBuffer, Session};
pub use stage::{Stage, TimingWindow};
pub use tasks::{TaskHandle, TaskRegistry};
pub use zones::{TriggerZoneManager, ZoneId, ZoneSkin};
