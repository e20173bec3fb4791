//! `KnockGate` - hidden click-sequence challenge gate
//!
//! A visitor unlocks a hidden area by clicking three invisible zones inside
//! strict timing windows and then clicking a START button fast enough. The
//! library provides the challenge engine, a rendering boundary, the
//! verification client and the live content refresh that runs beside it.

pub mod activation;
pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod observability;
pub mod refresh;
pub mod surface;
