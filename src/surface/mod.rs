//! Rendering boundary for the challenge.
//!
//! The gate never touches a concrete page. Every visible effect goes
//! through the [`Surface`] trait, which a host implements on top of its
//! rendering layer. Two implementations ship with the crate:
//!
//! - [`RecordingSurface`] keeps an in-memory model of mounted elements and
//!   an effect log; tests inspect it through a shared handle.
//! - [`TerminalSurface`] renders effects as log lines for the interactive
//!   `run` command.

pub mod recording;
pub mod terminal;

use serde::{Deserialize, Serialize};

pub use recording::{RecordingSurface, SurfaceEffect, SurfaceSnapshot};
pub use terminal::TerminalSurface;

/// Viewport corner an element is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    /// Anchored to the top-left corner
    TopLeft,
    /// Anchored to the top-right corner
    TopRight,
    /// Anchored to the bottom-left corner
    BottomLeft,
    /// Anchored to the bottom-right corner
    BottomRight,
}

/// Outline of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    /// Plain rectangle
    #[default]
    Rect,
    /// Circle inscribed in the element box
    Circle,
}

/// What an element is, so a renderer can pick a base style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Clickable trigger region
    Zone,
    /// Floating elapsed-time readout
    Overlay,
}

/// Visual treatment of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Style {
    /// Corner the element is pinned to
    pub anchor: Corner,
    /// Distance from the anchored edges, in pixels
    pub inset: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Outline
    pub shape: Shape,
    /// Whether the element paints anything
    pub visible: bool,
}

/// An element the gate asks the surface to mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Stable element id
    pub id: String,
    /// Element role
    pub kind: ElementKind,
    /// Initial style
    pub style: Style,
}

/// Capability interface the gate renders through.
///
/// Implementations must tolerate redundant calls: unmounting an element
/// that is not mounted, or styling one that was already removed, is a
/// no-op rather than an error.
pub trait Surface: Send {
    /// Attaches an element to the page.
    fn mount(&mut self, element: &Element);

    /// Removes an element from the page.
    fn unmount(&mut self, id: &str);

    /// Replaces the style of a mounted element.
    fn set_style(&mut self, id: &str, style: &Style);

    /// Replaces the text shown by a mounted element.
    fn set_label(&mut self, id: &str, label: &str);

    /// Routes clicks on the element to the gate.
    fn listen(&mut self, id: &str);

    /// Leaves the page for `target`.
    fn navigate(&mut self, target: &str);

    /// Discards everything on the page, as a full reload would.
    fn reload(&mut self);
}
