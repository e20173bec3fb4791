//! Trigger zones and the manager that keeps one of them mounted.

use serde::{Deserialize, Serialize};

use crate::config::schema::ZonesConfig;
use crate::surface::{Element, ElementKind, Shape, Style, Surface};

/// Label shown on zone C once the challenge is armed.
pub const START_LABEL: &str = "START";

/// Label shown on zone C after the burst passes.
pub const SUCCESS_LABEL: &str = "\u{2713}";

/// Identifier of one of the three trigger zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneId {
    /// First zone, bottom-right
    A,
    /// Second zone, bottom-left
    B,
    /// Blind zone, top-left; becomes the START button
    C,
}

impl ZoneId {
    /// Stable element id used on the surface.
    #[must_use]
    pub const fn element_id(self) -> &'static str {
        match self {
            Self::A => "knock-zone-a",
            Self::B => "knock-zone-b",
            Self::C => "knock-zone-c",
        }
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ZoneId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            "c" => Ok(Self::C),
            other => Err(format!("unknown zone '{other}' (expected a, b or c)")),
        }
    }
}

/// Visual treatment of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSkin {
    /// Invisible hit region
    Hidden,
    /// Visible round button reading `START`
    StartButton,
    /// Visible round button marking success
    Success,
}

/// Keeps exactly one zone mounted and applies zone styling.
#[derive(Debug, Clone)]
pub struct TriggerZoneManager {
    layout: ZonesConfig,
    mounted: Option<ZoneId>,
}

impl TriggerZoneManager {
    /// Creates a manager with nothing mounted.
    #[must_use]
    pub const fn new(layout: ZonesConfig) -> Self {
        Self {
            layout,
            mounted: None,
        }
    }

    /// The zone currently attached to the page.
    #[must_use]
    pub const fn mounted(&self) -> Option<ZoneId> {
        self.mounted
    }

    /// Mounts `zone` hidden and routes its clicks to the gate.
    ///
    /// Any other mounted zone is removed first.
    pub fn mount<S: Surface + ?Sized>(&mut self, surface: &mut S, zone: ZoneId) {
        if let Some(previous) = self.mounted {
            if previous == zone {
                return;
            }
            self.unmount(surface, previous);
        }

        surface.mount(&Element {
            id: zone.element_id().to_string(),
            kind: ElementKind::Zone,
            style: self.style_for(zone, ZoneSkin::Hidden),
        });
        surface.listen(zone.element_id());
        self.mounted = Some(zone);
    }

    /// Removes `zone` from the page if it is mounted.
    pub fn unmount<S: Surface + ?Sized>(&mut self, surface: &mut S, zone: ZoneId) {
        if self.mounted == Some(zone) {
            surface.unmount(zone.element_id());
            self.mounted = None;
        }
    }

    /// Forgets the mounted zone without touching the page.
    ///
    /// Only valid after the page itself was cleared by a reload.
    pub(super) fn forget(&mut self) {
        self.mounted = None;
    }

    /// Replaces `from` with `to`.
    pub fn swap<S: Surface + ?Sized>(&mut self, surface: &mut S, from: ZoneId, to: ZoneId) {
        self.unmount(surface, from);
        self.mount(surface, to);
    }

    /// Applies a skin to a mounted zone, including its label.
    pub fn restyle<S: Surface + ?Sized>(&self, surface: &mut S, zone: ZoneId, skin: ZoneSkin) {
        if self.mounted != Some(zone) {
            return;
        }
        let id = zone.element_id();
        surface.set_style(id, &self.style_for(zone, skin));
        match skin {
            ZoneSkin::Hidden => {}
            ZoneSkin::StartButton => surface.set_label(id, START_LABEL),
            ZoneSkin::Success => surface.set_label(id, SUCCESS_LABEL),
        }
    }

    /// Sets the text of a mounted zone.
    pub fn set_label<S: Surface + ?Sized>(&self, surface: &mut S, zone: ZoneId, label: &str) {
        if self.mounted == Some(zone) {
            surface.set_label(zone.element_id(), label);
        }
    }

    /// Style for a zone under a given skin.
    #[must_use]
    pub const fn style_for(&self, zone: ZoneId, skin: ZoneSkin) -> Style {
        let geometry = self.layout.geometry(zone);
        match skin {
            ZoneSkin::Hidden => Style {
                anchor: geometry.anchor,
                inset: geometry.inset,
                width: geometry.width,
                height: geometry.height,
                shape: Shape::Rect,
                visible: false,
            },
            ZoneSkin::StartButton | ZoneSkin::Success => Style {
                anchor: geometry.anchor,
                inset: geometry.inset,
                width: self.layout.button_size,
                height: self.layout.button_size,
                shape: Shape::Circle,
                visible: true,
            },
        }
    }
}
