//! Configuration schema.
//!
//! Every section has defaults matching the stock challenge, so an empty
//! file (or no file at all) yields a working gate. Durations are written
//! as humantime strings such as `"3s"` or `"100ms"`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gate::stage::TimingWindow;
use crate::gate::zones::ZoneId;
use crate::surface::Corner;

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Timing windows for the three timed transitions
    pub windows: WindowsConfig,
    /// Burst phase settings
    pub burst: BurstConfig,
    /// Elapsed-time overlay settings
    pub overlay: OverlayConfig,
    /// Trigger zone placement
    pub zones: ZonesConfig,
    /// Verification endpoint
    pub activation: ActivationConfig,
    /// Live refresh collaborator
    pub refresh: RefreshConfig,
}

/// Windows for the stage 1→2, 2→3 and 3→4 clicks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowsConfig {
    /// Zone B click, measured from the zone A click
    pub first: TimingWindow,
    /// First zone C click, measured from the zone B click
    pub second: TimingWindow,
    /// Second (blind) zone C click, measured from the first one
    pub blind: TimingWindow,
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            first: TimingWindow::new(2000, 3500),
            second: TimingWindow::new(3000, 4500),
            blind: TimingWindow::new(2000, 3000),
        }
    }
}

/// Burst phase settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BurstConfig {
    /// Length of the counting window
    #[serde(with = "humantime_str")]
    pub duration: Duration,
    /// Minimum tally that passes
    pub threshold: usize,
    /// Cadence of the rolling-rate display
    #[serde(with = "humantime_str")]
    pub sample_interval: Duration,
    /// Span the rolling rate counts over
    #[serde(with = "humantime_str")]
    pub rate_window: Duration,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(3),
            threshold: 180,
            sample_interval: Duration::from_millis(100),
            rate_window: Duration::from_secs(1),
        }
    }
}

/// Elapsed-time overlay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    /// Refresh cadence of the readout
    #[serde(with = "humantime_str")]
    pub tick: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
        }
    }
}

/// Placement of a single trigger zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneGeometry {
    /// Corner the zone is pinned to
    pub anchor: Corner,
    /// Distance from the anchored edges, in pixels
    #[serde(default)]
    pub inset: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Placement of the three trigger zones and the START button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZonesConfig {
    /// First zone
    pub a: ZoneGeometry,
    /// Second zone
    pub b: ZoneGeometry,
    /// Blind zone, later the START button
    pub c: ZoneGeometry,
    /// Diameter of the START button, in pixels
    pub button_size: u32,
}

impl ZonesConfig {
    /// Geometry for the given zone.
    #[must_use]
    pub const fn geometry(&self, zone: ZoneId) -> ZoneGeometry {
        match zone {
            ZoneId::A => self.a,
            ZoneId::B => self.b,
            ZoneId::C => self.c,
        }
    }
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            a: ZoneGeometry {
                anchor: Corner::BottomRight,
                inset: 0,
                width: 40,
                height: 40,
            },
            b: ZoneGeometry {
                anchor: Corner::BottomLeft,
                inset: 0,
                width: 40,
                height: 40,
            },
            c: ZoneGeometry {
                anchor: Corner::TopLeft,
                inset: 0,
                width: 60,
                height: 60,
            },
            button_size: 80,
        }
    }
}

/// Verification endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivationConfig {
    /// Origin of the host page; relative targets resolve against it
    pub base_url: String,
    /// Path of the verification endpoint
    pub path: String,
    /// Upper bound for the whole request
    #[serde(with = "humantime_str")]
    pub timeout: Duration,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:12918".to_string(),
            path: "/_s_a_p_".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// One fragment the refresh collaborator re-fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FragmentSource {
    /// Path the fragment is served from
    pub path: String,
    /// Id of the container the fragment replaces
    pub container: String,
}

/// Live refresh collaborator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshConfig {
    /// Page whose metadata carries the CSRF token
    pub page_path: String,
    /// Server-sent events endpoint
    pub stream_path: String,
    /// Fragments fetched on every update signal
    pub fragments: Vec<FragmentSource>,
    /// Reconnect delay until the server advertises its own
    #[serde(with = "humantime_str")]
    pub retry: Duration,
    /// Fixed token; skips reading the page metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            page_path: "/".to_string(),
            stream_path: "/stream-updates".to_string(),
            fragments: vec![
                FragmentSource {
                    path: "/_get_server_list".to_string(),
                    container: "server-list".to_string(),
                },
                FragmentSource {
                    path: "/_get_downtime_table".to_string(),
                    container: "downtime-table".to_string(),
                },
            ],
            retry: Duration::from_secs(3),
            csrf_token: None,
        }
    }
}

/// Serde adapter for humantime duration strings.
mod humantime_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
