//! In-memory surface used by tests and headless runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Element, Style, Surface};

/// One call made against the surface, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEffect {
    /// `mount` with the element id
    Mount(String),
    /// `unmount` of a mounted element
    Unmount(String),
    /// `set_style` on a mounted element
    Style(String),
    /// `set_label` on a mounted element
    Label(String, String),
    /// `listen` on a mounted element
    Listen(String),
    /// `navigate` to a target
    Navigate(String),
    /// `reload`
    Reload,
}

/// A mounted element with its current presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedElement {
    /// The element as mounted, with the latest style applied
    pub element: Element,
    /// Latest label, if any was set
    pub label: Option<String>,
    /// Whether clicks are routed to the gate
    pub listening: bool,
}

/// Point-in-time copy of the recorded page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceSnapshot {
    /// Mounted elements keyed by id
    pub elements: BTreeMap<String, MountedElement>,
    /// Every effect applied since creation
    pub effects: Vec<SurfaceEffect>,
    /// Last navigation target
    pub navigated_to: Option<String>,
    /// Number of reloads
    pub reloads: usize,
}

impl SurfaceSnapshot {
    /// Ids of mounted elements in sorted order.
    #[must_use]
    pub fn mounted_ids(&self) -> Vec<&str> {
        self.elements.keys().map(String::as_str).collect()
    }

    /// Label of a mounted element.
    #[must_use]
    pub fn label(&self, id: &str) -> Option<&str> {
        self.elements.get(id).and_then(|e| e.label.as_deref())
    }

    /// Current style of a mounted element.
    #[must_use]
    pub fn style(&self, id: &str) -> Option<&Style> {
        self.elements.get(id).map(|e| &e.element.style)
    }
}

/// Surface that records its page model behind a shared handle.
///
/// Clones share the same page, so a test can hand one clone to the gate
/// and keep another for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    page: Arc<Mutex<SurfaceSnapshot>>,
}

impl RecordingSurface {
    /// Creates an empty page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current page model.
    #[must_use]
    pub fn snapshot(&self) -> SurfaceSnapshot {
        self.page().clone()
    }

    fn page(&self) -> MutexGuard<'_, SurfaceSnapshot> {
        // a panicking test thread must not hide the page from the others
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Surface for RecordingSurface {
    fn mount(&mut self, element: &Element) {
        let mut page = self.page();
        page.effects.push(SurfaceEffect::Mount(element.id.clone()));
        page.elements.insert(
            element.id.clone(),
            MountedElement {
                element: element.clone(),
                label: None,
                listening: false,
            },
        );
    }

    fn unmount(&mut self, id: &str) {
        let mut page = self.page();
        if page.elements.remove(id).is_some() {
            page.effects.push(SurfaceEffect::Unmount(id.to_string()));
        }
    }

    fn set_style(&mut self, id: &str, style: &Style) {
        let mut page = self.page();
        if let Some(mounted) = page.elements.get_mut(id) {
            mounted.element.style = style.clone();
            page.effects.push(SurfaceEffect::Style(id.to_string()));
        }
    }

    fn set_label(&mut self, id: &str, label: &str) {
        let mut page = self.page();
        if let Some(mounted) = page.elements.get_mut(id) {
            mounted.label = Some(label.to_string());
            page.effects
                .push(SurfaceEffect::Label(id.to_string(), label.to_string()));
        }
    }

    fn listen(&mut self, id: &str) {
        let mut page = self.page();
        if let Some(mounted) = page.elements.get_mut(id) {
            mounted.listening = true;
            page.effects.push(SurfaceEffect::Listen(id.to_string()));
        }
    }

    fn navigate(&mut self, target: &str) {
        let mut page = self.page();
        page.navigated_to = Some(target.to_string());
        page.effects.push(SurfaceEffect::Navigate(target.to_string()));
    }

    fn reload(&mut self) {
        let mut page = self.page();
        page.elements.clear();
        page.reloads += 1;
        page.effects.push(SurfaceEffect::Reload);
    }
}
