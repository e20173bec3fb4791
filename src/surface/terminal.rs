//! Surface that renders effects as log lines.

use std::collections::HashSet;

use tracing::{debug, info};

use super::{Element, Style, Surface};

/// Terminal rendition of the page used by `knockgate run`.
///
/// Invisible elements are only reported at debug level so that a casual
/// observer of the terminal sees as little as a casual visitor of the page.
#[derive(Debug, Default)]
pub struct TerminalSurface {
    visible: HashSet<String>,
    mounted: HashSet<String>,
}

impl TerminalSurface {
    /// Creates an empty terminal page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Surface for TerminalSurface {
    fn mount(&mut self, element: &Element) {
        self.mounted.insert(element.id.clone());
        if element.style.visible {
            self.visible.insert(element.id.clone());
            info!(id = %element.id, kind = ?element.kind, "shown");
        } else {
            debug!(id = %element.id, anchor = ?element.style.anchor, "mounted");
        }
    }

    fn unmount(&mut self, id: &str) {
        if self.mounted.remove(id) {
            let was_visible = self.visible.remove(id);
            debug!(id, was_visible, "unmounted");
        }
    }

    fn set_style(&mut self, id: &str, style: &Style) {
        if !self.mounted.contains(id) {
            return;
        }
        if style.visible {
            self.visible.insert(id.to_string());
            info!(id, shape = ?style.shape, size = style.width, "restyled");
        } else {
            self.visible.remove(id);
        }
    }

    fn set_label(&mut self, id: &str, label: &str) {
        if self.visible.contains(id) {
            info!(id, label, "label");
        }
    }

    fn listen(&mut self, id: &str) {
        debug!(id, "listening");
    }

    fn navigate(&mut self, target: &str) {
        info!(destination = target, "navigating");
    }

    fn reload(&mut self) {
        self.visible.clear();
        self.mounted.clear();
        debug!("page reloaded");
    }
}
