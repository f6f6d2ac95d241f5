//! Node popup overlay.
//!
//! One popup exists per page and is shared by every graph view on it. It is
//! created on first use and hidden, never destroyed, between uses. Dismissal:
//! - Escape
//! - its close control
//! - any click outside it, except the click that opened it
//!
//! The opening click reaches the document after the graph handled it, so the
//! first outside click within `CLICK_SUPPRESSION` of `show` is swallowed.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::model::GraphNode;
use crate::markdown::html_escape;

/// Distance between the pointer and the popup corner.
pub const POPUP_OFFSET: f64 = 12.0;
/// Minimum gap kept between the popup and the viewport edges.
pub const VIEWPORT_MARGIN: f64 = 8.0;
pub const CLICK_SUPPRESSION: Duration = Duration::from_millis(300);

pub type SharedPopup = Rc<RefCell<NodePopup>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopupSize {
    pub width: f64,
    pub height: f64,
}

impl Default for PopupSize {
    fn default() -> Self {
        Self {
            width: 280.0,
            height: 200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopupPosition {
    pub left: f64,
    pub top: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupContent {
    pub node_id: String,
    pub title: String,
    pub badge: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub details_url: Option<String>,
}

impl PopupContent {
    pub fn for_node(node: &GraphNode) -> Self {
        let kind = node.kind.map(|k| k.display_prefix().to_string());
        let badge = match (kind, node.measurement.as_deref().filter(|m| !m.is_empty())) {
            (Some(kind), Some(m)) => Some(format!("{} · {}", kind, m)),
            (Some(kind), None) => Some(kind),
            (None, Some(m)) => Some(m.to_string()),
            (None, None) => None,
        };
        Self {
            node_id: node.id.clone(),
            title: node.label.clone(),
            badge,
            description: node.description.clone().filter(|d| !d.is_empty()),
            thumbnail: node.thumbnail.clone(),
            details_url: node.url.clone(),
        }
    }
}

/// A click that reached the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentClick {
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: u64,
    /// Whether the click landed inside the popup element.
    pub inside_popup: bool,
}

#[derive(Debug, Default)]
pub struct NodePopup {
    viewport: Viewport,
    size: PopupSize,
    content: Option<PopupContent>,
    position: Option<PopupPosition>,
    visible: bool,
    /// Timestamp of the opening click, until one document click consumes it.
    suppress_from: Option<u64>,
    /// Bumped on every `show`, so a view can tell whether it still owns the popup.
    generation: u64,
}

impl NodePopup {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            ..Default::default()
        }
    }

    pub fn shared(viewport: Viewport) -> SharedPopup {
        Rc::new(RefCell::new(Self::new(viewport)))
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn set_size(&mut self, size: PopupSize) {
        self.size = size;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn content(&self) -> Option<&PopupContent> {
        self.content.as_ref()
    }

    pub fn position(&self) -> Option<PopupPosition> {
        self.position
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fills the popup from `node` and places it near `(x, y)`. Returns the
    /// generation identifying this opening.
    pub fn show(&mut self, node: &GraphNode, x: f64, y: f64, opened_at_ms: u64) -> u64 {
        self.content = Some(PopupContent::for_node(node));
        self.position = Some(self.place(x, y));
        self.visible = true;
        self.suppress_from = Some(opened_at_ms);
        self.generation += 1;
        debug!(node = %node.id, x, y, "popup shown");
        self.generation
    }

    /// Hides the popup. Content is kept for the next `show`.
    pub fn hide(&mut self) {
        if self.visible {
            debug!("popup hidden");
        }
        self.visible = false;
        self.suppress_from = None;
    }

    /// Returns true if the key dismissed the popup.
    pub fn handle_key(&mut self, key: &str) -> bool {
        if key == "Escape" && self.visible {
            self.hide();
            return true;
        }
        false
    }

    pub fn handle_close_click(&mut self) {
        self.hide();
    }

    /// Routes a document-level click. Returns true if it dismissed the popup.
    pub fn handle_document_click(&mut self, click: DocumentClick) -> bool {
        if !self.visible {
            return false;
        }
        if let Some(opened_at) = self.suppress_from.take() {
            let window = CLICK_SUPPRESSION.as_millis() as u64;
            if click.timestamp_ms.saturating_sub(opened_at) <= window {
                debug!("ignoring the click that opened the popup");
                return false;
            }
        }
        if click.inside_popup {
            return false;
        }
        self.hide();
        true
    }

    /// Places the popup at the pointer plus offset, flipped to the left of the
    /// pointer when it would overflow the right edge, and clamped to the
    /// viewport margins.
    fn place(&self, x: f64, y: f64) -> PopupPosition {
        let (vw, vh) = (self.viewport.width, self.viewport.height);
        let (w, h) = (self.size.width, self.size.height);

        let mut left = x + POPUP_OFFSET;
        if left + w > vw - VIEWPORT_MARGIN {
            left = x - POPUP_OFFSET - w;
        }
        left = left.max(VIEWPORT_MARGIN);

        let mut top = y + POPUP_OFFSET;
        top = top.min(vh - h - VIEWPORT_MARGIN);
        top = top.max(VIEWPORT_MARGIN);

        PopupPosition { left, top }
    }

    pub fn render_html(&self) -> String {
        let mut html = String::from(r#"<div class="node-popup""#);
        if let Some(pos) = self.position {
            html.push_str(&format!(r#" style="left: {}px; top: {}px;""#, pos.left, pos.top));
        }
        if !self.visible {
            html.push_str(" hidden");
        }
        html.push('>');
        html.push_str(r#"<button type="button" class="node-popup-close" aria-label="Close">&times;</button>"#);

        if let Some(content) = &self.content {
            html.push_str(&format!(
                r#"<h3 class="node-popup-title">{}</h3>"#,
                html_escape(&content.title)
            ));
            if let Some(badge) = &content.badge {
                html.push_str(&format!(
                    r#"<span class="node-popup-badge">{}</span>"#,
                    html_escape(badge)
                ));
            }
            if let Some(description) = &content.description {
                html.push_str(&format!(
                    r#"<p class="node-popup-description">{}</p>"#,
                    html_escape(description)
                ));
            }
            if let Some(thumbnail) = &content.thumbnail {
                html.push_str(&format!(
                    r#"<img class="node-popup-thumbnail" src="{}" alt="{}">"#,
                    html_escape(thumbnail),
                    html_escape(&content.title)
                ));
            }
            if let Some(url) = &content.details_url {
                html.push_str(&format!(
                    r#"<a class="node-popup-link" href="{}">View details</a>"#,
                    html_escape(url)
                ));
            }
        }
        html.push_str("</div>");
        html
    }
}
