//! Graph view: resolved styling, layout toggles and the pointer protocol.
//!
//! States are `Idle`, `NodeHovered`, `PopupOpen` and `Navigating`. Once a
//! tap starts navigation the view ignores further input, since the page is
//! about to be replaced.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::layout::{Layout, LayoutEngine, LayoutRequest, Size};
use super::model::{GraphEdge, GraphModel, GraphNode};
use super::style::{
    EdgeStyle, LayoutSpacing, NodeStyle, NodeStyler, StylePatch, ZoomRange, DIMMED_OPACITY,
    SELECTED_COLOR,
};
use crate::models::EntityKind;
use crate::popup::SharedPopup;

/// Duration of the animated transition after a layout toggle.
pub const LAYOUT_ANIMATION: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutDirection {
    #[default]
    LR,
    TB,
}

impl LayoutDirection {
    pub fn toggled(self) -> Self {
        match self {
            LayoutDirection::LR => LayoutDirection::TB,
            LayoutDirection::TB => LayoutDirection::LR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutDirection::LR => "LR",
            LayoutDirection::TB => "TB",
        }
    }
}

impl fmt::Display for LayoutDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        meta: false,
        shift: false,
        alt: false,
    };

    /// Ctrl or Cmd held: navigate even when popups are enabled.
    pub fn forces_navigation(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    Node(String),
    Canvas,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub target: PointerTarget,
    /// Viewport coordinates.
    pub x: f64,
    pub y: f64,
    pub modifiers: Modifiers,
    pub timestamp_ms: u64,
}

impl PointerEvent {
    pub fn on_node(id: &str, x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self {
            target: PointerTarget::Node(id.to_string()),
            x,
            y,
            modifiers: Modifiers::NONE,
            timestamp_ms,
        }
    }

    pub fn on_canvas(x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self {
            target: PointerTarget::Canvas,
            x,
            y,
            modifiers: Modifiers::NONE,
            timestamp_ms,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    NodeHovered(String),
    PopupOpen(String),
    Navigating(String),
}

/// What the host must do after a tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEffect {
    None,
    /// Replace the page with `url`.
    Navigate { url: String },
    PopupOpened { node_id: String },
    PopupClosed,
}

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub id: String,
    pub label: String,
    pub kind: Option<EntityKind>,
    pub url: Option<String>,
    pub is_center: bool,
    pub style: NodeStyle,
    pub x: f64,
    pub y: f64,
}

/// Everything a drawing engine needs to render the view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub flavor: &'static str,
    pub direction: LayoutDirection,
    pub thumbnails_visible: bool,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<GraphEdge>,
    pub edge_style: EdgeStyle,
    pub spacing: LayoutSpacing,
    pub zoom: ZoomRange,
    pub animation_ms: Option<u64>,
    pub cursor: Cursor,
}

// ============================================================================
// Graph View
// ============================================================================

pub struct GraphView {
    model: GraphModel,
    styler: Box<dyn NodeStyler>,
    engine: Box<dyn LayoutEngine>,
    direction: LayoutDirection,
    thumbnails_visible: bool,
    /// Per-node overrides on top of the stylesheet.
    overrides: HashMap<String, StylePatch>,
    selected: Option<String>,
    state: InteractionState,
    cursor: Cursor,
    layout: Layout,
    popup: Option<SharedPopup>,
    /// Popup generation this view opened, while it may still be showing.
    popup_generation: Option<u64>,
}

impl GraphView {
    /// Builds the view and runs the initial layout. With a popup, plain taps
    /// open it instead of navigating.
    pub fn new(
        model: GraphModel,
        styler: Box<dyn NodeStyler>,
        engine: Box<dyn LayoutEngine>,
        popup: Option<SharedPopup>,
    ) -> Self {
        let mut view = Self {
            layout: Layout {
                direction: LayoutDirection::default(),
                positions: Vec::new(),
                animation_ms: None,
            },
            model,
            styler,
            engine,
            direction: LayoutDirection::default(),
            thumbnails_visible: true,
            overrides: HashMap::new(),
            selected: None,
            state: InteractionState::Idle,
            cursor: Cursor::Default,
            popup,
            popup_generation: None,
        };
        view.run_layout(None);
        info!(
            flavor = view.styler.name(),
            nodes = view.model.nodes.len(),
            edges = view.model.edges.len(),
            "graph view created"
        );
        view
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn direction(&self) -> LayoutDirection {
        self.direction
    }

    pub fn thumbnails_visible(&self) -> bool {
        self.thumbnails_visible
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn state(&self) -> InteractionState {
        match &self.state {
            InteractionState::PopupOpen(_) if !self.owns_visible_popup() => InteractionState::Idle,
            state => state.clone(),
        }
    }

    /// Resolved style of one node.
    pub fn node_style(&self, id: &str) -> Option<NodeStyle> {
        let node = self.model.node(id)?;
        Some(self.resolve(node))
    }

    fn resolve(&self, node: &GraphNode) -> NodeStyle {
        let selected = self.selected.as_deref() == Some(node.id.as_str());
        let mut style = self.styler.resolve(node, selected);
        if let Some(patch) = self.overrides.get(&node.id) {
            patch.apply_to(&mut style);
        }
        style
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .model
            .nodes
            .iter()
            .map(|node| {
                let (x, y) = self
                    .layout
                    .position(&node.id)
                    .map_or((0.0, 0.0), |p| (p.x, p.y));
                NodeSnapshot {
                    id: node.id.clone(),
                    label: node.label.clone(),
                    kind: node.kind,
                    url: node.url.clone(),
                    is_center: node.is_center,
                    style: self.resolve(node),
                    x,
                    y,
                }
            })
            .collect();

        GraphSnapshot {
            flavor: self.styler.name(),
            direction: self.direction,
            thumbnails_visible: self.thumbnails_visible,
            nodes,
            edges: self.model.edges.clone(),
            edge_style: self.styler.edge_style(),
            spacing: self.styler.spacing(),
            zoom: self.styler.zoom_range(),
            animation_ms: self.layout.animation_ms,
            cursor: self.cursor,
        }
    }

    // ------------------------------------------------------------------------
    // Toggles
    // ------------------------------------------------------------------------

    /// Flips the layout direction and re-runs the layout with an animated
    /// transition. Returns the new direction.
    pub fn toggle_layout(&mut self) -> LayoutDirection {
        self.direction = self.direction.toggled();
        self.run_layout(Some(LAYOUT_ANIMATION));
        debug!(direction = %self.direction, "layout toggled");
        self.direction
    }

    /// Shows or hides dataset thumbnails. Returns the new visibility.
    pub fn toggle_thumbnails(&mut self) -> bool {
        self.thumbnails_visible = !self.thumbnails_visible;
        let thumbnail_nodes = self.model.nodes.iter().filter(|n| n.has_dataset_thumbnail());
        for node in thumbnail_nodes {
            if self.thumbnails_visible {
                // Clearing the overrides lets the stylesheet apply again.
                self.overrides.remove(&node.id);
            } else if let Some(patch) = self.styler.thumbnail_fallback(node) {
                self.overrides.entry(node.id.clone()).or_default().merge(&patch);
            }
        }
        debug!(visible = self.thumbnails_visible, "thumbnails toggled");
        self.thumbnails_visible
    }

    fn run_layout(&mut self, animation: Option<Duration>) {
        let sizes = self
            .model
            .nodes
            .iter()
            .map(|node| {
                let style = self.resolve(node);
                let size = Size {
                    width: style.width as f64,
                    height: style.height as f64,
                };
                (node.id.clone(), size)
            })
            .collect();
        let request = LayoutRequest {
            direction: self.direction,
            spacing: self.styler.spacing(),
            sizes,
            animation,
        };
        self.layout = self.engine.run(&self.model, &request);
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    pub fn select(&mut self, id: &str) -> bool {
        if self.model.node(id).is_none() {
            return false;
        }
        self.selected = Some(id.to_string());
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    // ------------------------------------------------------------------------
    // Pointer protocol
    // ------------------------------------------------------------------------

    fn is_navigating(&self) -> bool {
        matches!(self.state, InteractionState::Navigating(_))
    }

    fn owns_visible_popup(&self) -> bool {
        match (&self.popup, self.popup_generation) {
            (Some(popup), Some(generation)) => {
                let popup = popup.borrow();
                popup.is_visible() && popup.generation() == generation
            }
            _ => false,
        }
    }

    pub fn pointer_over(&mut self, id: &str) {
        if self.is_navigating() || self.model.node(id).is_none() {
            return;
        }
        self.cursor = Cursor::Pointer;
        if matches!(self.state(), InteractionState::Idle | InteractionState::NodeHovered(_)) {
            self.state = InteractionState::NodeHovered(id.to_string());
        }
    }

    pub fn pointer_out(&mut self) {
        if self.is_navigating() {
            return;
        }
        self.cursor = Cursor::Default;
        if matches!(self.state, InteractionState::NodeHovered(_)) {
            self.state = InteractionState::Idle;
        }
    }

    pub fn tap(&mut self, event: &PointerEvent) -> GraphEffect {
        if self.is_navigating() {
            return GraphEffect::None;
        }

        let id = match &event.target {
            PointerTarget::Canvas => return self.tap_canvas(),
            PointerTarget::Node(id) => id,
        };
        let Some(node) = self.model.node(id).cloned() else {
            warn!(node = %id, "tap on unknown node");
            return GraphEffect::None;
        };
        self.selected = Some(node.id.clone());

        if self.popup.is_some() && !event.modifiers.forces_navigation() {
            return self.open_popup(&node, event);
        }
        match node.url.clone() {
            Some(url) => self.begin_navigation(&node.id, url),
            None => {
                debug!(node = %node.id, "tapped node has no url");
                GraphEffect::None
            }
        }
    }

    fn tap_canvas(&mut self) -> GraphEffect {
        self.selected = None;
        if self.owns_visible_popup() {
            self.close_popup();
            return GraphEffect::PopupClosed;
        }
        if matches!(self.state, InteractionState::PopupOpen(_)) {
            self.state = InteractionState::Idle;
        }
        GraphEffect::None
    }

    fn open_popup(&mut self, node: &GraphNode, event: &PointerEvent) -> GraphEffect {
        let Some(popup) = &self.popup else {
            return GraphEffect::None;
        };
        let generation = popup
            .borrow_mut()
            .show(node, event.x, event.y, event.timestamp_ms);
        self.popup_generation = Some(generation);
        self.state = InteractionState::PopupOpen(node.id.clone());
        GraphEffect::PopupOpened {
            node_id: node.id.clone(),
        }
    }

    fn close_popup(&mut self) {
        if self.owns_visible_popup() {
            if let Some(popup) = &self.popup {
                popup.borrow_mut().hide();
            }
        }
        self.popup_generation = None;
        if matches!(self.state, InteractionState::PopupOpen(_)) {
            self.state = InteractionState::Idle;
        }
    }

    /// Dims every node but `id`, highlights it, sets the busy cursor and
    /// enters the terminal state.
    fn begin_navigation(&mut self, id: &str, url: String) -> GraphEffect {
        self.close_popup();
        for node in &self.model.nodes {
            let patch = if node.id == id {
                StylePatch {
                    opacity: Some(1.0),
                    background_color: Some(SELECTED_COLOR.to_string()),
                    ..Default::default()
                }
            } else {
                StylePatch {
                    opacity: Some(DIMMED_OPACITY),
                    ..Default::default()
                }
            };
            self.overrides.entry(node.id.clone()).or_default().merge(&patch);
        }
        self.cursor = Cursor::Wait;
        self.state = InteractionState::Navigating(id.to_string());
        info!(node = %id, %url, "navigating");
        GraphEffect::Navigate { url }
    }
}

impl Drop for GraphView {
    fn drop(&mut self) {
        if self.owns_visible_popup() {
            if let Some(popup) = &self.popup {
                popup.borrow_mut().hide();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::layout::LayeredLayout;
    use crate::graph::style::{NodeShape, PlainStyle, TypedStyle};
    use crate::models::{RawEdge, RawGraph, RawNode};
    use crate::popup::{DocumentClick, NodePopup, Viewport};

    fn raw() -> RawGraph {
        RawGraph {
            nodes: vec![
                RawNode {
                    id: "s1".to_string(),
                    label: Some("Wafer".to_string()),
                    node_type: Some("sample".to_string()),
                    ..Default::default()
                },
                RawNode {
                    id: "d1".to_string(),
                    label: Some("XRD".to_string()),
                    node_type: Some("dataset".to_string()),
                    thumbnail: Some("/t/d1.png".to_string()),
                    ..Default::default()
                },
                RawNode {
                    id: "d2".to_string(),
                    label: Some("Raman".to_string()),
                    node_type: Some("dataset".to_string()),
                    url: Some("/custom/d2".to_string()),
                    ..Default::default()
                },
            ],
            edges: vec![
                RawEdge {
                    source: "s1".to_string(),
                    target: "d1".to_string(),
                },
                RawEdge {
                    source: "s1".to_string(),
                    target: "d2".to_string(),
                },
            ],
            center_node_id: Some("s1".to_string()),
        }
    }

    fn typed_view(popup: Option<SharedPopup>) -> GraphView {
        let model = GraphModel::build(&raw(), Some("P"));
        GraphView::new(model, Box::new(TypedStyle), Box::new(LayeredLayout), popup)
    }

    fn all_styles(view: &GraphView) -> Vec<NodeStyle> {
        view.model()
            .nodes
            .iter()
            .map(|n| view.node_style(&n.id).unwrap())
            .collect()
    }

    // ========================================================================
    // Toggles
    // ========================================================================

    #[test]
    fn test_toggle_layout_parity() {
        let mut view = typed_view(None);
        assert_eq!(view.direction(), LayoutDirection::LR);
        assert_eq!(view.toggle_layout(), LayoutDirection::TB);
        assert_eq!(view.toggle_layout(), LayoutDirection::LR);
        assert_eq!(view.toggle_layout(), LayoutDirection::TB);
        assert_eq!(view.layout().direction, LayoutDirection::TB);
        assert_eq!(view.layout().animation_ms, Some(500));
    }

    #[test]
    fn test_initial_layout_not_animated() {
        let view = typed_view(None);
        assert_eq!(view.layout().animation_ms, None);
        assert_eq!(view.layout().positions.len(), 3);
    }

    #[test]
    fn test_toggle_thumbnails_double_toggle_restores() {
        let mut view = typed_view(None);
        let before = all_styles(&view);

        assert!(!view.toggle_thumbnails());
        let hidden = view.node_style("d1").unwrap();
        assert_eq!(hidden.background_image, None);
        assert_eq!(hidden.background_color, "#5a9e6f");
        assert_eq!(hidden.height, 32);
        assert_eq!(hidden.width, 60);
        // Nodes without thumbnails are untouched.
        assert_eq!(view.node_style("d2").unwrap(), before[2]);

        assert!(view.toggle_thumbnails());
        assert_eq!(all_styles(&view), before);
    }

    // ========================================================================
    // Styling
    // ========================================================================

    #[test]
    fn test_only_center_gets_center_styling() {
        let view = typed_view(None);
        let styles = all_styles(&view);
        assert_eq!(styles[0].shape, NodeShape::Octagon);
        assert_ne!(styles[1].shape, NodeShape::Octagon);
        assert_ne!(styles[2].shape, NodeShape::Octagon);
    }

    #[test]
    fn test_selection_is_resettable() {
        let mut view = typed_view(None);
        let before = view.node_style("d2").unwrap();
        assert!(view.select("d2"));
        assert_eq!(view.node_style("d2").unwrap().background_color, SELECTED_COLOR);
        view.clear_selection();
        assert_eq!(view.node_style("d2").unwrap(), before);
        assert!(!view.select("missing"));
    }

    #[test]
    fn test_snapshot_serializes() {
        let view = typed_view(None);
        let json = serde_json::to_value(view.snapshot()).unwrap();
        assert_eq!(json["flavor"], "typed");
        assert_eq!(json["direction"], "LR");
        assert_eq!(json["thumbnailsVisible"], true);
        assert_eq!(json["nodes"][0]["isCenter"], true);
        assert_eq!(json["nodes"][0]["style"]["shape"], "octagon");
        assert_eq!(json["edges"][0]["id"], "s1-d1");
        assert_eq!(json["edgeStyle"]["curveStyle"], "unbundled-bezier");
    }

    // ========================================================================
    // Pointer protocol
    // ========================================================================

    #[test]
    fn test_hover_cursor() {
        let mut view = typed_view(None);
        view.pointer_over("s1");
        assert_eq!(view.cursor(), Cursor::Pointer);
        assert_eq!(view.state(), InteractionState::NodeHovered("s1".to_string()));
        view.pointer_out();
        assert_eq!(view.cursor(), Cursor::Default);
        assert_eq!(view.state(), InteractionState::Idle);
    }

    #[test]
    fn test_hover_moves_between_nodes() {
        let mut view = typed_view(None);
        view.pointer_over("s1");
        view.pointer_over("d1");
        assert_eq!(view.state(), InteractionState::NodeHovered("d1".to_string()));
        assert_eq!(view.cursor(), Cursor::Pointer);
    }

    #[test]
    fn test_tap_navigates_and_dims() {
        let mut view = typed_view(None);
        let effect = view.tap(&PointerEvent::on_node("d1", 10.0, 10.0, 0));
        assert_eq!(
            effect,
            GraphEffect::Navigate {
                url: "/P/dataset/d1".to_string()
            }
        );
        assert_eq!(view.cursor(), Cursor::Wait);
        assert_eq!(view.state(), InteractionState::Navigating("d1".to_string()));

        let clicked = view.node_style("d1").unwrap();
        assert_eq!(clicked.opacity, 1.0);
        assert_eq!(clicked.background_color, SELECTED_COLOR);
        assert_eq!(view.node_style("s1").unwrap().opacity, DIMMED_OPACITY);

        // Terminal.
        assert_eq!(view.tap(&PointerEvent::on_node("s1", 0.0, 0.0, 1)), GraphEffect::None);
        view.pointer_out();
        assert_eq!(view.cursor(), Cursor::Wait);
    }

    #[test]
    fn test_input_url_wins() {
        let mut view = typed_view(None);
        let effect = view.tap(&PointerEvent::on_node("d2", 0.0, 0.0, 0));
        assert_eq!(
            effect,
            GraphEffect::Navigate {
                url: "/custom/d2".to_string()
            }
        );
    }

    #[test]
    fn test_tap_without_url_does_nothing() {
        let model = GraphModel::build(&raw(), None);
        let mut view = GraphView::new(model, Box::new(PlainStyle), Box::new(LayeredLayout), None);
        assert_eq!(view.tap(&PointerEvent::on_node("s1", 0.0, 0.0, 0)), GraphEffect::None);
        assert_eq!(view.selected(), Some("s1"));
        assert_ne!(view.cursor(), Cursor::Wait);
    }

    #[test]
    fn test_popup_variant() {
        let popup = NodePopup::shared(Viewport::default());
        let mut view = typed_view(Some(popup.clone()));

        let effect = view.tap(&PointerEvent::on_node("d1", 100.0, 100.0, 1_000));
        assert_eq!(
            effect,
            GraphEffect::PopupOpened {
                node_id: "d1".to_string()
            }
        );
        assert!(popup.borrow().is_visible());
        assert_eq!(view.state(), InteractionState::PopupOpen("d1".to_string()));

        // The opening click then reaches the document.
        let opening = DocumentClick {
            x: 100.0,
            y: 100.0,
            timestamp_ms: 1_000,
            inside_popup: false,
        };
        assert!(!popup.borrow_mut().handle_document_click(opening));
        assert!(popup.borrow().is_visible());

        assert_eq!(view.tap(&PointerEvent::on_canvas(400.0, 400.0, 2_000)), GraphEffect::PopupClosed);
        assert!(!popup.borrow().is_visible());
        assert_eq!(view.state(), InteractionState::Idle);
        assert!(view.selected().is_none());
    }

    #[test]
    fn test_modifier_click_navigates_in_popup_variant() {
        let popup = NodePopup::shared(Viewport::default());
        let mut view = typed_view(Some(popup.clone()));
        view.tap(&PointerEvent::on_node("s1", 0.0, 0.0, 0));
        assert!(popup.borrow().is_visible());

        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };
        let effect = view.tap(&PointerEvent::on_node("d1", 0.0, 0.0, 5).with_modifiers(ctrl));
        assert!(matches!(effect, GraphEffect::Navigate { .. }));
        assert!(!popup.borrow().is_visible());
    }

    #[test]
    fn test_popup_dismissed_elsewhere_returns_to_idle() {
        let popup = NodePopup::shared(Viewport::default());
        let mut view = typed_view(Some(popup.clone()));
        view.tap(&PointerEvent::on_node("s1", 0.0, 0.0, 0));
        popup.borrow_mut().handle_key("Escape");
        assert_eq!(view.state(), InteractionState::Idle);
        assert_eq!(view.tap(&PointerEvent::on_canvas(0.0, 0.0, 10)), GraphEffect::None);
    }

    #[test]
    fn test_drop_hides_owned_popup() {
        let popup = NodePopup::shared(Viewport::default());
        let mut view = typed_view(Some(popup.clone()));
        view.tap(&PointerEvent::on_node("s1", 0.0, 0.0, 0));
        drop(view);
        assert!(!popup.borrow().is_visible());
    }

    #[test]
    fn test_shared_popup_belongs_to_last_opener() {
        let popup = NodePopup::shared(Viewport::default());
        let mut first = typed_view(Some(popup.clone()));
        let mut second = typed_view(Some(popup.clone()));
        first.tap(&PointerEvent::on_node("s1", 0.0, 0.0, 0));
        second.tap(&PointerEvent::on_node("d1", 0.0, 0.0, 1));

        assert_eq!(first.state(), InteractionState::Idle);
        drop(first);
        assert!(popup.borrow().is_visible());
        assert_eq!(popup.borrow().content().unwrap().node_id, "d1");
    }
}
