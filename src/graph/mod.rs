//! Graph view over samples and datasets.
//!
//! One `GraphView` serves both page flavors; the flavor only chooses the
//! node-styling strategy.

pub mod layout;
pub mod model;
pub mod style;
pub mod view;

use serde::Deserialize;

pub use layout::{LayeredLayout, Layout, LayoutEngine};
pub use model::{GraphEdge, GraphModel, GraphNode};
pub use style::{NodeStyle, NodeStyler, PlainStyle, TypedStyle};
pub use view::{
    Cursor, GraphEffect, GraphSnapshot, GraphView, InteractionState, LayoutDirection, Modifiers,
    PointerEvent, PointerTarget, LAYOUT_ANIMATION,
};

use crate::models::RawGraph;
use crate::popup::SharedPopup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphFlavor {
    /// Sample graph: untyped grey nodes.
    #[default]
    Plain,
    /// Entity graph: sample/dataset encodings and thumbnails.
    Typed,
}

impl GraphFlavor {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plain" => Some(GraphFlavor::Plain),
            "typed" => Some(GraphFlavor::Typed),
            _ => None,
        }
    }

    pub fn styler(self) -> Box<dyn NodeStyler> {
        match self {
            GraphFlavor::Plain => Box::new(PlainStyle),
            GraphFlavor::Typed => Box::new(TypedStyle),
        }
    }
}

/// Graph view configuration as passed by the host page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphViewConfig {
    pub container_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub flavor: GraphFlavor,
    /// Plain taps open the node popup instead of navigating.
    #[serde(default)]
    pub popup: bool,
}

impl GraphView {
    /// Builds a view for `config` with the default layered layout. `popup` is
    /// only attached when the config enables it.
    pub fn from_config(config: &GraphViewConfig, raw: &RawGraph, popup: Option<SharedPopup>) -> Self {
        let model = GraphModel::build(raw, config.project_id.as_deref());
        let popup = if config.popup { popup } else { None };
        GraphView::new(model, config.flavor.styler(), Box::new(LayeredLayout), popup)
    }
}
