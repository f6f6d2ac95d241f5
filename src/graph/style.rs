//! Node styling strategies.
//!
//! A stylesheet is resolved per node in layers, lowest first:
//! - the strategy's base style for the node's kind (including the thumbnail visual)
//! - the center overlay
//! - the selection overlay
//! - per-node overrides set by the view (thumbnail fallback, navigation dimming)
//!
//! `PlainStyle` draws the sample graph, `TypedStyle` the entity graph with
//! sample/dataset encodings.

use serde::Serialize;

use super::model::GraphNode;
use crate::models::EntityKind;

pub const SELECTED_COLOR: &str = "#ff6b6b";
pub const SELECTED_BORDER: &str = "#c92a2a";
pub const DIMMED_OPACITY: f32 = 0.3;
pub const LAYOUT_PADDING: u32 = 30;

const SAMPLE_COLOR: &str = "#4a7ba7";
const DATASET_COLOR: &str = "#5a9e6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    RoundRectangle,
    Rectangle,
    Octagon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextValign {
    Center,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
}

/// Fully resolved visual of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStyle {
    pub background_color: String,
    pub background_image: Option<String>,
    pub color: String,
    pub font_size: u32,
    pub font_weight: FontWeight,
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    pub shape: NodeShape,
    pub text_valign: TextValign,
    pub text_margin_y: i32,
    pub text_max_width: u32,
    pub border_width: u32,
    pub border_color: Option<String>,
    pub opacity: f32,
}

/// A partial style. Set fields replace the corresponding resolved value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylePatch {
    pub background_color: Option<String>,
    /// `Some(None)` removes the image.
    pub background_image: Option<Option<String>>,
    pub color: Option<String>,
    pub font_size: Option<u32>,
    pub font_weight: Option<FontWeight>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub shape: Option<NodeShape>,
    pub text_valign: Option<TextValign>,
    pub text_margin_y: Option<i32>,
    pub border_width: Option<u32>,
    pub border_color: Option<String>,
    pub opacity: Option<f32>,
}

impl StylePatch {
    pub fn is_empty(&self) -> bool {
        *self == StylePatch::default()
    }

    pub fn apply_to(&self, style: &mut NodeStyle) {
        if let Some(v) = &self.background_color {
            style.background_color = v.clone();
        }
        if let Some(v) = &self.background_image {
            style.background_image = v.clone();
        }
        if let Some(v) = &self.color {
            style.color = v.clone();
        }
        if let Some(v) = self.font_size {
            style.font_size = v;
        }
        if let Some(v) = self.font_weight {
            style.font_weight = v;
        }
        if let Some(v) = self.width {
            style.width = v;
        }
        if let Some(v) = self.height {
            style.height = v;
        }
        if let Some(v) = self.shape {
            style.shape = v;
        }
        if let Some(v) = self.text_valign {
            style.text_valign = v;
        }
        if let Some(v) = self.text_margin_y {
            style.text_margin_y = v;
        }
        if let Some(v) = self.border_width {
            style.border_width = v;
        }
        if let Some(v) = &self.border_color {
            style.border_color = Some(v.clone());
        }
        if let Some(v) = self.opacity {
            style.opacity = v;
        }
    }

    /// Layers `other` on top of `self`.
    pub fn merge(&mut self, other: &StylePatch) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field.clone();
                })*
            };
        }
        take!(
            background_color,
            background_image,
            color,
            font_size,
            font_weight,
            width,
            height,
            shape,
            text_valign,
            text_margin_y,
            border_width,
            border_color,
            opacity
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurveStyle {
    UnbundledBezier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub width: u32,
    pub line_color: String,
    pub target_arrow_color: String,
    pub target_arrow_shape: &'static str,
    pub curve_style: CurveStyle,
    pub arrow_scale: f32,
}

impl EdgeStyle {
    fn colored(color: &str) -> Self {
        Self {
            width: 2,
            line_color: color.to_string(),
            target_arrow_color: color.to_string(),
            target_arrow_shape: "triangle",
            curve_style: CurveStyle::UnbundledBezier,
            arrow_scale: 1.5,
        }
    }
}

/// Separation between nodes of one rank and between ranks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSpacing {
    pub node_sep: f64,
    pub rank_sep: f64,
    pub padding: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
}

impl ZoomRange {
    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min, self.max)
    }
}

/// A node-styling strategy.
pub trait NodeStyler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Kind-based style, including the thumbnail visual where it applies.
    fn base_style(&self, node: &GraphNode) -> NodeStyle;

    fn center_overlay(&self) -> StylePatch;

    fn selected_overlay(&self) -> StylePatch {
        StylePatch {
            background_color: Some(SELECTED_COLOR.to_string()),
            border_width: Some(3),
            border_color: Some(SELECTED_BORDER.to_string()),
            ..Default::default()
        }
    }

    /// Override applied to a thumbnail node while thumbnails are hidden.
    /// `None` if the node has no thumbnail visual.
    fn thumbnail_fallback(&self, _node: &GraphNode) -> Option<StylePatch> {
        None
    }

    fn edge_style(&self) -> EdgeStyle;

    fn spacing(&self) -> LayoutSpacing;

    fn zoom_range(&self) -> ZoomRange;

    /// Resolves the stylesheet layers below the per-node overrides.
    fn resolve(&self, node: &GraphNode, selected: bool) -> NodeStyle {
        let mut style = self.base_style(node);
        if node.is_center {
            self.center_overlay().apply_to(&mut style);
        }
        if selected {
            self.selected_overlay().apply_to(&mut style);
        }
        style
    }
}

// ============================================================================
// Plain (sample graph)
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainStyle;

impl NodeStyler for PlainStyle {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn base_style(&self, node: &GraphNode) -> NodeStyle {
        plain_node(node)
    }

    fn center_overlay(&self) -> StylePatch {
        StylePatch {
            background_color: Some(SAMPLE_COLOR.to_string()),
            border_width: Some(3),
            border_color: Some("#003366".to_string()),
            font_weight: Some(FontWeight::Bold),
            font_size: Some(13),
            shape: Some(NodeShape::Octagon),
            ..Default::default()
        }
    }

    fn edge_style(&self) -> EdgeStyle {
        EdgeStyle::colored("#999")
    }

    fn spacing(&self) -> LayoutSpacing {
        LayoutSpacing {
            node_sep: 50.0,
            rank_sep: 100.0,
            padding: LAYOUT_PADDING as f64,
        }
    }

    fn zoom_range(&self) -> ZoomRange {
        ZoomRange { min: 0.3, max: 3.0 }
    }
}

fn plain_node(node: &GraphNode) -> NodeStyle {
    NodeStyle {
        background_color: "#666".to_string(),
        background_image: None,
        color: "#fff".to_string(),
        font_size: 12,
        font_weight: FontWeight::Normal,
        width: (node.name_len() * 7) as u32,
        height: 40,
        padding: 10,
        shape: NodeShape::RoundRectangle,
        text_valign: TextValign::Center,
        text_margin_y: 0,
        text_max_width: 100,
        border_width: 0,
        border_color: None,
        opacity: 1.0,
    }
}

// ============================================================================
// Typed (entity graph)
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TypedStyle;

impl TypedStyle {
    fn dataset_width(node: &GraphNode) -> u32 {
        (node.label_len() * 6).max(60) as u32
    }
}

impl NodeStyler for TypedStyle {
    fn name(&self) -> &'static str {
        "typed"
    }

    fn base_style(&self, node: &GraphNode) -> NodeStyle {
        let typed = |background: &str, font_size, width, height, shape| NodeStyle {
            background_color: background.to_string(),
            background_image: None,
            color: "#fff".to_string(),
            font_size,
            font_weight: FontWeight::Normal,
            width,
            height,
            padding: 0,
            shape,
            text_valign: TextValign::Center,
            text_margin_y: 0,
            text_max_width: 120,
            border_width: 0,
            border_color: None,
            opacity: 1.0,
        };

        match node.kind {
            Some(EntityKind::Sample) => typed(
                SAMPLE_COLOR,
                11,
                (node.label_len() * 7).max(60) as u32,
                40,
                NodeShape::RoundRectangle,
            ),
            Some(EntityKind::Dataset) => {
                let mut style = typed(
                    DATASET_COLOR,
                    10,
                    Self::dataset_width(node),
                    32,
                    NodeShape::Rectangle,
                );
                if let Some(thumbnail) = node.thumbnail.as_ref().filter(|_| node.has_dataset_thumbnail()) {
                    style.background_image = Some(thumbnail.clone());
                    style.background_color = "#f8f9fa".to_string();
                    style.border_width = 3;
                    style.border_color = Some(DATASET_COLOR.to_string());
                    style.color = "#333".to_string();
                    style.width = 100;
                    style.height = 80;
                    style.text_valign = TextValign::Bottom;
                    style.text_margin_y = 6;
                }
                style
            }
            None => plain_node(node),
        }
    }

    fn center_overlay(&self) -> StylePatch {
        StylePatch {
            border_width: Some(3),
            border_color: Some("#001f3f".to_string()),
            font_weight: Some(FontWeight::Bold),
            font_size: Some(13),
            shape: Some(NodeShape::Octagon),
            ..Default::default()
        }
    }

    fn thumbnail_fallback(&self, node: &GraphNode) -> Option<StylePatch> {
        if !node.has_dataset_thumbnail() {
            return None;
        }
        Some(StylePatch {
            background_image: Some(None),
            background_color: Some(DATASET_COLOR.to_string()),
            color: Some("#fff".to_string()),
            width: Some(Self::dataset_width(node)),
            height: Some(32),
            text_valign: Some(TextValign::Center),
            text_margin_y: Some(0),
            ..Default::default()
        })
    }

    fn edge_style(&self) -> EdgeStyle {
        EdgeStyle::colored("#aaa")
    }

    fn spacing(&self) -> LayoutSpacing {
        LayoutSpacing {
            node_sep: 40.0,
            rank_sep: 80.0,
            padding: LAYOUT_PADDING as f64,
        }
    }

    fn zoom_range(&self) -> ZoomRange {
        ZoomRange { min: 0.2, max: 3.0 }
    }
}
