//! Data models shared by the editor, the graph view and the host.
//!
//! This module contains the entity addressing scheme (`kind:id` to URL), the raw
//! graph input accepted from a host page, and the wire types of the search and
//! save endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Entity Addressing
// ============================================================================

/// The two kinds of entity a wiki-link or graph node can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Sample,
    Dataset,
}

impl EntityKind {
    /// Parses the lowercase token form. Anything else is not an entity kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sample" => Some(EntityKind::Sample),
            "dataset" => Some(EntityKind::Dataset),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Sample => "sample",
            EntityKind::Dataset => "dataset",
        }
    }

    /// Capitalized prefix used when synthesizing a default label.
    pub fn display_prefix(&self) -> &'static str {
        match self {
            EntityKind::Sample => "Sample",
            EntityKind::Dataset => "Dataset",
        }
    }

    /// Collection segment of the search endpoint (`/{project}/api/{collection}`).
    pub fn api_collection(&self) -> &'static str {
        match self {
            EntityKind::Sample => "samples",
            EntityKind::Dataset => "datasets",
        }
    }

    /// Route segment of the navigation target.
    pub fn route_segment(&self) -> &'static str {
        match self {
            EntityKind::Sample => "sample-graph",
            EntityKind::Dataset => "dataset",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the navigation URL of an entity within a project.
pub fn entity_url(project_id: &str, kind: EntityKind, id: &str) -> String {
    format!("/{}/{}/{}", project_id, kind.route_segment(), id)
}

/// Synthesizes the label shown when a reference carries no explicit name.
/// An empty id yields `"Sample-"` / `"Dataset-"`.
pub fn default_label(kind: EntityKind, id: &str) -> String {
    format!("{}-{}", kind.display_prefix(), id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
    pub display_name: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Reference whose display name is the synthesized default label.
    pub fn unnamed(kind: EntityKind, id: impl Into<String>) -> Self {
        let id = id.into();
        let display_name = default_label(kind, &id);
        Self {
            kind,
            id,
            display_name,
        }
    }

    pub fn url(&self, project_id: &str) -> String {
        entity_url(project_id, self.kind, &self.id)
    }
}

// ============================================================================
// Graph Input
// ============================================================================

/// Graph data as supplied by the host page. Optional fields vary between the
/// plain sample graph and the typed entity graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGraph {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
    #[serde(rename = "centerNodeId", default)]
    pub center_node_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub measurement: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEdge {
    pub source: String,
    pub target: String,
}

// ============================================================================
// Endpoint Wire Types
// ============================================================================

/// One entry returned by `GET /{project}/api/{samples|datasets}?q=`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    #[serde(alias = "unique_id")]
    pub id: String,
    #[serde(alias = "sample_name", alias = "dataset_name")]
    pub name: String,
}

/// Body of the save request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveBody {
    pub content: String,
}
