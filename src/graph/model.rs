//! Node/edge model built from raw host data.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{entity_url, EntityKind, RawGraph, RawNode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub name: Option<String>,
    /// `None` for untyped nodes (the plain sample graph).
    pub kind: Option<EntityKind>,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
    /// Fixed at construction.
    pub is_center: bool,
    pub description: Option<String>,
    pub measurement: Option<String>,
}

impl GraphNode {
    /// Dataset nodes carrying a thumbnail get the image-backed visual.
    pub fn has_dataset_thumbnail(&self) -> bool {
        self.kind == Some(EntityKind::Dataset) && self.thumbnail.is_some()
    }

    /// Label length in characters, the unit of the typed width rules.
    pub fn label_len(&self) -> usize {
        self.label.chars().count()
    }

    /// Length the plain sample graph sizes by: the name, else the label.
    pub fn name_len(&self) -> usize {
        self.name.as_deref().unwrap_or(&self.label).chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphModel {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub center_node_id: Option<String>,
}

impl GraphModel {
    /// Builds the model. Node URLs come from the input; when absent and a
    /// project is known they are derived from the node's kind (sample when
    /// untyped). Edges whose endpoints are missing are dropped.
    pub fn build(raw: &RawGraph, project_id: Option<&str>) -> Self {
        let center = raw.center_node_id.as_deref();
        let nodes: Vec<GraphNode> = raw
            .nodes
            .iter()
            .map(|n| build_node(n, center, project_id))
            .collect();

        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let mut edges = Vec::with_capacity(raw.edges.len());
        for edge in &raw.edges {
            if !ids.contains(edge.source.as_str()) || !ids.contains(edge.target.as_str()) {
                warn!(source = %edge.source, target = %edge.target, "dropping edge with unknown endpoint");
                continue;
            }
            edges.push(GraphEdge {
                id: format!("{}-{}", edge.source, edge.target),
                source: edge.source.clone(),
                target: edge.target.clone(),
            });
        }

        debug!(nodes = nodes.len(), edges = edges.len(), "built graph model");
        Self {
            nodes,
            edges,
            center_node_id: raw.center_node_id.clone(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn center(&self) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.is_center)
    }
}

fn build_node(raw: &RawNode, center: Option<&str>, project_id: Option<&str>) -> GraphNode {
    let kind = raw.node_type.as_deref().and_then(EntityKind::parse);
    let label = raw
        .label
        .clone()
        .filter(|l| !l.is_empty())
        .or_else(|| raw.name.clone())
        .unwrap_or_else(|| raw.id.clone());
    let url = raw.url.clone().or_else(|| {
        project_id.map(|p| entity_url(p, kind.unwrap_or(EntityKind::Sample), &raw.id))
    });

    GraphNode {
        id: raw.id.clone(),
        label,
        name: raw.name.clone(),
        kind,
        url,
        thumbnail: raw.thumbnail.clone().filter(|t| !t.is_empty()),
        is_center: center == Some(raw.id.as_str()),
        description: raw.description.clone(),
        measurement: raw.measurement.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawEdge;

    fn raw_node(id: &str) -> RawNode {
        RawNode {
            id: id.to_string(),
            label: Some(format!("label {}", id)),
            ..Default::default()
        }
    }

    fn edge(source: &str, target: &str) -> RawEdge {
        RawEdge {
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    #[test]
    fn test_center_detection() {
        let raw = RawGraph {
            nodes: vec![raw_node("a"), raw_node("b"), raw_node("c")],
            edges: vec![],
            center_node_id: Some("b".to_string()),
        };
        let model = GraphModel::build(&raw, None);
        let centers: Vec<_> = model.nodes.iter().filter(|n| n.is_center).map(|n| n.id.as_str()).collect();
        assert_eq!(centers, vec!["b"]);
        assert_eq!(model.center().unwrap().id, "b");
    }

    #[test]
    fn test_unmatched_center_marks_nothing() {
        let raw = RawGraph {
            nodes: vec![raw_node("a"), raw_node("b")],
            edges: vec![],
            center_node_id: Some("zzz".to_string()),
        };
        let model = GraphModel::build(&raw, None);
        assert!(model.nodes.iter().all(|n| !n.is_center));
        assert!(model.center().is_none());
    }

    #[test]
    fn test_edges_keep_duplicates_and_drop_dangling() {
        let raw = RawGraph {
            nodes: vec![raw_node("a"), raw_node("b")],
            edges: vec![edge("a", "b"), edge("a", "b"), edge("a", "ghost")],
            center_node_id: None,
        };
        let model = GraphModel::build(&raw, None);
        assert_eq!(model.edges.len(), 2);
        assert_eq!(model.edges[0].id, "a-b");
        assert_eq!(model.edges[1].id, "a-b");
    }

    #[test]
    fn test_label_and_url_fallbacks() {
        let raw = RawGraph {
            nodes: vec![
                RawNode {
                    id: "s1".to_string(),
                    name: Some("Wafer".to_string()),
                    ..Default::default()
                },
                RawNode {
                    id: "d1".to_string(),
                    node_type: Some("dataset".to_string()),
                    ..Default::default()
                },
                RawNode {
                    id: "x".to_string(),
                    url: Some("/elsewhere".to_string()),
                    ..Default::default()
                },
            ],
            edges: vec![],
            center_node_id: None,
        };
        let model = GraphModel::build(&raw, Some("P"));
        assert_eq!(model.nodes[0].label, "Wafer");
        assert_eq!(model.nodes[0].url.as_deref(), Some("/P/sample-graph/s1"));
        assert_eq!(model.nodes[1].label, "d1");
        assert_eq!(model.nodes[1].url.as_deref(), Some("/P/dataset/d1"));
        assert_eq!(model.nodes[2].url.as_deref(), Some("/elsewhere"));

        let without_project = GraphModel::build(&raw, None);
        assert!(without_project.nodes[0].url.is_none());
    }

    #[test]
    fn test_unknown_type_is_untyped() {
        let raw = RawGraph {
            nodes: vec![RawNode {
                id: "n".to_string(),
                node_type: Some("instrument".to_string()),
                thumbnail: Some("t.png".to_string()),
                ..Default::default()
            }],
            edges: vec![],
            center_node_id: None,
        };
        let model = GraphModel::build(&raw, None);
        assert_eq!(model.nodes[0].kind, None);
        assert!(!model.nodes[0].has_dataset_thumbnail());
    }
}
