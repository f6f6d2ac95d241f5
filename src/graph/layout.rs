//! Layout engines.
//!
//! The drawing engine that animates positions belongs to the host; this module
//! only computes where nodes go. `LayeredLayout` ranks nodes by longest path
//! from the sources and stacks ranks along the layout direction, the same shape
//! a dagre layout produces for the small graphs shown here.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::Serialize;

use super::model::GraphModel;
use super::style::LayoutSpacing;
use super::view::LayoutDirection;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

/// Everything an engine needs for one run.
#[derive(Debug, Clone)]
pub struct LayoutRequest {
    pub direction: LayoutDirection,
    pub spacing: LayoutSpacing,
    /// Rendered node sizes keyed by node id.
    pub sizes: HashMap<String, Size>,
    /// Transition length when positions should animate from the previous run.
    pub animation: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub direction: LayoutDirection,
    /// Node centers, in model order.
    pub positions: Vec<NodePosition>,
    #[serde(rename = "animationMs")]
    pub animation_ms: Option<u64>,
}

impl Layout {
    pub fn position(&self, id: &str) -> Option<&NodePosition> {
        self.positions.iter().find(|p| p.id == id)
    }
}

pub trait LayoutEngine: Send + Sync {
    fn run(&self, model: &GraphModel, request: &LayoutRequest) -> Layout;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredLayout;

impl LayeredLayout {
    /// Longest-path rank of every node, in model order. Nodes on a cycle get
    /// ranked after everything reachable without one.
    pub fn ranks(model: &GraphModel) -> Vec<usize> {
        let index: HashMap<&str, usize> = model
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut successors = vec![Vec::new(); model.nodes.len()];
        let mut in_degree = vec![0usize; model.nodes.len()];
        for edge in &model.edges {
            let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) else {
                continue;
            };
            if s == t {
                continue;
            }
            successors[s].push(t);
            in_degree[t] += 1;
        }

        let mut rank = vec![0usize; model.nodes.len()];
        let mut done = vec![false; model.nodes.len()];
        let mut queue: VecDeque<usize> = (0..model.nodes.len()).filter(|&i| in_degree[i] == 0).collect();

        loop {
            while let Some(i) = queue.pop_front() {
                done[i] = true;
                for &t in &successors[i] {
                    if done[t] {
                        continue;
                    }
                    rank[t] = rank[t].max(rank[i] + 1);
                    in_degree[t] -= 1;
                    if in_degree[t] == 0 {
                        queue.push_back(t);
                    }
                }
            }
            // Break a cycle at its first unplaced node.
            let Some(stuck) = (0..model.nodes.len()).find(|&i| !done[i]) else {
                break;
            };
            in_degree[stuck] = 0;
            queue.push_back(stuck);
        }
        rank
    }
}

impl LayoutEngine for LayeredLayout {
    fn run(&self, model: &GraphModel, request: &LayoutRequest) -> Layout {
        let ranks = Self::ranks(model);
        let rank_count = ranks.iter().copied().max().map_or(0, |r| r + 1);
        let spacing = request.spacing;
        let size_of = |id: &str| {
            request.sizes.get(id).copied().unwrap_or(Size {
                width: 0.0,
                height: 0.0,
            })
        };
        // Extent along the rank axis and across it, per direction.
        let axes = |size: Size| match request.direction {
            LayoutDirection::LR => (size.width, size.height),
            LayoutDirection::TB => (size.height, size.width),
        };

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
        for (i, &r) in ranks.iter().enumerate() {
            members[r].push(i);
        }

        let mut positions: Vec<Option<NodePosition>> = vec![None; model.nodes.len()];
        let mut along = spacing.padding;
        for rank_members in &members {
            let depth = rank_members
                .iter()
                .map(|&i| axes(size_of(&model.nodes[i].id)).0)
                .fold(0.0, f64::max);
            let mut across = spacing.padding;
            for &i in rank_members {
                let node = &model.nodes[i];
                let (_, breadth) = axes(size_of(&node.id));
                let (main, cross) = (along + depth / 2.0, across + breadth / 2.0);
                let (x, y) = match request.direction {
                    LayoutDirection::LR => (main, cross),
                    LayoutDirection::TB => (cross, main),
                };
                positions[i] = Some(NodePosition {
                    id: node.id.clone(),
                    x,
                    y,
                });
                across += breadth + spacing.node_sep;
            }
            along += depth + spacing.rank_sep;
        }

        Layout {
            direction: request.direction,
            positions: positions.into_iter().flatten().collect(),
            animation_ms: request.animation.map(|d| d.as_millis() as u64),
        }
    }
}
