//! ProcessFlow produced by process discovery (spec §3, §4.11).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDirection {
    LeftToRight,
    TopToBottom,
}

/// A node's position in the process (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Start,
    Task,
    Gateway,
    End,
    Current,
}

/// Per-node aggregates surfaced alongside the node itself (spec §6); both
/// are optional since not every construction strategy has both available.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub count: Option<u64>,
    pub avg_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessNode {
    pub id: String,
    pub label: String,
    pub role: NodeRole,
    pub metrics: NodeMetrics,
    pub layer: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEdge {
    pub from: String,
    pub to: String,
    pub count: u64,
    pub duration: Option<f64>,
}

/// Discovered directed graph of process steps. Construction is validated:
/// every edge endpoint must name an existing node (spec §4.11 invariant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessFlow {
    pub name: String,
    pub nodes: Vec<ProcessNode>,
    pub edges: Vec<ProcessEdge>,
    pub bottleneck_edge: Option<usize>,
    pub layout_direction: LayoutDirection,
}

impl ProcessFlow {
    /// Builds a flow, rejecting edges that reference unknown nodes and
    /// computing the bottleneck edge automatically: the edge with the
    /// maximum average duration (Glossary, spec §4.11), or `None` when no
    /// edge carries duration data. Returns `None` if any edge is dangling.
    pub fn new(
        name: impl Into<String>,
        nodes: Vec<ProcessNode>,
        edges: Vec<ProcessEdge>,
        layout_direction: LayoutDirection,
    ) -> Option<Self> {
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        if edges.iter().any(|e| !ids.contains(e.from.as_str()) || !ids.contains(e.to.as_str())) {
            return None;
        }
        let bottleneck_edge = edges
            .iter()
            .enumerate()
            .filter_map(|(idx, e)| e.duration.map(|d| (idx, d)))
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, _)| idx);
        Some(Self { name: name.into(), nodes, edges, bottleneck_edge, layout_direction })
    }
}

/// Result of schema-time process discovery (spec §4.11): a business
/// process inferred from structural signals in a `SchemaSnapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredProcess {
    pub name: String,
    pub main_table: String,
    pub history_table: Option<String>,
    pub status_column: Option<String>,
    pub transition_pattern: Option<(String, String)>,
    pub evidence: Vec<String>,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> ProcessNode {
        ProcessNode { id: id.to_string(), label: id.to_string(), role: NodeRole::Task, metrics: NodeMetrics::default(), layer: 0 }
    }

    #[test]
    fn rejects_edges_with_dangling_endpoints() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![ProcessEdge { from: "a".into(), to: "missing".into(), count: 1, duration: None }];
        assert!(ProcessFlow::new("flow", nodes, edges, LayoutDirection::LeftToRight).is_none());
    }

    #[test]
    fn picks_highest_duration_edge_as_bottleneck() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![
            ProcessEdge { from: "a".into(), to: "b".into(), count: 100, duration: Some(2.0) },
            ProcessEdge { from: "b".into(), to: "c".into(), count: 3, duration: Some(45.0) },
        ];
        let flow = ProcessFlow::new("flow", nodes, edges, LayoutDirection::LeftToRight).unwrap();
        assert_eq!(flow.bottleneck_edge, Some(1));
    }

    #[test]
    fn bottleneck_is_none_when_no_edge_has_duration() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![ProcessEdge { from: "a".into(), to: "b".into(), count: 5, duration: None }];
        let flow = ProcessFlow::new("flow", nodes, edges, LayoutDirection::LeftToRight).unwrap();
        assert_eq!(flow.bottleneck_edge, None);
    }
}
