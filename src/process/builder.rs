//! Result-time `ProcessFlow` construction (spec §4.11b): inspects a
//! materialized `QueryResult`'s column names for transition or
//! aggregate-over-status shapes and builds a flow graph from the rows.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::{DiscoveredProcess, LayoutDirection, NodeMetrics, NodeRole, ProcessEdge, ProcessFlow, ProcessNode, QueryResult};

const CHAIN_FLIP_DEPTH: u32 = 3;

fn column_index(result: &QueryResult, name: &str) -> Option<usize> {
    result.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
}

/// Finds a column whose name contains `needle`, so `avg_duration_min` or
/// `duration_ms` are recognized the same as a bare `duration` column
/// (spec §8 scenario S6 names its duration column `avg_duration_min`).
fn column_index_containing(result: &QueryResult, needle: &str) -> Option<usize> {
    result.columns.iter().position(|c| c.name.to_lowercase().contains(needle))
}

fn cell(result: &QueryResult, row_idx: usize, col_idx: usize) -> Option<String> {
    result.rows.get(row_idx).and_then(|row| row.get(col_idx)).cloned().flatten()
}

/// Picks a node's role by in/out-degree, in priority order: no incoming
/// edge is a start, no outgoing edge is an end, more than one outgoing
/// edge is a gateway, everything else is a plain task (spec §3, §6).
fn node_role(in_degree: usize, out_degree: usize) -> NodeRole {
    if in_degree == 0 {
        NodeRole::Start
    } else if out_degree == 0 {
        NodeRole::End
    } else if out_degree > 1 {
        NodeRole::Gateway
    } else {
        NodeRole::Task
    }
}

/// Transition strategy (spec §4.11b): rows carry `(from, to, count?,
/// duration?)`. Every unique value in either column becomes a node, every
/// row becomes an edge carrying its own duration so `ProcessFlow::new` can
/// derive the bottleneck directly.
fn build_transition_flow(result: &QueryResult, discovery: Option<&DiscoveredProcess>) -> Option<ProcessFlow> {
    let from_idx = column_index(result, "from").or_else(|| column_index(result, "from_status"))?;
    let to_idx = column_index(result, "to").or_else(|| column_index(result, "to_status"))?;
    let count_idx = column_index(result, "count");
    let duration_idx = column_index_containing(result, "duration");

    let mut node_order: Vec<String> = Vec::new();
    let mut seen_nodes: HashSet<String> = HashSet::new();
    let mut edges = Vec::new();
    let mut in_degree: HashMap<String, usize> = HashMap::new();
    let mut out_degree: HashMap<String, usize> = HashMap::new();

    for row_idx in 0..result.rows.len() {
        let Some(from) = cell(result, row_idx, from_idx) else { continue };
        let Some(to) = cell(result, row_idx, to_idx) else { continue };
        for node in [&from, &to] {
            if seen_nodes.insert(node.clone()) {
                node_order.push(node.clone());
            }
        }
        let count = count_idx.and_then(|idx| cell(result, row_idx, idx)).and_then(|v| v.parse::<u64>().ok()).unwrap_or(1);
        *out_degree.entry(from.clone()).or_insert(0) += 1;
        *in_degree.entry(to.clone()).or_insert(0) += 1;
        edges.push((from, to, count, duration_idx.and_then(|idx| cell(result, row_idx, idx)).and_then(|v| v.parse::<f64>().ok())));
    }

    if edges.is_empty() {
        return None;
    }

    let layers = topological_layers(&node_order, &edges.iter().map(|(f, t, _, _)| (f.clone(), t.clone())).collect::<Vec<_>>());
    let nodes: Vec<ProcessNode> = node_order
        .iter()
        .map(|id| ProcessNode {
            id: id.clone(),
            label: id.clone(),
            role: node_role(in_degree.get(id).copied().unwrap_or(0), out_degree.get(id).copied().unwrap_or(0)),
            metrics: NodeMetrics::default(),
            layer: layers.get(id).copied().unwrap_or(0),
        })
        .collect();

    let process_edges: Vec<ProcessEdge> =
        edges.iter().map(|(from, to, count, duration)| ProcessEdge { from: from.clone(), to: to.clone(), count: *count, duration: *duration }).collect();

    let direction = layout_direction(&layers);
    let name = discovery.map(|d| d.name.clone()).unwrap_or_else(|| "Process".to_string());
    ProcessFlow::new(name, nodes, process_edges, direction)
}

/// Aggregate strategy (spec §4.11b): rows carry `(status, count)`, ordered
/// by descending count since no discovered stage ordering is available.
/// No edges are drawn between stages: row adjacency never fabricates one.
fn build_aggregate_flow(result: &QueryResult, discovery: Option<&DiscoveredProcess>) -> Option<ProcessFlow> {
    let status_idx = column_index(result, "status").or_else(|| column_index(result, "state"))?;
    let count_idx = column_index(result, "count")?;

    let mut counted: Vec<(String, u64)> = Vec::new();
    for row_idx in 0..result.rows.len() {
        let Some(status) = cell(result, row_idx, status_idx) else { continue };
        let count = cell(result, row_idx, count_idx).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
        counted.push((status, count));
    }
    if counted.is_empty() {
        return None;
    }
    counted.sort_by(|a, b| b.1.cmp(&a.1));

    let last_idx = counted.len() - 1;
    let nodes: Vec<ProcessNode> = counted
        .iter()
        .enumerate()
        .map(|(idx, (status, count))| ProcessNode {
            id: status.clone(),
            label: status.clone(),
            role: if idx == 0 { NodeRole::Start } else if idx == last_idx { NodeRole::End } else { NodeRole::Task },
            metrics: NodeMetrics { count: Some(*count), avg_duration: None },
            layer: idx as u32,
        })
        .collect();

    let name = discovery.map(|d| d.name.clone()).unwrap_or_else(|| "Process".to_string());
    ProcessFlow::new(name, nodes, Vec::new(), LayoutDirection::LeftToRight)
}

fn topological_layers(node_order: &[String], edges: &[(String, String)]) -> HashMap<String, u32> {
    let mut in_degree: HashMap<&str, usize> = node_order.iter().map(|n| (n.as_str(), 0)).collect();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (from, to) in edges {
        *in_degree.entry(to.as_str()).or_insert(0) += 1;
        adjacency.entry(from.as_str()).or_default().push(to.as_str());
    }

    let mut layer: HashMap<String, u32> = HashMap::new();
    let mut queue: VecDeque<&str> = node_order.iter().map(|s| s.as_str()).filter(|n| in_degree.get(n).copied().unwrap_or(0) == 0).collect();
    for n in &queue {
        layer.insert(n.to_string(), 0);
    }

    while let Some(node) = queue.pop_front() {
        let current_layer = *layer.get(node).unwrap_or(&0);
        if let Some(children) = adjacency.get(node) {
            for child in children {
                let next_layer = current_layer + 1;
                let entry = layer.entry(child.to_string()).or_insert(next_layer);
                if next_layer > *entry {
                    *entry = next_layer;
                }
                queue.push_back(child);
            }
        }
    }

    for node in node_order {
        layer.entry(node.clone()).or_insert(0);
    }
    layer
}

fn layout_direction(layers: &HashMap<String, u32>) -> LayoutDirection {
    let max_layer = layers.values().copied().max().unwrap_or(0);
    let mut per_layer_counts: HashMap<u32, usize> = HashMap::new();
    for layer in layers.values() {
        *per_layer_counts.entry(*layer).or_insert(0) += 1;
    }
    let is_chain = per_layer_counts.values().all(|&count| count <= 1);
    if is_chain && max_layer > CHAIN_FLIP_DEPTH {
        LayoutDirection::LeftToRight
    } else {
        LayoutDirection::TopToBottom
    }
}

/// Attempts the transition strategy first, then the aggregate strategy;
/// returns `None` if neither column shape is present or the graph fails
/// the node/edge invariant (spec §4.11b).
pub fn build(result: &QueryResult, discovery: Option<&DiscoveredProcess>) -> Option<ProcessFlow> {
    build_transition_flow(result, discovery).or_else(|| build_aggregate_flow(result, discovery))
}
