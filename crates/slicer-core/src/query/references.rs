//! Transitive caller / callee traversal over a built call graph.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::errors::SlicerResult;
use crate::indexer::callgraph::CallGraph;
use crate::models::NodeId;
use crate::query::guards::{
    adaptive_graph_cap, clamp_depth, MAX_GRAPH_EDGES, MAX_GRAPH_VISITED, MAX_REFERENCE_DEPTH,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkDirection {
    Callers,
    Callees,
}

/// A single traversal step produced by `walk`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WalkEntry {
    pub declaration: NodeId,
    pub depth: usize,
    /// Call expression of the edge that first reached `declaration`.
    pub via: NodeId,
}

/// BFS from `start` along call edges. Each declaration is reported once, at
/// the depth it was first reached; `start` itself is not reported.
pub fn walk(
    graph: &CallGraph<'_>,
    start: NodeId,
    direction: WalkDirection,
    max_depth: usize,
) -> SlicerResult<Vec<WalkEntry>> {
    let max_depth = clamp_depth(max_depth, MAX_REFERENCE_DEPTH);
    let max_visited = adaptive_graph_cap(graph.vertex_count(), MAX_GRAPH_VISITED, 200);
    let start = graph.vertex(start)?.declaration();

    let mut results: Vec<WalkEntry> = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    visited.insert(start);

    let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();
    queue.push_back((start, 0));

    while let Some((current, depth)) = queue.pop_front() {
        if results.len() >= MAX_GRAPH_EDGES || visited.len() >= max_visited {
            break;
        }
        if depth >= max_depth {
            continue;
        }

        let edges = match direction {
            WalkDirection::Callers => graph.edges_to(current)?,
            WalkDirection::Callees => graph.edges_from(current)?,
        };
        for edge in edges {
            if results.len() >= MAX_GRAPH_EDGES || visited.len() >= max_visited {
                break;
            }
            let next = match direction {
                WalkDirection::Callers => edge.source,
                WalkDirection::Callees => edge.target,
            };
            if !visited.insert(next) {
                continue;
            }
            results.push(WalkEntry {
                declaration: next,
                depth: depth + 1,
                via: edge.edge.call(),
            });
            queue.push_back((next, depth + 1));
        }
    }

    Ok(results)
}

/// Every declaration that may transitively call `declaration`.
pub fn transitive_callers(graph: &CallGraph<'_>, declaration: NodeId) -> SlicerResult<Vec<NodeId>> {
    Ok(walk(graph, declaration, WalkDirection::Callers, MAX_REFERENCE_DEPTH)?
        .into_iter()
        .map(|e| e.declaration)
        .collect())
}

/// Every declaration `declaration` may transitively call.
pub fn transitive_callees(graph: &CallGraph<'_>, declaration: NodeId) -> SlicerResult<Vec<NodeId>> {
    Ok(walk(graph, declaration, WalkDirection::Callees, MAX_REFERENCE_DEPTH)?
        .into_iter()
        .map(|e| e.declaration)
        .collect())
}
