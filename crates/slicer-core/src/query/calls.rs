//! Direct call queries on a built `CallGraph`.
//!
//! Declarations are looked up through vertex matching, so a declaration node
//! from another view of the same source resolves to the same vertex. Results
//! list one entry per edge, in edge insertion order.

use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::errors::SlicerResult;
use crate::indexer::callgraph::{CallEdgeRef, CallGraph};
use crate::models::NodeId;

impl CallGraph<'_> {
    fn incident_edges(&self, vertex: NodeIndex, direction: Direction) -> Vec<CallEdgeRef<'_>> {
        let mut indices: Vec<EdgeIndex> = self
            .graph
            .edges_directed(vertex, direction)
            .map(|e| e.id())
            .collect();
        indices.sort();
        indices.into_iter().filter_map(|ix| self.edge_ref(ix)).collect()
    }

    /// Edges leaving `declaration`.
    pub fn edges_from(&self, declaration: NodeId) -> SlicerResult<Vec<CallEdgeRef<'_>>> {
        let vertex = self.find_vertex(declaration)?;
        Ok(self.incident_edges(vertex, Direction::Outgoing))
    }

    /// Edges entering `declaration`.
    pub fn edges_to(&self, declaration: NodeId) -> SlicerResult<Vec<CallEdgeRef<'_>>> {
        let vertex = self.find_vertex(declaration)?;
        Ok(self.incident_edges(vertex, Direction::Incoming))
    }

    /// Target declarations of every edge created for `call`.
    pub fn call_targets(&self, call: NodeId) -> Vec<NodeId> {
        self.edges()
            .filter(|e| self.program.equals_with_range(e.edge.call(), call))
            .map(|e| e.target)
            .collect()
    }

    /// Call expressions that reach `declaration`.
    pub fn calls_to(&self, declaration: NodeId) -> SlicerResult<Vec<NodeId>> {
        Ok(self
            .edges_to(declaration)?
            .into_iter()
            .map(|e| e.edge.call())
            .collect())
    }

    /// Call expressions made by `declaration`.
    pub fn calls_from(&self, declaration: NodeId) -> SlicerResult<Vec<NodeId>> {
        Ok(self
            .edges_from(declaration)?
            .into_iter()
            .map(|e| e.edge.call())
            .collect())
    }

    pub fn callers_of(&self, declaration: NodeId) -> SlicerResult<Vec<NodeId>> {
        Ok(self
            .edges_to(declaration)?
            .into_iter()
            .map(|e| e.source)
            .collect())
    }

    pub fn callees_of(&self, declaration: NodeId) -> SlicerResult<Vec<NodeId>> {
        Ok(self
            .edges_from(declaration)?
            .into_iter()
            .map(|e| e.target)
            .collect())
    }
}
