//! Shared bounds for graph traversals.

pub const MAX_REFERENCE_DEPTH: usize = 32;
pub const MAX_GRAPH_VISITED: usize = 20_000;
pub const MAX_GRAPH_EDGES: usize = 50_000;

pub fn clamp_int(value: usize, minimum: usize, maximum: usize) -> usize {
    value.max(minimum).min(maximum)
}

pub fn clamp_depth(value: usize, maximum: usize) -> usize {
    clamp_int(value, 1, maximum)
}

/// Visit cap scaled to the graph: a fifth of the vertices, never below
/// `floor` nor above `base_cap`.
pub fn adaptive_graph_cap(total_vertices: usize, base_cap: usize, floor: usize) -> usize {
    let estimated = floor.max(total_vertices.max(1) / 5);
    clamp_int(estimated, floor, base_cap)
}
