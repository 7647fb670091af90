//! Zero-provenance tracing.
//!
//! Decides whether a value is provably a compile-time zero constant or a
//! zero-filled buffer, walking the def-use chain backward through copies,
//! views, casts and slices. When a chain passes through an op that aliases
//! storage written elsewhere (an in-place reuse without a direct value
//! dependency), the walk moves sideways to the closest preceding consumer of
//! the same value and continues from there.

use std::collections::HashSet;

use tessel_ir::graph::{Graph, NodeId};
use tessel_ir::node::NodeKind;

/// Whether the value is a scalar constant equal to the numeric zero of its
/// type. Both float zeros count.
pub fn is_const_zero(graph: &Graph, id: NodeId) -> bool {
    matches!(graph.kind(id), Some(NodeKind::Constant { value }) if value.is_zero())
}

/// Whether the value is provably a compile-time zero source.
///
/// The host graph is required to be acyclic for value dependencies; the
/// visited set below is a guard against malformed input, not a cache.
pub fn is_zero_source(graph: &Graph, id: NodeId) -> bool {
    let mut visited = HashSet::new();
    zero_source(graph, id, &mut visited)
}

fn zero_source(graph: &Graph, id: NodeId, visited: &mut HashSet<NodeId>) -> bool {
    if !visited.insert(id) {
        return false;
    }
    let Some(kind) = graph.kind(id) else {
        return false;
    };
    match kind {
        NodeKind::Constant { value } => value.is_zero(),

        // A fill is a zero source exactly when its single input is a zero
        // constant.
        NodeKind::Fill { value, .. } => is_const_zero(graph, *value),

        // Copies and views propagate provenance from their source, or from
        // the op that last wrote the same storage before them.
        NodeKind::Copy { src, .. } => {
            zero_source(graph, *src, visited) || preceding_writer_is_zero(graph, *src, id, visited)
        }
        NodeKind::Subview { src } | NodeKind::ElemCast { src } | NodeKind::Slice { src } => {
            zero_source(graph, *src, visited) || preceding_writer_is_zero(graph, *src, id, visited)
        }

        // Any other producer, emitted ops included, is not a zero source.
        _ => false,
    }
}

/// Sideways step: the consumer of `value` immediately before `current` in
/// program order. This is what connects a zero fill and a copy that alias the
/// same buffer without a direct def-use edge between them.
fn preceding_writer_is_zero(graph: &Graph, value: NodeId, current: NodeId, visited: &mut HashSet<NodeId>) -> bool {
    match graph.closest_preceding_user(value, current) {
        Some(prev) => zero_source(graph, prev, visited),
        None => false,
    }
}
