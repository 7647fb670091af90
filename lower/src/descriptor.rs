//! Accelerator tensor-descriptor construction.
//!
//! A descriptor over a fully static buffer is a single construction carrying
//! compile-time offsets. For dynamically shaped buffers the builder
//! materializes runtime dimension queries, partitions the requested offsets
//! into static and dynamic subsets, and reconstructs strides with explicit
//! arithmetic — in reverse (innermost-to-outermost) order, since only the
//! innermost stride is statically guaranteed to be 1.

use smallvec::SmallVec;
use snafu::ResultExt;
use tessel_ir::buffer::{BufferType, DescriptorType, DimSize, ValueType};
use tessel_ir::graph::{Graph, NodeId};
use tessel_ir::node::NodeKind;

use crate::error::{GraphSnafu, Result};

/// Build a descriptor for `source` at the given offsets, inserting all
/// emitted nodes before `anchor`. `buf` is the source's buffer type, already
/// checked by the caller.
pub fn build_descriptor(
    graph: &mut Graph,
    anchor: NodeId,
    source: NodeId,
    buf: &BufferType,
    offsets: &[NodeId],
    desc: DescriptorType,
) -> Result<NodeId> {
    // Partition offsets: index constants stay in the static mask, everything
    // else is passed as a runtime value.
    let mut offset_mask: SmallVec<[DimSize; 2]> = SmallVec::with_capacity(offsets.len());
    let mut dyn_offsets: SmallVec<[NodeId; 2]> = SmallVec::new();
    for &offset in offsets {
        match graph.kind(offset) {
            Some(NodeKind::IndexConst { value }) => offset_mask.push(DimSize::Static(*value)),
            _ => {
                offset_mask.push(DimSize::Dynamic);
                dyn_offsets.push(offset);
            }
        }
    }

    let (dyn_dims, dyn_strides) = if buf.has_static_shape() {
        (SmallVec::new(), SmallVec::new())
    } else {
        materialize_dynamic(graph, anchor, source, buf)?
    };

    let kind = NodeKind::MakeDescriptor { source, offsets: offset_mask, dyn_offsets, dyn_dims, dyn_strides };
    graph.insert_before(anchor, kind, Some(ValueType::Descriptor(desc))).context(GraphSnafu)
}

/// Emit runtime dimension queries and stride arithmetic for a dynamically
/// shaped buffer.
fn materialize_dynamic(
    graph: &mut Graph,
    anchor: NodeId,
    source: NodeId,
    buf: &BufferType,
) -> Result<(SmallVec<[NodeId; 2]>, SmallVec<[NodeId; 2]>)> {
    let rank = buf.rank();

    let mut dims: SmallVec<[NodeId; 4]> = SmallVec::with_capacity(rank);
    for dim in 0..rank {
        let query = graph
            .insert_before(anchor, NodeKind::DimQuery { source, dim }, Some(ValueType::Index))
            .context(GraphSnafu)?;
        dims.push(query);
    }

    let dyn_dims: SmallVec<[NodeId; 2]> = buf
        .shape
        .iter()
        .zip(&dims)
        .filter(|(size, _)| !size.is_static())
        .map(|(_, id)| *id)
        .collect();

    // Recompute strides back-to-front. The innermost stride is statically 1
    // by the lowering preconditions, so the accumulator starts there and
    // each outer stride is the running product of inner dimension sizes.
    let mut acc =
        graph.insert_before(anchor, NodeKind::IndexConst { value: 1 }, Some(ValueType::Index)).context(GraphSnafu)?;

    let mut dyn_strides: SmallVec<[NodeId; 2]> = SmallVec::new();
    for i in (0..rank.saturating_sub(1)).rev() {
        acc = graph
            .insert_before(anchor, NodeKind::IndexMul { lhs: acc, rhs: dims[i + 1] }, Some(ValueType::Index))
            .context(GraphSnafu)?;
        if !buf.strides[i].is_static() {
            dyn_strides.push(acc);
        }
    }
    // Collected innermost-first; the descriptor wants outer-to-inner order.
    dyn_strides.reverse();

    Ok((dyn_dims, dyn_strides))
}
