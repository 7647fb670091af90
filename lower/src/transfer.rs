//! Accelerator transfer-read lowering.
//!
//! A vector transfer read from a buffer becomes a tensor-descriptor
//! construction plus a descriptor load, provided the access is expressible in
//! the descriptor convention: unmasked, 1-D or 2-D result, contiguous
//! innermost dimension, and a permutation map touching only the innermost
//! source dimensions. Out-of-bounds reads are lowerable only when padded with
//! a compile-time zero; a non-identity permutation becomes a transposed load
//! and requires an element width of at least 32 bits.

use snafu::ResultExt;
use tessel_ir::affine::AffineExpr;
use tessel_ir::buffer::{DescriptorType, MemScope, ValueType};
use tessel_ir::graph::{Graph, NodeId};
use tessel_ir::node::NodeKind;

use crate::descriptor::build_descriptor;
use crate::driver::RuleOutcome;
use crate::error::{GraphSnafu, Result};
use crate::rules::no_match;
use crate::zero::is_const_zero;

/// Transposed loads narrower than this cannot be handled by the hardware.
const MIN_TRANSPOSE_BITS: usize = 32;

/// Lower a transfer read to a descriptor construction plus a load.
pub fn transfer_read_rule(graph: &mut Graph, id: NodeId) -> Result<RuleOutcome> {
    let Some(NodeKind::TransferRead { source, offsets, map, padding, masked, out_of_bounds }) = graph.kind(id) else {
        return no_match("not a transfer read");
    };
    let (source, offsets, map, padding, masked, out_of_bounds) =
        (*source, offsets.clone(), map.clone(), *padding, *masked, *out_of_bounds);

    if masked {
        return no_match("masked transfer is not supported");
    }
    let Some(buf) = graph.buffer_type(source).cloned() else {
        return no_match("expects a buffer source");
    };
    let Some(vec_ty) = graph.value_type(id).and_then(ValueType::as_vector).cloned() else {
        return no_match("expects a vector result");
    };
    let rank = vec_ty.rank();
    if !(1..=2).contains(&rank) {
        return no_match("expects a 1-D or 2-D vector result");
    }
    if !buf.has_unit_inner_stride() {
        return no_match("buffer must be contiguous in the innermost dimension");
    }
    if !map.is_projected_permutation(/* allow_zeros */ false) {
        return no_match("unsupported permutation map");
    }
    if map.num_results() < rank {
        return no_match("permutation map does not cover the vector rank");
    }
    // Only the innermost source dimensions can feed the descriptor tile.
    let inner_start = map.num_dims() - rank;
    for expr in &map.results()[map.num_results() - rank..] {
        match expr {
            AffineExpr::Dim(d) if *d >= inner_start => {}
            _ => return no_match("only innermost dimensions can be accessed"),
        }
    }
    if out_of_bounds {
        let zero_padded = padding.is_some_and(|p| is_const_zero(graph, p));
        if !zero_padded {
            return no_match("unsupported non-zero padded out-of-bounds access");
        }
    }

    let transposed = !map.is_minor_identity();
    if transposed && vec_ty.elem.bits() < MIN_TRANSPOSE_BITS {
        return no_match("unsupported element type for transposition");
    }

    // A transposed load reads the source-shaped tile; the descriptor gets
    // the base shape, the load reorders into the vector shape.
    let mut desc_dims = vec_ty.dims.clone();
    if transposed {
        desc_dims.reverse();
    }
    let desc_ty = DescriptorType {
        elem: vec_ty.elem,
        dims: desc_dims,
        scope: MemScope::Global,
        array_length: 1,
        boundary_check: out_of_bounds,
    };

    let desc = build_descriptor(graph, id, source, &buf, &offsets, desc_ty)?;
    let load = graph
        .insert_before(id, NodeKind::DescriptorLoad { desc, transposed, hint: None }, Some(ValueType::Vector(vec_ty)))
        .context(GraphSnafu)?;
    graph.replace_node(id, Some(load)).context(GraphSnafu)?;
    Ok(RuleOutcome::Applied)
}
