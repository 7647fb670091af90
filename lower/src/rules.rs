//! Idiom rewrite rules for the microkernel dispatch path.
//!
//! Each rule is a pure predicate-then-emit pair: it either replaces the whole
//! node with a dispatch + invoke sequence in one step, or declines with a
//! reason and leaves the node untouched. Rules never retry and never emit
//! partially.

use smallvec::{SmallVec, smallvec};
use snafu::ResultExt;
use tessel_dtype::DType;
use tessel_ir::affine::{AffineExpr, AffineMap};
use tessel_ir::body::{BodyOp, BodyValue};
use tessel_ir::buffer::ValueType;
use tessel_ir::graph::{Graph, NodeId};
use tessel_ir::node::{ComputeNode, NodeKind};
use tessel_ir::types::{BinaryFn, IteratorKind, KernelFlag, KernelKind};

use crate::access::{broadcast_flag, resolve_gemm_layout, resolve_unary_layout};
use crate::body::{has_copy_body, is_mul_acc_body, single_elementwise};
use crate::driver::RuleOutcome;
use crate::error::{GraphSnafu, Result};
use crate::zero::{is_const_zero, is_zero_source};

pub(crate) fn no_match(reason: &'static str) -> Result<RuleOutcome> {
    Ok(RuleOutcome::NoMatch { reason })
}

/// Replace `node` with a dispatch + invoke pair. The dispatch compiles the
/// kernel handle from (kind, dims, flags, element type); the invoke applies
/// the handle to the node's operands. Uses of the node's result (if any) are
/// rewired to `result`.
fn replace_with_kernel(
    graph: &mut Graph,
    node: NodeId,
    kind: KernelKind,
    dims: SmallVec<[i64; 6]>,
    flags: KernelFlag,
    elem: DType,
    operands: SmallVec<[NodeId; 4]>,
    result: Option<NodeId>,
) -> Result<()> {
    let handle = graph
        .insert_before(node, NodeKind::KernelDispatch { kind, dims, flags, elem }, Some(ValueType::KernelHandle))
        .context(GraphSnafu)?;
    graph.insert_before(node, NodeKind::KernelInvoke { kind, handle, operands }, None).context(GraphSnafu)?;
    graph.replace_node(node, result).context(GraphSnafu)
}

/// When the matched node produces an aliased result value, its uses move to
/// the named output buffer; side-effecting nodes have nothing to rewire.
fn result_alias(graph: &Graph, node: NodeId, output: NodeId) -> Option<NodeId> {
    graph.value_type(node).is_some().then_some(output)
}

// =============================================================================
// ZeroFill
// =============================================================================

/// Convert a fill to a Zero kernel, if the fill fills with zeros.
pub fn fill_to_zero(graph: &mut Graph, id: NodeId) -> Result<RuleOutcome> {
    let Some(NodeKind::Fill { value, dest }) = graph.kind(id) else {
        return no_match("not a fill operation");
    };
    let (value, dest) = (*value, *dest);

    if !is_const_zero(graph, value) {
        return no_match("fill value is not a compile-time zero");
    }
    let Some(info) = resolve_unary_layout(graph, value, dest) else {
        return no_match("operand layout does not map to a unary kernel");
    };
    let Some(elem) = graph.buffer_type(dest).map(|b| b.elem) else {
        return no_match("destination is not buffer-resident");
    };

    let result = result_alias(graph, id, dest);
    replace_with_kernel(
        graph,
        id,
        KernelKind::Zero,
        smallvec![info.m, info.n, info.ldi, info.ldo],
        KernelFlag::BcastScalar,
        elem,
        smallvec![value, dest],
        result,
    )?;
    Ok(RuleOutcome::Applied)
}

// =============================================================================
// Transpose
// =============================================================================

/// Convert a 2-D transposition to a Transpose kernel.
pub fn transpose_to_unary(graph: &mut Graph, id: NodeId) -> Result<RuleOutcome> {
    let Some(NodeKind::Transpose { input, init, perm }) = graph.kind(id) else {
        return no_match("not a transpose operation");
    };
    let (input, init) = (*input, *init);
    if perm.as_slice() != [1, 0] {
        return no_match("not a two-dimensional transposition");
    }
    if graph.buffer_type(input).map(|b| b.rank()) != Some(2) {
        return no_match("input is not a rank-2 buffer");
    }

    let Some(mut info) = resolve_unary_layout(graph, input, init) else {
        return no_match("operand layout does not map to a unary kernel");
    };
    // The transpose microkernel indexes by the input's logical shape, not
    // the output's.
    std::mem::swap(&mut info.m, &mut info.n);

    let Some(elem) = graph.buffer_type(init).map(|b| b.elem) else {
        return no_match("init is not buffer-resident");
    };

    let result = result_alias(graph, id, init);
    replace_with_kernel(
        graph,
        id,
        KernelKind::Transpose,
        smallvec![info.m, info.n, info.ldi, info.ldo],
        KernelFlag::None,
        elem,
        smallvec![input, init],
        result,
    )?;
    Ok(RuleOutcome::Applied)
}

// =============================================================================
// Elementwise compute nodes: Relu, Add, Identity
// =============================================================================

/// Node operand backing loop argument `i` (inputs first, then outputs).
fn operand_by_index(node: &ComputeNode, i: usize) -> Option<NodeId> {
    node.inputs.iter().chain(node.outputs.iter()).nth(i).copied()
}

/// Whether the max operation is a max-with-zero: a literal zero constant on
/// either side, or a loop argument whose backing operand is provably a zero
/// source — directly or through the closest preceding writer of the same
/// storage.
fn max_with_zero(graph: &Graph, id: NodeId, node: &ComputeNode, max: &BodyOp) -> bool {
    for operand in &max.operands {
        match operand {
            BodyValue::Const(c) if c.is_zero() => return true,
            BodyValue::Arg(i) => {
                let Some(value) = operand_by_index(node, *i) else {
                    continue;
                };
                if is_zero_source(graph, value) {
                    return true;
                }
                if let Some(prev) = graph.closest_preceding_user(value, id)
                    && is_zero_source(graph, prev)
                {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Shared precondition of the 2-D elementwise rules: one input, one output,
/// an all-parallel 2-D iteration space, and a buffer-resident output.
fn elementwise_preconditions(graph: &Graph, node: &ComputeNode) -> Option<&'static str> {
    if node.inputs.len() != 1 || node.outputs.len() != 1 {
        return Some("expects one input and one output");
    }
    if node.num_loops() != 2 || !node.all_parallel() {
        return Some("not a two-dimensional parallel loop nest");
    }
    if graph.buffer_type(node.outputs[0]).is_none() {
        return Some("output is not buffer-resident");
    }
    None
}

/// Finish an elementwise match: resolve the layout, read the broadcast flag
/// off the input's index map, and emit the kernel pair.
fn replace_elementwise(graph: &mut Graph, id: NodeId, node: &ComputeNode, kind: KernelKind) -> Result<RuleOutcome> {
    let (input, output) = (node.inputs[0], node.outputs[0]);
    let Some(info) = resolve_unary_layout(graph, input, output) else {
        return no_match("operand layout does not map to a unary kernel");
    };
    let Some(flags) = broadcast_flag(node.input_map(0)) else {
        return no_match("input map is not a recognized broadcast");
    };
    let Some(elem) = graph.buffer_type(output).map(|b| b.elem) else {
        return no_match("output is not buffer-resident");
    };

    let result = result_alias(graph, id, output);
    replace_with_kernel(
        graph,
        id,
        kind,
        smallvec![info.m, info.n, info.ldi, info.ldo],
        flags,
        elem,
        smallvec![input, output],
        result,
    )?;
    Ok(RuleOutcome::Applied)
}

/// Convert a compute node whose body is `max(x, 0)` to a Relu kernel.
pub fn relu_rule(graph: &mut Graph, id: NodeId) -> Result<RuleOutcome> {
    let Some(NodeKind::Compute(node)) = graph.kind(id) else {
        return no_match("not a compute node");
    };
    let node = node.clone();

    if let Some(reason) = elementwise_preconditions(graph, &node) {
        return no_match(reason);
    }
    let Some(max) = single_elementwise(&node.body, BinaryFn::Max) else {
        return no_match("body is not a single max operation");
    };
    if !max_with_zero(graph, id, &node, max) {
        return no_match("max has no provable zero operand");
    }

    replace_elementwise(graph, id, &node, KernelKind::Relu)
}

/// Convert a single-add elementwise compute node to an Add kernel.
pub fn add_rule(graph: &mut Graph, id: NodeId) -> Result<RuleOutcome> {
    let Some(NodeKind::Compute(node)) = graph.kind(id) else {
        return no_match("not a compute node");
    };
    let node = node.clone();

    if let Some(reason) = elementwise_preconditions(graph, &node) {
        return no_match(reason);
    }
    if single_elementwise(&node.body, BinaryFn::Add).is_none() {
        return no_match("body is not a single add operation");
    }

    replace_elementwise(graph, id, &node, KernelKind::Add)
}

/// Convert a pure-copy compute node to an Identity kernel. Broadcasting
/// inputs are folded into the kernel flag.
pub fn identity_rule(graph: &mut Graph, id: NodeId) -> Result<RuleOutcome> {
    let Some(NodeKind::Compute(node)) = graph.kind(id) else {
        return no_match("not a compute node");
    };
    let node = node.clone();

    if let Some(reason) = elementwise_preconditions(graph, &node) {
        return no_match(reason);
    }
    if !has_copy_body(&node.body) {
        return no_match("body is not a pure copy");
    }

    replace_elementwise(graph, id, &node, KernelKind::Identity)
}

// =============================================================================
// MatmulAccumulate
// =============================================================================

fn matmul_maps() -> [AffineMap; 3] {
    use AffineExpr::Dim;
    [
        AffineMap::new(3, [Dim(0), Dim(2)]),
        AffineMap::new(3, [Dim(2), Dim(1)]),
        AffineMap::new(3, [Dim(0), Dim(1)]),
    ]
}

/// Convert a multiply-accumulate contraction to a Gemm kernel.
pub fn matmul_rule(graph: &mut Graph, id: NodeId) -> Result<RuleOutcome> {
    let Some(NodeKind::Compute(node)) = graph.kind(id) else {
        return no_match("not a compute node");
    };
    let node = node.clone();

    if node.iterators.as_slice() != [IteratorKind::Parallel, IteratorKind::Parallel, IteratorKind::Reduction] {
        return no_match("expects (parallel, parallel, reduction) iterators");
    }
    if node.inputs.len() != 2 || node.outputs.len() != 1 {
        return no_match("expects two inputs and one output");
    }
    if node.maps.as_slice() != matmul_maps() {
        return no_match("index maps do not match matrix multiplication");
    }
    if !is_mul_acc_body(&node.body) {
        return no_match("body is not multiply-accumulate");
    }

    let (a, b, c) = (node.inputs[0], node.inputs[1], node.outputs[0]);
    let Some(info) = resolve_gemm_layout(graph, a, b, c) else {
        return no_match("operand layout does not map to the gemm kernel");
    };
    let Some(elem) = graph.buffer_type(c).map(|buf| buf.elem) else {
        return no_match("accumulator is not buffer-resident");
    };

    let result = result_alias(graph, id, c);
    replace_with_kernel(
        graph,
        id,
        KernelKind::Gemm,
        smallvec![info.m, info.n, info.k, info.lda, info.ldb, info.ldc],
        KernelFlag::None,
        elem,
        smallvec![a, b, c],
        result,
    )?;
    Ok(RuleOutcome::Applied)
}
