use smallvec::smallvec;
use tessel_dtype::DType;
use tessel_ir::affine::{AffineExpr, AffineMap};
use tessel_ir::buffer::{BufferType, DimSize, ValueType};
use tessel_ir::graph::Graph;
use tessel_ir::node::NodeKind;
use tessel_ir::types::{KernelFlag, KernelKind};

use crate::driver::RuleOutcome;
use crate::rules::{add_rule, fill_to_zero, identity_rule, matmul_rule, relu_rule, transpose_to_unary};
use crate::test::helpers::*;

/// The single dispatch/invoke pair in the graph, or a panic.
fn dispatch_invoke(graph: &Graph) -> (&NodeKind, &NodeKind) {
    let mut dispatch = None;
    let mut invoke = None;
    for node in graph.nodes() {
        match &node.kind {
            k @ NodeKind::KernelDispatch { .. } => {
                assert!(dispatch.is_none(), "more than one dispatch");
                dispatch = Some(k);
            }
            k @ NodeKind::KernelInvoke { .. } => {
                assert!(invoke.is_none(), "more than one invoke");
                invoke = Some(k);
            }
            _ => {}
        }
    }
    (dispatch.expect("missing dispatch"), invoke.expect("missing invoke"))
}

fn applied(outcome: RuleOutcome) -> bool {
    outcome == RuleOutcome::Applied
}

// =============================================================================
// ZeroFill
// =============================================================================

#[test]
fn test_fill_zero_lowering() {
    let mut g = Graph::new();
    let dest = g.alloc(static_buf(&[32, 64])).unwrap();
    let fill = fill_zero(&mut g, dest);

    assert!(applied(fill_to_zero(&mut g, fill).unwrap()));
    assert!(!g.is_live(fill));

    let (dispatch, invoke) = dispatch_invoke(&g);
    let NodeKind::KernelDispatch { kind, dims, flags, elem } = dispatch else {
        unreachable!();
    };
    assert_eq!(*kind, KernelKind::Zero);
    assert_eq!(dims.as_slice(), &[32, 64, 1, 64]);
    assert_eq!(*flags, KernelFlag::BcastScalar);
    assert_eq!(*elem, DType::Float32);

    let NodeKind::KernelInvoke { kind, operands, .. } = invoke else {
        unreachable!();
    };
    assert_eq!(*kind, KernelKind::Zero);
    assert_eq!(operands.last(), Some(&dest));
}

#[test]
fn test_fill_zero_rewires_result_uses() {
    let mut g = Graph::new();
    let dest = g.alloc(static_buf(&[32, 64])).unwrap();
    let fill = fill_zero(&mut g, dest);
    let view = g.add(NodeKind::Subview { src: fill }, Some(ValueType::Buffer(static_buf(&[32, 64])))).unwrap();

    assert!(applied(fill_to_zero(&mut g, fill).unwrap()));
    let NodeKind::Subview { src } = g.kind(view).unwrap() else {
        unreachable!();
    };
    assert_eq!(*src, dest);
}

#[test]
fn test_fill_nonzero_not_matched() {
    let mut g = Graph::new();
    let dest = g.alloc(static_buf(&[32, 64])).unwrap();
    let fill = fill_one(&mut g, dest);

    assert!(!applied(fill_to_zero(&mut g, fill).unwrap()));
    assert!(g.is_live(fill));
}

#[test]
fn test_fill_rank3_not_matched() {
    let mut g = Graph::new();
    let dest = g.alloc(static_buf(&[2, 32, 64])).unwrap();
    let fill = fill_zero(&mut g, dest);
    assert!(!applied(fill_to_zero(&mut g, fill).unwrap()));
}

// =============================================================================
// Transpose
// =============================================================================

#[test]
fn test_transpose_lowering_swaps_dims() {
    let mut g = Graph::new();
    let input = g.alloc(static_buf(&[64, 32])).unwrap();
    let init = g.alloc(static_buf(&[32, 64])).unwrap();
    let tp = g.add(NodeKind::Transpose { input, init, perm: smallvec![1, 0] }, None).unwrap();

    assert!(applied(transpose_to_unary(&mut g, tp).unwrap()));

    let (dispatch, invoke) = dispatch_invoke(&g);
    let NodeKind::KernelDispatch { kind, dims, flags, .. } = dispatch else {
        unreachable!();
    };
    assert_eq!(*kind, KernelKind::Transpose);
    // m/n swapped post-resolution: the kernel indexes by the input's shape.
    assert_eq!(dims.as_slice(), &[64, 32, 32, 64]);
    assert_eq!(*flags, KernelFlag::None);

    let NodeKind::KernelInvoke { operands, .. } = invoke else {
        unreachable!();
    };
    assert_eq!(operands.as_slice(), &[input, init]);
}

#[test]
fn test_transpose_identity_perm_not_matched() {
    let mut g = Graph::new();
    let input = g.alloc(static_buf(&[32, 64])).unwrap();
    let init = g.alloc(static_buf(&[32, 64])).unwrap();
    let tp = g.add(NodeKind::Transpose { input, init, perm: smallvec![0, 1] }, None).unwrap();
    assert!(!applied(transpose_to_unary(&mut g, tp).unwrap()));
}

// =============================================================================
// Relu
// =============================================================================

#[test]
fn test_relu_lowering() {
    let mut g = Graph::new();
    let input = g.alloc(static_buf(&[32, 64])).unwrap();
    let output = g.alloc(static_buf(&[32, 64])).unwrap();
    let relu = compute_2d(&mut g, input, output, AffineMap::identity(2), relu_body());

    assert!(applied(relu_rule(&mut g, relu).unwrap()));

    let (dispatch, invoke) = dispatch_invoke(&g);
    let NodeKind::KernelDispatch { kind, dims, flags, .. } = dispatch else {
        unreachable!();
    };
    assert_eq!(*kind, KernelKind::Relu);
    assert_eq!(dims.as_slice(), &[32, 64, 64, 64]);
    assert_eq!(*flags, KernelFlag::None);

    let NodeKind::KernelInvoke { operands, .. } = invoke else {
        unreachable!();
    };
    assert_eq!(operands.as_slice(), &[input, output]);
}

#[test]
fn test_relu_col_broadcast_input() {
    // Rank-1 input repeated along the outer loop: (d0, d1) -> (d1).
    let mut g = Graph::new();
    let input = g.alloc(static_buf(&[64])).unwrap();
    let output = g.alloc(static_buf(&[32, 64])).unwrap();
    let map = AffineMap::new(2, [AffineExpr::Dim(1)]);
    let relu = compute_2d(&mut g, input, output, map, relu_body());

    assert!(applied(relu_rule(&mut g, relu).unwrap()));

    let (dispatch, _) = dispatch_invoke(&g);
    let NodeKind::KernelDispatch { flags, dims, .. } = dispatch else {
        unreachable!();
    };
    assert_eq!(*flags, KernelFlag::BcastCol);
    assert_eq!(dims.as_slice(), &[32, 64, 1, 64]);
}

#[test]
fn test_relu_zero_via_aliased_operand() {
    // max(arg0, arg1) where arg1's backing buffer was zero-filled in place:
    // the zero side is only visible through the preceding-user search.
    let mut g = Graph::new();
    let input = g.alloc(static_buf(&[32, 64])).unwrap();
    let output = g.alloc(static_buf(&[32, 64])).unwrap();
    let _fill = fill_zero(&mut g, output);
    let relu = compute_2d(&mut g, input, output, AffineMap::identity(2), max_args_body());

    assert!(applied(relu_rule(&mut g, relu).unwrap()));
}

#[test]
fn test_relu_without_zero_not_matched() {
    let mut g = Graph::new();
    let input = g.alloc(static_buf(&[32, 64])).unwrap();
    let output = g.alloc(static_buf(&[32, 64])).unwrap();
    let relu = compute_2d(&mut g, input, output, AffineMap::identity(2), max_args_body());

    assert!(!applied(relu_rule(&mut g, relu).unwrap()));
    assert!(g.is_live(relu));
}

#[test]
fn test_relu_transposed_input_map_not_matched() {
    let mut g = Graph::new();
    let input = g.alloc(static_buf(&[64, 32])).unwrap();
    let output = g.alloc(static_buf(&[32, 64])).unwrap();
    let relu = compute_2d(&mut g, input, output, AffineMap::permutation(&[1, 0]), relu_body());
    assert!(!applied(relu_rule(&mut g, relu).unwrap()));
}

// =============================================================================
// Add / Identity
// =============================================================================

#[test]
fn test_add_lowering() {
    let mut g = Graph::new();
    let input = g.alloc(static_buf(&[32, 64])).unwrap();
    let output = g.alloc(static_buf(&[32, 64])).unwrap();
    let add = compute_2d(&mut g, input, output, AffineMap::identity(2), add_body());

    assert!(applied(add_rule(&mut g, add).unwrap()));

    let (dispatch, _) = dispatch_invoke(&g);
    let NodeKind::KernelDispatch { kind, dims, .. } = dispatch else {
        unreachable!();
    };
    assert_eq!(*kind, KernelKind::Add);
    assert_eq!(dims.as_slice(), &[32, 64, 64, 64]);
}

#[test]
fn test_identity_lowering_row_broadcast() {
    // (d0, d1) -> (d0, 0): one column repeated across rows.
    let mut g = Graph::new();
    let col = BufferType::new(
        DType::Float32,
        [DimSize::Static(32), DimSize::Static(1)],
        [DimSize::Static(1), DimSize::Static(1)],
        DimSize::Static(0),
    );
    let input = g.alloc(col).unwrap();
    let output = g.alloc(static_buf(&[32, 64])).unwrap();
    let map = AffineMap::new(2, [AffineExpr::Dim(0), AffineExpr::Zero]);
    let copy = compute_2d(&mut g, input, output, map, copy_body());

    assert!(applied(identity_rule(&mut g, copy).unwrap()));

    let (dispatch, _) = dispatch_invoke(&g);
    let NodeKind::KernelDispatch { kind, flags, .. } = dispatch else {
        unreachable!();
    };
    assert_eq!(*kind, KernelKind::Identity);
    assert_eq!(*flags, KernelFlag::BcastRow);
}

#[test]
fn test_identity_rejects_compute_with_body_ops() {
    let mut g = Graph::new();
    let input = g.alloc(static_buf(&[32, 64])).unwrap();
    let output = g.alloc(static_buf(&[32, 64])).unwrap();
    let add = compute_2d(&mut g, input, output, AffineMap::identity(2), add_body());
    assert!(!applied(identity_rule(&mut g, add).unwrap()));
}

#[test]
fn test_add_rejects_reduction_iterator() {
    use tessel_ir::node::ComputeNode;
    use tessel_ir::types::IteratorKind;

    let mut g = Graph::new();
    let input = g.alloc(static_buf(&[32, 64])).unwrap();
    let output = g.alloc(static_buf(&[32, 64])).unwrap();
    let node = ComputeNode {
        iterators: smallvec![IteratorKind::Parallel, IteratorKind::Reduction],
        maps: smallvec![AffineMap::identity(2), AffineMap::identity(2)],
        inputs: smallvec![input],
        outputs: smallvec![output],
        body: add_body(),
        library_call: None,
    };
    let id = g.add(NodeKind::Compute(node), None).unwrap();
    assert!(!applied(add_rule(&mut g, id).unwrap()));
}

// =============================================================================
// MatmulAccumulate
// =============================================================================

#[test]
fn test_matmul_lowering() {
    let mut g = Graph::new();
    let a = g.alloc(static_buf(&[32, 48])).unwrap();
    let b = g.alloc(static_buf(&[48, 64])).unwrap();
    let c = g.alloc(static_buf(&[32, 64])).unwrap();
    let mm = matmul_node(&mut g, a, b, c, mul_acc_body(false, false, 0));

    assert!(applied(matmul_rule(&mut g, mm).unwrap()));

    let (dispatch, invoke) = dispatch_invoke(&g);
    let NodeKind::KernelDispatch { kind, dims, flags, .. } = dispatch else {
        unreachable!();
    };
    assert_eq!(*kind, KernelKind::Gemm);
    assert_eq!(dims.as_slice(), &[32, 64, 48, 48, 64, 64]);
    assert_eq!(*flags, KernelFlag::None);

    let NodeKind::KernelInvoke { operands, .. } = invoke else {
        unreachable!();
    };
    assert_eq!(operands.as_slice(), &[a, b, c]);
}

#[test]
fn test_matmul_swapped_body_operands_still_match() {
    let mut g = Graph::new();
    let a = g.alloc(static_buf(&[32, 48])).unwrap();
    let b = g.alloc(static_buf(&[48, 64])).unwrap();
    let c = g.alloc(static_buf(&[32, 64])).unwrap();
    let mm = matmul_node(&mut g, a, b, c, mul_acc_body(true, true, 2));
    assert!(applied(matmul_rule(&mut g, mm).unwrap()));
}

#[test]
fn test_matmul_wrong_maps_not_matched() {
    use tessel_ir::node::ComputeNode;
    use tessel_ir::types::IteratorKind;

    let mut g = Graph::new();
    let a = g.alloc(static_buf(&[32, 48])).unwrap();
    let b = g.alloc(static_buf(&[48, 64])).unwrap();
    let c = g.alloc(static_buf(&[32, 64])).unwrap();
    // B indexed as (d1, d2): not the matmul access pattern.
    let node = ComputeNode {
        iterators: smallvec![IteratorKind::Parallel, IteratorKind::Parallel, IteratorKind::Reduction],
        maps: smallvec![
            AffineMap::new(3, [AffineExpr::Dim(0), AffineExpr::Dim(2)]),
            AffineMap::new(3, [AffineExpr::Dim(1), AffineExpr::Dim(2)]),
            AffineMap::new(3, [AffineExpr::Dim(0), AffineExpr::Dim(1)]),
        ],
        inputs: smallvec![a, b],
        outputs: smallvec![c],
        body: mul_acc_body(false, false, 0),
        library_call: None,
    };
    let id = g.add(NodeKind::Compute(node), None).unwrap();
    assert!(!applied(matmul_rule(&mut g, id).unwrap()));
}

#[test]
fn test_matmul_elementwise_body_not_matched() {
    let mut g = Graph::new();
    let a = g.alloc(static_buf(&[32, 48])).unwrap();
    let b = g.alloc(static_buf(&[48, 64])).unwrap();
    let c = g.alloc(static_buf(&[32, 64])).unwrap();

    // Right access pattern, wrong body (no multiply).
    let f = DType::Float32;
    let mut builder = tessel_ir::BodyBuilder::new(3);
    let add = builder
        .binary(tessel_ir::BinaryFn::Add, tessel_ir::BodyValue::Arg(2), tessel_ir::BodyValue::Arg(0), f)
        .unwrap();
    let body = builder.yield_value(add).unwrap();
    let mm = matmul_node(&mut g, a, b, c, body);
    assert!(!applied(matmul_rule(&mut g, mm).unwrap()));
}
