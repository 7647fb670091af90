use tessel_dtype::DType;
use tessel_ir::affine::AffineMap;
use tessel_ir::buffer::{BufferType, DimSize, ValueType, VectorType};
use tessel_ir::graph::{Graph, NodeId};
use tessel_ir::node::NodeKind;
use tessel_ir::types::ConstValue;

use crate::driver::RuleOutcome;
use crate::test::helpers::static_buf;
use crate::transfer::transfer_read_rule;

struct ReadSpec {
    buf: BufferType,
    vec: VectorType,
    map: AffineMap,
    masked: bool,
    out_of_bounds: bool,
    zero_pad: bool,
}

impl ReadSpec {
    fn plain(shape: &[i64], vec_dims: &[i64], map: AffineMap) -> Self {
        Self {
            buf: static_buf(shape),
            vec: VectorType::new(DType::Float32, vec_dims.iter().copied()),
            map,
            masked: false,
            out_of_bounds: false,
            zero_pad: false,
        }
    }
}

/// Build the read node and return (graph, read id).
fn build_read(spec: ReadSpec) -> (Graph, NodeId) {
    let mut g = Graph::new();
    let src = g.alloc(spec.buf.clone()).unwrap();
    let offsets: smallvec::SmallVec<[NodeId; 2]> =
        (0..spec.buf.rank()).map(|_| g.index_const(0).unwrap()).collect();
    let padding = spec
        .zero_pad
        .then(|| g.constant(ConstValue::Float(0.0), DType::Float32).unwrap());
    let read = g
        .add(
            NodeKind::TransferRead {
                source: src,
                offsets,
                map: spec.map,
                padding,
                masked: spec.masked,
                out_of_bounds: spec.out_of_bounds,
            },
            Some(ValueType::Vector(spec.vec)),
        )
        .unwrap();
    (g, read)
}

fn applied(outcome: RuleOutcome) -> bool {
    outcome == RuleOutcome::Applied
}

fn find_load(graph: &Graph) -> Option<&NodeKind> {
    graph.nodes().map(|n| &n.kind).find(|k| matches!(k, NodeKind::DescriptorLoad { .. }))
}

fn find_descriptor(graph: &Graph) -> Option<(&NodeKind, &ValueType)> {
    graph
        .nodes()
        .find(|n| matches!(n.kind, NodeKind::MakeDescriptor { .. }))
        .map(|n| (&n.kind, n.ty.as_ref().unwrap()))
}

#[test]
fn test_identity_read_lowering() {
    let (mut g, read) = build_read(ReadSpec::plain(&[8, 16], &[8, 16], AffineMap::identity(2)));
    assert!(applied(transfer_read_rule(&mut g, read).unwrap()));
    assert!(!g.is_live(read));

    let NodeKind::DescriptorLoad { transposed, hint, .. } = find_load(&g).unwrap() else {
        unreachable!();
    };
    assert!(!transposed);
    assert!(hint.is_none());

    let (_, ValueType::Descriptor(desc)) = find_descriptor(&g).unwrap() else {
        unreachable!();
    };
    assert_eq!(desc.dims.as_slice(), &[8, 16]);
    assert!(!desc.boundary_check);
    assert_eq!(desc.array_length, 1);
}

#[test]
fn test_read_result_uses_rewired_to_load() {
    let (mut g, read) = build_read(ReadSpec::plain(&[8, 16], &[8, 16], AffineMap::identity(2)));
    // A consumer of the read's vector value.
    let consumer = g.add(NodeKind::ElemCast { src: read }, Some(ValueType::Vector(VectorType::new(DType::Float64, [8, 16])))).unwrap();

    assert!(applied(transfer_read_rule(&mut g, read).unwrap()));
    let NodeKind::ElemCast { src } = g.kind(consumer).unwrap() else {
        unreachable!();
    };
    assert!(matches!(g.kind(*src), Some(NodeKind::DescriptorLoad { .. })));
}

#[test]
fn test_transposed_read_reverses_descriptor_shape() {
    let (mut g, read) = build_read(ReadSpec::plain(&[16, 8], &[8, 16], AffineMap::permutation(&[1, 0])));
    assert!(applied(transfer_read_rule(&mut g, read).unwrap()));

    let NodeKind::DescriptorLoad { transposed, .. } = find_load(&g).unwrap() else {
        unreachable!();
    };
    assert!(transposed);

    // The descriptor describes the source-shaped tile; the load reorders.
    let (_, ValueType::Descriptor(desc)) = find_descriptor(&g).unwrap() else {
        unreachable!();
    };
    assert_eq!(desc.dims.as_slice(), &[16, 8]);
}

#[test]
fn test_transposed_narrow_element_rejected() {
    let mut spec = ReadSpec::plain(&[16, 8], &[8, 16], AffineMap::permutation(&[1, 0]));
    spec.buf = BufferType::contiguous(DType::Float16, [DimSize::Static(16), DimSize::Static(8)]);
    spec.vec = VectorType::new(DType::Float16, [8, 16]);
    let (mut g, read) = build_read(spec);

    assert!(!applied(transfer_read_rule(&mut g, read).unwrap()));
    assert!(g.is_live(read));
}

#[test]
fn test_masked_read_rejected() {
    let mut spec = ReadSpec::plain(&[8, 16], &[8, 16], AffineMap::identity(2));
    spec.masked = true;
    let (mut g, read) = build_read(spec);
    assert!(!applied(transfer_read_rule(&mut g, read).unwrap()));
}

#[test]
fn test_rank3_vector_rejected() {
    let (mut g, read) = build_read(ReadSpec::plain(&[2, 8, 16], &[2, 8, 16], AffineMap::identity(3)));
    assert!(!applied(transfer_read_rule(&mut g, read).unwrap()));
}

#[test]
fn test_non_unit_inner_stride_rejected() {
    let mut spec = ReadSpec::plain(&[8, 16], &[8, 16], AffineMap::identity(2));
    spec.buf = BufferType::new(
        DType::Float32,
        [DimSize::Static(8), DimSize::Static(16)],
        [DimSize::Static(32), DimSize::Static(2)],
        DimSize::Static(0),
    );
    let (mut g, read) = build_read(spec);
    assert!(!applied(transfer_read_rule(&mut g, read).unwrap()));
}

#[test]
fn test_outer_dimension_access_rejected() {
    use tessel_ir::affine::AffineExpr::Dim;
    // Rank-3 source, 2-D vector over (d0, d2): d0 is not innermost.
    let map = AffineMap::new(3, [Dim(0), Dim(2)]);
    let (mut g, read) = build_read(ReadSpec::plain(&[4, 8, 16], &[4, 16], map));
    assert!(!applied(transfer_read_rule(&mut g, read).unwrap()));
}

#[test]
fn test_inner_1d_read_allowed() {
    use tessel_ir::affine::AffineExpr::Dim;
    let map = AffineMap::new(2, [Dim(1)]);
    let (mut g, read) = build_read(ReadSpec::plain(&[8, 16], &[16], map));
    assert!(applied(transfer_read_rule(&mut g, read).unwrap()));

    let NodeKind::DescriptorLoad { transposed, .. } = find_load(&g).unwrap() else {
        unreachable!();
    };
    assert!(!transposed);
}

#[test]
fn test_out_of_bounds_requires_zero_padding() {
    let mut spec = ReadSpec::plain(&[8, 16], &[8, 16], AffineMap::identity(2));
    spec.out_of_bounds = true;
    let (mut g, read) = build_read(spec);
    // No padding value at all.
    assert!(!applied(transfer_read_rule(&mut g, read).unwrap()));

    let mut spec = ReadSpec::plain(&[8, 16], &[8, 16], AffineMap::identity(2));
    spec.out_of_bounds = true;
    spec.zero_pad = true;
    let (mut g, read) = build_read(spec);
    assert!(applied(transfer_read_rule(&mut g, read).unwrap()));

    let (_, ValueType::Descriptor(desc)) = find_descriptor(&g).unwrap() else {
        unreachable!();
    };
    assert!(desc.boundary_check);
}

#[test]
fn test_dynamic_source_emits_runtime_values() {
    let mut spec = ReadSpec::plain(&[8, 64], &[8, 16], AffineMap::identity(2));
    spec.buf = BufferType::new(
        DType::Float32,
        [DimSize::Dynamic, DimSize::Static(64)],
        [DimSize::Dynamic, DimSize::Static(1)],
        DimSize::Static(0),
    );
    let (mut g, read) = build_read(spec);
    assert!(applied(transfer_read_rule(&mut g, read).unwrap()));

    let (NodeKind::MakeDescriptor { dyn_dims, dyn_strides, .. }, _) = find_descriptor(&g).unwrap() else {
        unreachable!();
    };
    assert_eq!(dyn_dims.len(), 1);
    assert_eq!(dyn_strides.len(), 1);
    assert!(g.nodes().any(|n| matches!(n.kind, NodeKind::DimQuery { .. })));
}
