//! Affine access analysis and memory-layout resolution.
//!
//! [`classify_broadcast`] reads a 2-D operand's index map and decides how the
//! operand repeats over the iteration space. [`resolve_unary_layout`] and
//! [`resolve_gemm_layout`] reconcile logical shape/strides with the narrower
//! parameter set a microkernel dispatch accepts: dimension sizes plus one
//! leading dimension per buffer operand.

use tessel_ir::graph::{Graph, NodeId};
use tessel_ir::{AffineMap, KernelFlag};

/// How an operand's index map repeats it along the node's iteration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BroadcastKind {
    None,
    Scalar,
    Row,
    Col,
}

impl BroadcastKind {
    pub const fn flag(self) -> KernelFlag {
        match self {
            Self::None => KernelFlag::None,
            Self::Scalar => KernelFlag::BcastScalar,
            Self::Row => KernelFlag::BcastRow,
            Self::Col => KernelFlag::BcastCol,
        }
    }
}

/// Classify an index map over a 2-D iteration space.
///
/// ```text
/// (d0, d1) -> (d0, d1)  =>  None
/// (d0, d1) -> (0, d1)   =>  Col
/// (d0, d1) -> (d0, 0)   =>  Row
/// (d0, d1) -> ()        =>  Scalar
/// ```
///
/// Lower-rank maps are left-padded with zero markers first, so
/// `(d0, d1) -> (d1)` classifies the same as `(d0, d1) -> (0, d1)`.
/// Returns `None` for symbolic maps, non-2-D iteration spaces, maps that are
/// not a projected permutation, and maps broadcasting more than one
/// dimension.
pub fn classify_broadcast(map: &AffineMap) -> Option<BroadcastKind> {
    if map.has_symbols() || map.num_results() > map.num_dims() || map.num_dims() != 2 {
        return None;
    }

    if map.num_results() == 0 {
        return Some(BroadcastKind::Scalar);
    }

    let padded = map.left_pad_to_dims();
    if !padded.is_projected_permutation(/* allow_zeros */ true) {
        return None;
    }

    let broadcast = padded.minor_identity_broadcast_dims()?;
    match broadcast.as_slice() {
        [] => Some(BroadcastKind::None),
        // The broadcast position selects the kernel flag: repeating along the
        // outer dimension broadcasts columns into rows and vice versa.
        [0] => Some(BroadcastKind::Col),
        [1] => Some(BroadcastKind::Row),
        _ => None,
    }
}

/// Broadcast flag for a dispatch call, straight from the operand's map.
pub fn broadcast_flag(map: &AffineMap) -> Option<KernelFlag> {
    classify_broadcast(map).map(BroadcastKind::flag)
}

/// Dimension parameters of a 2-D unary kernel call: `m`/`n` are the output's
/// rows and columns, `ldi`/`ldo` the leading dimensions of input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnaryInfo {
    pub m: i64,
    pub n: i64,
    pub ldi: i64,
    pub ldo: i64,
}

/// Derive [`UnaryInfo`] from an input/output operand pair.
///
/// The output must be a rank-2 buffer with static shape and strides; the
/// input may be a buffer or a scalar constant (leading dimension 1). Any
/// buffer operand whose innermost stride is not statically 1 is rejected —
/// such layouts cannot map to the microkernel call convention.
pub fn resolve_unary_layout(graph: &Graph, input: NodeId, output: NodeId) -> Option<UnaryInfo> {
    let out = graph.buffer_type(output)?;
    if out.rank() != 2 {
        return None;
    }
    let out_shape = out.static_shape()?;
    let out_strides = out.static_strides()?;
    if *out_strides.last()? != 1 {
        return None;
    }

    let mut ldi = 1;
    if let Some(inb) = graph.buffer_type(input) {
        let in_strides = inb.static_strides()?;
        if *in_strides.last()? != 1 {
            return None;
        }
        ldi = in_strides[0];
    }

    Some(UnaryInfo { m: out_shape[0], n: out_shape[1], ldi, ldo: out_strides[0] })
}

/// Dimension parameters of a GEMM dispatch: `C[m,n] += A[m,k] * B[k,n]`
/// plus one leading dimension per operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GemmInfo {
    pub m: i64,
    pub n: i64,
    pub k: i64,
    pub lda: i64,
    pub ldb: i64,
    pub ldc: i64,
}

/// Derive [`GemmInfo`] from the three operands of a matched matmul node.
/// All operands must be static rank-2 buffers with unit innermost stride and
/// consistent contraction shapes.
pub fn resolve_gemm_layout(graph: &Graph, a: NodeId, b: NodeId, c: NodeId) -> Option<GemmInfo> {
    let mut dims = [(0i64, 0i64); 3];
    let mut lds = [0i64; 3];
    for (slot, operand) in [a, b, c].into_iter().enumerate() {
        let buf = graph.buffer_type(operand)?;
        if buf.rank() != 2 {
            return None;
        }
        let shape = buf.static_shape()?;
        let strides = buf.static_strides()?;
        if *strides.last()? != 1 {
            return None;
        }
        dims[slot] = (shape[0], shape[1]);
        lds[slot] = strides[0];
    }

    let (m, k) = dims[0];
    let (_, n) = dims[1];
    if dims[1].0 != k || dims[2] != (m, n) {
        return None;
    }

    Some(GemmInfo { m, n, k, lda: lds[0], ldb: lds[1], ldc: lds[2] })
}
