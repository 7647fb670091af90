//! Node kinds of the operation graph.
//!
//! [`NodeKind`] is a closed sum over the finite set of operations the
//! lowering engine inspects or emits. Dispatching on it is always an
//! exhaustive `match` with an explicit default arm at the use sites — never
//! an open-ended downcast chain.

use smallvec::SmallVec;
use tessel_dtype::DType;

use crate::affine::AffineMap;
use crate::body::Body;
use crate::buffer::DimSize;
use crate::graph::NodeId;
use crate::types::{CacheHint, ConstValue, IteratorKind, KernelFlag, KernelKind};

/// A structured array computation: per-dimension iterator kinds, one affine
/// index map per operand (inputs first, then outputs), and a scalar body.
#[derive(Debug, Clone)]
pub struct ComputeNode {
    pub iterators: SmallVec<[IteratorKind; 3]>,
    pub maps: SmallVec<[AffineMap; 3]>,
    pub inputs: SmallVec<[NodeId; 2]>,
    pub outputs: SmallVec<[NodeId; 1]>,
    pub body: Body,
    /// Optional external library-call annotation (`ukr.` prefix convention).
    pub library_call: Option<String>,
}

impl ComputeNode {
    pub fn num_loops(&self) -> usize {
        self.iterators.len()
    }

    pub fn all_parallel(&self) -> bool {
        self.iterators.iter().all(IteratorKind::is_parallel)
    }

    pub fn operand_count(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    /// Index map of input operand `i`.
    pub fn input_map(&self, i: usize) -> &AffineMap {
        &self.maps[i]
    }

    /// Index map of output operand `i`.
    pub fn output_map(&self, i: usize) -> &AffineMap {
        &self.maps[self.inputs.len() + i]
    }
}

/// Operation kind plus operand linkage.
#[derive(Debug, Clone)]
pub enum NodeKind {
    // Graph sources.
    Argument { index: usize },
    Alloc,
    Constant { value: ConstValue },

    // Array operations the rules classify.
    Fill { value: NodeId, dest: NodeId },
    Copy { src: NodeId, dest: NodeId },
    Subview { src: NodeId },
    ElemCast { src: NodeId },
    Slice { src: NodeId },
    Transpose { input: NodeId, init: NodeId, perm: SmallVec<[usize; 2]> },
    Compute(ComputeNode),
    TransferRead {
        source: NodeId,
        offsets: SmallVec<[NodeId; 2]>,
        map: AffineMap,
        /// Fill value for positions read outside the source bounds.
        padding: Option<NodeId>,
        masked: bool,
        out_of_bounds: bool,
    },

    // Microkernel dialect (emitted, never matched).
    KernelDispatch { kind: KernelKind, dims: SmallVec<[i64; 6]>, flags: KernelFlag, elem: DType },
    KernelInvoke { kind: KernelKind, handle: NodeId, operands: SmallVec<[NodeId; 4]> },

    // Accelerator dialect (emitted, never matched).
    IndexConst { value: i64 },
    DimQuery { source: NodeId, dim: usize },
    IndexMul { lhs: NodeId, rhs: NodeId },
    MakeDescriptor {
        source: NodeId,
        /// Static offset mask; `Dynamic` entries are supplied by `dyn_offsets`.
        offsets: SmallVec<[DimSize; 2]>,
        dyn_offsets: SmallVec<[NodeId; 2]>,
        dyn_dims: SmallVec<[NodeId; 2]>,
        dyn_strides: SmallVec<[NodeId; 2]>,
    },
    DescriptorLoad { desc: NodeId, transposed: bool, hint: Option<CacheHint> },
}

impl NodeKind {
    /// All operand references, in declaration order.
    pub fn operands(&self) -> SmallVec<[NodeId; 4]> {
        match self {
            Self::Argument { .. } | Self::Alloc | Self::Constant { .. } | Self::IndexConst { .. } => SmallVec::new(),
            Self::KernelDispatch { .. } => SmallVec::new(),

            Self::Fill { value, dest } => SmallVec::from_slice(&[*value, *dest]),
            Self::Copy { src, dest } => SmallVec::from_slice(&[*src, *dest]),
            Self::Subview { src } | Self::ElemCast { src } | Self::Slice { src } => SmallVec::from_slice(&[*src]),
            Self::Transpose { input, init, .. } => SmallVec::from_slice(&[*input, *init]),
            Self::Compute(node) => node.inputs.iter().chain(node.outputs.iter()).copied().collect(),
            Self::TransferRead { source, offsets, padding, .. } => {
                let mut ops = SmallVec::from_slice(&[*source]);
                ops.extend(offsets.iter().copied());
                ops.extend(*padding);
                ops
            }

            Self::KernelInvoke { handle, operands, .. } => {
                let mut ops = SmallVec::from_slice(&[*handle]);
                ops.extend(operands.iter().copied());
                ops
            }

            Self::DimQuery { source, .. } => SmallVec::from_slice(&[*source]),
            Self::IndexMul { lhs, rhs } => SmallVec::from_slice(&[*lhs, *rhs]),
            Self::MakeDescriptor { source, dyn_offsets, dyn_dims, dyn_strides, .. } => {
                let mut ops = SmallVec::from_slice(&[*source]);
                ops.extend(dyn_offsets.iter().copied());
                ops.extend(dyn_dims.iter().copied());
                ops.extend(dyn_strides.iter().copied());
                ops
            }
            Self::DescriptorLoad { desc, .. } => SmallVec::from_slice(&[*desc]),
        }
    }

    /// Mutable references to all operand slots, for use-rewiring.
    pub(crate) fn operands_mut(&mut self) -> SmallVec<[&mut NodeId; 4]> {
        match self {
            Self::Argument { .. } | Self::Alloc | Self::Constant { .. } | Self::IndexConst { .. } => SmallVec::new(),
            Self::KernelDispatch { .. } => SmallVec::new(),

            Self::Fill { value, dest } => SmallVec::from_iter([value, dest]),
            Self::Copy { src, dest } => SmallVec::from_iter([src, dest]),
            Self::Subview { src } | Self::ElemCast { src } | Self::Slice { src } => SmallVec::from_iter([src]),
            Self::Transpose { input, init, .. } => SmallVec::from_iter([input, init]),
            Self::Compute(node) => node.inputs.iter_mut().chain(node.outputs.iter_mut()).collect(),
            Self::TransferRead { source, offsets, padding, .. } => {
                let mut ops = SmallVec::<[&mut NodeId; 4]>::from_iter([source]);
                ops.extend(offsets.iter_mut());
                ops.extend(padding.as_mut());
                ops
            }

            Self::KernelInvoke { handle, operands, .. } => {
                let mut ops = SmallVec::<[&mut NodeId; 4]>::from_iter([handle]);
                ops.extend(operands.iter_mut());
                ops
            }

            Self::DimQuery { source, .. } => SmallVec::from_iter([source]),
            Self::IndexMul { lhs, rhs } => SmallVec::from_iter([lhs, rhs]),
            Self::MakeDescriptor { source, dyn_offsets, dyn_dims, dyn_strides, .. } => {
                let mut ops = SmallVec::<[&mut NodeId; 4]>::from_iter([source]);
                ops.extend(dyn_offsets.iter_mut());
                ops.extend(dyn_dims.iter_mut());
                ops.extend(dyn_strides.iter_mut());
                ops
            }
            Self::DescriptorLoad { desc, .. } => SmallVec::from_iter([desc]),
        }
    }

    /// Short operation name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Argument { .. } => "argument",
            Self::Alloc => "alloc",
            Self::Constant { .. } => "constant",
            Self::Fill { .. } => "fill",
            Self::Copy { .. } => "copy",
            Self::Subview { .. } => "subview",
            Self::ElemCast { .. } => "elem_cast",
            Self::Slice { .. } => "slice",
            Self::Transpose { .. } => "transpose",
            Self::Compute(_) => "compute",
            Self::TransferRead { .. } => "transfer_read",
            Self::KernelDispatch { .. } => "kernel_dispatch",
            Self::KernelInvoke { .. } => "kernel_invoke",
            Self::IndexConst { .. } => "index_const",
            Self::DimQuery { .. } => "dim_query",
            Self::IndexMul { .. } => "index_mul",
            Self::MakeDescriptor { .. } => "make_descriptor",
            Self::DescriptorLoad { .. } => "descriptor_load",
        }
    }

    /// View-style operations: the result aliases the single source operand
    /// without modifying the underlying data.
    pub fn is_view(&self) -> bool {
        matches!(self, Self::Subview { .. } | Self::ElemCast { .. } | Self::Slice { .. })
    }
}

/// A node of the operation graph: stable identity, kind, and result type
/// (`None` for pure side-effecting operations).
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub ty: Option<crate::buffer::ValueType>,
}
