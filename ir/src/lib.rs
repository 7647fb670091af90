//! Host-graph abstraction for the tessel lowering engine.
//!
//! This crate supplies the capabilities the idiom-classification engine is
//! written against:
//!
//! - [`graph`] - arena-based operation graph with stable node handles,
//!   ordered consumer lists, and atomic replace/erase mutation
//! - [`node`] - the closed operation-kind sum, including the emitted
//!   microkernel and accelerator dialects
//! - [`affine`] - the affine-expression mini-language (index maps)
//! - [`body`] - scalar computation bodies of compute nodes
//! - [`buffer`] - buffer/vector/descriptor value types
//! - [`types`] - constants, iterator kinds, kernel kind/flag sets
//! - [`error`] - structural-invariant errors

pub mod affine;
pub mod body;
pub mod buffer;
pub mod error;
pub mod graph;
pub mod node;
pub mod types;

#[cfg(test)]
mod test;

pub use affine::{AffineExpr, AffineMap};
pub use body::{Body, BodyBuilder, BodyFn, BodyOp, BodyOpId, BodyValue};
pub use buffer::{BufferType, DescriptorType, DimSize, MemScope, ValueType, VectorType};
pub use error::{Error, Result};
pub use graph::{Graph, NodeId};
pub use node::{ComputeNode, Node, NodeKind};
pub use types::{BinaryFn, CacheHint, ConstValue, IteratorKind, KernelFlag, KernelKind, UnaryFn};

// Re-export the element type for convenience.
pub use tessel_dtype::DType;
