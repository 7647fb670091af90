//! Idiom classification and kernel lowering for compute-node graphs.
//!
//! Given a graph of structured, loop-nest-shaped array computations, this
//! crate recognizes canonical numeric idioms — matrix multiply-accumulate,
//! elementwise add, relu, zero-fill, copy and transpose — independent of
//! operand order, interposed unary wrappers, or equivalent affine encodings
//! of broadcasting, and replaces each matched node with a dispatch + invoke
//! pair against a precompiled microkernel, or with a tensor-descriptor
//! construction for accelerator-resident buffers.
//!
//! # Module Organization
//!
//! - [`body`] - structural matching of scalar computation bodies
//! - [`zero`] - zero-provenance tracing through copies/views/casts/slices
//! - [`access`] - broadcast classification and layout resolution
//! - [`descriptor`] - static/dynamic tensor-descriptor construction
//! - [`rules`] - one rewrite rule per recognized idiom
//! - [`transfer`] - the accelerator transfer-read lowering
//! - [`driver`] - the ordered rule table and rewrite-to-fixpoint driver
//! - [`mark`] - library-call mark helpers
//!
//! # Example
//!
//! ```
//! use tessel_ir::{Graph, NodeKind, ConstValue, DType};
//! use tessel_ir::buffer::{BufferType, DimSize, ValueType};
//! use tessel_lower::{RuleSet, lower_graph};
//!
//! let mut graph = Graph::new();
//! let buf = BufferType::contiguous(DType::Float32, [DimSize::Static(32), DimSize::Static(64)]);
//! let dest = graph.alloc(buf.clone()).unwrap();
//! let zero = graph.constant(ConstValue::Float(0.0), DType::Float32).unwrap();
//! graph.add(NodeKind::Fill { value: zero, dest }, Some(ValueType::Buffer(buf))).unwrap();
//!
//! let applied = lower_graph(&mut graph, &RuleSet::default_rules()).unwrap();
//! assert_eq!(applied, 1);
//! ```

pub mod access;
pub mod body;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod mark;
pub mod rules;
pub mod transfer;
pub mod zero;

#[cfg(test)]
mod test;

pub use access::{BroadcastKind, GemmInfo, UnaryInfo, broadcast_flag, classify_broadcast};
pub use driver::{Rule, RuleOutcome, RuleSet, lower_graph};
pub use error::{Error, Result};
pub use zero::{is_const_zero, is_zero_source};
