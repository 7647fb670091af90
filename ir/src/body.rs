//! Scalar computation bodies of compute nodes.
//!
//! A body is a tiny straight-line dataflow graph: a fixed set of loop
//! arguments (one per node operand), a list of elementary scalar operations,
//! and exactly one yielded result. Acyclicity holds by construction — an
//! operation may only reference arguments, earlier operations, or constants.

use smallvec::SmallVec;
use tessel_dtype::DType;

use crate::error::{Result, UndefinedBodyValueSnafu};
use crate::types::{BinaryFn, ConstValue, UnaryFn};

/// Index of an operation inside one body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyOpId(pub u32);

/// Operand of a body operation (and the yielded result).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyValue {
    /// Loop argument `i` — the element of the node's `i`-th operand.
    Arg(usize),
    /// Result of an earlier operation in the same body.
    Op(BodyOpId),
    /// Compile-time scalar constant.
    Const(ConstValue),
}

/// Kind of one scalar operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyFn {
    Unary(UnaryFn),
    Binary(BinaryFn),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyOp {
    pub op: BodyFn,
    pub operands: SmallVec<[BodyValue; 2]>,
    pub ty: DType,
}

/// Immutable computation body, produced by [`BodyBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    num_args: usize,
    ops: Vec<BodyOp>,
    yielded: BodyValue,
}

impl Body {
    pub fn num_args(&self) -> usize {
        self.num_args
    }

    /// Number of scalar operations, the terminal yield excluded.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> impl Iterator<Item = (BodyOpId, &BodyOp)> {
        self.ops.iter().enumerate().map(|(i, op)| (BodyOpId(i as u32), op))
    }

    pub fn op(&self, id: BodyOpId) -> Option<&BodyOp> {
        self.ops.get(id.0 as usize)
    }

    pub fn yielded(&self) -> BodyValue {
        self.yielded
    }

    /// The unique operation satisfying `pred`, or `None` when there is none
    /// or more than one. Idiom matching treats the non-unique case as a
    /// failure, so the two are deliberately indistinguishable here.
    pub fn single_op_where(&self, pred: impl Fn(&BodyOp) -> bool) -> Option<BodyOpId> {
        let mut found = None;
        for (id, op) in self.ops() {
            if pred(op) {
                if found.is_some() {
                    return None;
                }
                found = Some(id);
            }
        }
        found
    }

    /// The unique operation of the given binary kind.
    pub fn single_binary(&self, f: BinaryFn) -> Option<BodyOpId> {
        self.single_op_where(|op| op.op == BodyFn::Binary(f))
    }
}

/// Builder enforcing the body's structural invariants.
#[derive(Debug)]
pub struct BodyBuilder {
    num_args: usize,
    ops: Vec<BodyOp>,
}

impl BodyBuilder {
    pub fn new(num_args: usize) -> Self {
        Self { num_args, ops: Vec::new() }
    }

    fn check(&self, value: BodyValue) -> Result<()> {
        let defined = match value {
            BodyValue::Arg(i) => i < self.num_args,
            BodyValue::Op(id) => (id.0 as usize) < self.ops.len(),
            BodyValue::Const(_) => true,
        };
        snafu::ensure!(defined, UndefinedBodyValueSnafu { value });
        Ok(())
    }

    fn push(&mut self, op: BodyOp) -> BodyValue {
        let id = BodyOpId(self.ops.len() as u32);
        self.ops.push(op);
        BodyValue::Op(id)
    }

    pub fn unary(&mut self, f: UnaryFn, v: BodyValue, ty: DType) -> Result<BodyValue> {
        self.check(v)?;
        Ok(self.push(BodyOp { op: BodyFn::Unary(f), operands: SmallVec::from_slice(&[v]), ty }))
    }

    pub fn binary(&mut self, f: BinaryFn, lhs: BodyValue, rhs: BodyValue, ty: DType) -> Result<BodyValue> {
        self.check(lhs)?;
        self.check(rhs)?;
        Ok(self.push(BodyOp { op: BodyFn::Binary(f), operands: SmallVec::from_slice(&[lhs, rhs]), ty }))
    }

    /// Terminate the body with its single yielded value.
    pub fn yield_value(self, v: BodyValue) -> Result<Body> {
        self.check(v)?;
        Ok(Body { num_args: self.num_args, ops: self.ops, yielded: v })
    }
}
