//! Fundamental type definitions: constants, iterator kinds, scalar body
//! operations, and the emitted microkernel dialect's kind/flag sets.

use tessel_dtype::DType;

/// Compile-time constant value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl ConstValue {
    pub const fn dtype(&self) -> DType {
        match self {
            ConstValue::Int(_) => DType::Int64,
            ConstValue::UInt(_) => DType::UInt64,
            ConstValue::Float(_) => DType::Float64,
            ConstValue::Bool(_) => DType::Bool,
        }
    }

    pub const fn zero(dtype: DType) -> Self {
        use DType::*;
        match dtype {
            Bool => Self::Bool(false),
            Int8 | Int16 | Int32 | Int64 => Self::Int(0),
            UInt8 | UInt16 | UInt32 | UInt64 => Self::UInt(0),
            Float16 | BFloat16 | Float32 | Float64 => Self::Float(0.0),
        }
    }

    /// True for the numeric zero of any type. Both float zeros count,
    /// matching the host's any-zero-float matcher.
    pub fn is_zero(&self) -> bool {
        match self {
            ConstValue::Int(v) => *v == 0,
            ConstValue::UInt(v) => *v == 0,
            ConstValue::Float(v) => *v == 0.0,
            ConstValue::Bool(v) => !*v,
        }
    }

    pub fn is_one(&self) -> bool {
        match self {
            ConstValue::Int(v) => *v == 1,
            ConstValue::UInt(v) => *v == 1,
            ConstValue::Float(v) => *v == 1.0,
            ConstValue::Bool(v) => *v,
        }
    }
}

/// Kind of one loop dimension of a compute node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorKind {
    Parallel,
    Reduction,
}

impl IteratorKind {
    pub const fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel)
    }

    pub const fn is_reduction(&self) -> bool {
        matches!(self, Self::Reduction)
    }
}

/// Single-operand scalar operations inside a computation body.
///
/// These are the "unary wrappers" idiom matching must see through; they may
/// change the element type (e.g. [`UnaryFn::Extend`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryFn {
    Neg,
    Abs,
    Sqrt,
    Exp2,
    Recip,
    /// Widening conversion to a larger element type.
    Extend,
}

/// Two-operand scalar operations inside a computation body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryFn {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
}

impl BinaryFn {
    pub const fn is_commutative(self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::Max | Self::Min)
    }
}

/// Kernel kind tag of a dispatch call.
///
/// The dispatch/invoke convention compiles a kernel handle per (kind, dims,
/// flags, dtype) tuple; the invoke then applies the handle to operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelKind {
    Zero,
    Identity,
    Relu,
    Transpose,
    Add,
    Gemm,
}

impl KernelKind {
    /// Unary kernels take one input and one output and a dims quadruple.
    pub const fn is_unary(&self) -> bool {
        matches!(self, Self::Zero | Self::Identity | Self::Relu | Self::Transpose)
    }
}

/// Broadcast flag attached to a dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelFlag {
    None,
    BcastScalar,
    BcastRow,
    BcastCol,
}

/// Optional cache-control hint on an accelerator descriptor load.
/// Absent means the default policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheHint {
    Cached,
    Uncached,
    Streaming,
}
