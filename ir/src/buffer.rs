//! Memory-resident value types: buffers with shape/stride descriptors,
//! vectors, and accelerator tensor descriptors.
//!
//! Buffers use the innermost-stride convention: `strides[rank-1]` is the
//! stride of the fastest-varying dimension. Every idiom this stack lowers
//! requires that stride to be statically 1.

use smallvec::SmallVec;
use tessel_dtype::DType;

/// A dimension size or stride: a compile-time constant or a runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimSize {
    Static(i64),
    Dynamic,
}

impl DimSize {
    pub const fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }

    pub const fn as_static(&self) -> Option<i64> {
        match self {
            Self::Static(v) => Some(*v),
            Self::Dynamic => None,
        }
    }
}

impl std::fmt::Display for DimSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(v) => write!(f, "{v}"),
            Self::Dynamic => write!(f, "?"),
        }
    }
}

/// Logical shape plus strides/offset descriptor of a memory-resident array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferType {
    pub elem: DType,
    pub shape: SmallVec<[DimSize; 4]>,
    pub strides: SmallVec<[DimSize; 4]>,
    pub offset: DimSize,
}

impl BufferType {
    pub fn new(
        elem: DType,
        shape: impl IntoIterator<Item = DimSize>,
        strides: impl IntoIterator<Item = DimSize>,
        offset: DimSize,
    ) -> Self {
        Self { elem, shape: shape.into_iter().collect(), strides: strides.into_iter().collect(), offset }
    }

    /// Row-major contiguous buffer. The innermost stride is 1; each outer
    /// stride is the running product of inner dimension sizes, going dynamic
    /// as soon as a dynamic dimension enters the product.
    pub fn contiguous(elem: DType, shape: impl IntoIterator<Item = DimSize>) -> Self {
        let shape: SmallVec<[DimSize; 4]> = shape.into_iter().collect();
        let mut strides: SmallVec<[DimSize; 4]> = SmallVec::with_capacity(shape.len());
        let mut acc = DimSize::Static(1);
        for dim in shape.iter().rev() {
            strides.push(acc);
            acc = match (acc, dim) {
                (DimSize::Static(a), DimSize::Static(d)) => DimSize::Static(a * d),
                _ => DimSize::Dynamic,
            };
        }
        strides.reverse();
        Self { elem, shape, strides, offset: DimSize::Static(0) }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn has_static_shape(&self) -> bool {
        self.shape.iter().all(DimSize::is_static)
    }

    pub fn static_shape(&self) -> Option<SmallVec<[i64; 4]>> {
        self.shape.iter().map(DimSize::as_static).collect()
    }

    pub fn static_strides(&self) -> Option<SmallVec<[i64; 4]>> {
        self.strides.iter().map(DimSize::as_static).collect()
    }

    /// Whether the fastest-varying dimension has a statically unit stride.
    /// Non-contiguous-in-the-fast-dimension layouts cannot map to the
    /// microkernel call convention.
    pub fn has_unit_inner_stride(&self) -> bool {
        matches!(self.strides.last(), Some(DimSize::Static(1)))
    }
}

/// Register-resident vector value, the result of a transfer read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VectorType {
    pub elem: DType,
    pub dims: SmallVec<[i64; 2]>,
}

impl VectorType {
    pub fn new(elem: DType, dims: impl IntoIterator<Item = i64>) -> Self {
        Self { elem, dims: dims.into_iter().collect() }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

/// Memory scope of an accelerator descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemScope {
    Global,
    Shared,
}

/// Accelerator tensor descriptor type: element type, logical tile shape,
/// memory scope, an array-length multiplier, and a boundary-check flag for
/// out-of-bounds accesses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorType {
    pub elem: DType,
    pub dims: SmallVec<[i64; 2]>,
    pub scope: MemScope,
    pub array_length: usize,
    pub boundary_check: bool,
}

/// Type of a node's result value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Scalar(DType),
    Index,
    Buffer(BufferType),
    Vector(VectorType),
    KernelHandle,
    Descriptor(DescriptorType),
}

impl ValueType {
    pub fn as_buffer(&self) -> Option<&BufferType> {
        match self {
            Self::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&VectorType> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn elem(&self) -> Option<DType> {
        match self {
            Self::Scalar(dt) => Some(*dt),
            Self::Buffer(b) => Some(b.elem),
            Self::Vector(v) => Some(v.elem),
            Self::Descriptor(d) => Some(d.elem),
            Self::Index | Self::KernelHandle => None,
        }
    }
}
