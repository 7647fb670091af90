//! Affine index maps.
//!
//! A per-operand index map takes the loop coordinates of a compute node to a
//! position in the operand's logical shape. The mini-language is deliberately
//! small: a result is either a loop-dimension reference, a symbolic variable,
//! or the constant zero (the broadcast marker). Classification code rejects
//! symbols outright; they exist so malformed host input is representable and
//! diagnosable rather than unconstructible.

use std::fmt;

use itertools::Itertools;
use smallvec::SmallVec;

/// One result expression of an [`AffineMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AffineExpr {
    /// Reference to loop dimension `d<i>`.
    Dim(usize),
    /// Symbolic (non-loop) free variable `s<i>`.
    Symbol(usize),
    /// Constant zero, the broadcast marker.
    Zero,
}

/// Ordered list of index expressions over a fixed loop dimensionality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AffineMap {
    num_dims: usize,
    results: SmallVec<[AffineExpr; 4]>,
}

impl AffineMap {
    pub fn new(num_dims: usize, results: impl IntoIterator<Item = AffineExpr>) -> Self {
        Self { num_dims, results: results.into_iter().collect() }
    }

    /// The identity map `(d0, .., dn-1) -> (d0, .., dn-1)`.
    pub fn identity(num_dims: usize) -> Self {
        Self::new(num_dims, (0..num_dims).map(AffineExpr::Dim))
    }

    /// A full permutation map, e.g. `[1, 0]` gives `(d0, d1) -> (d1, d0)`.
    pub fn permutation(perm: &[usize]) -> Self {
        Self::new(perm.len(), perm.iter().map(|&p| AffineExpr::Dim(p)))
    }

    pub fn num_dims(&self) -> usize {
        self.num_dims
    }

    pub fn num_results(&self) -> usize {
        self.results.len()
    }

    pub fn results(&self) -> &[AffineExpr] {
        &self.results
    }

    pub fn has_symbols(&self) -> bool {
        self.results.iter().any(|r| matches!(r, AffineExpr::Symbol(_)))
    }

    /// Left-pad the result list with zero markers until it has one result per
    /// loop dimension: `(d0, d1) -> (d1)` becomes `(d0, d1) -> (0, d1)`.
    ///
    /// Maps that already have at least `num_dims` results are returned as-is.
    pub fn left_pad_to_dims(&self) -> AffineMap {
        if self.results.len() >= self.num_dims {
            return self.clone();
        }
        let pad = self.num_dims - self.results.len();
        let results = std::iter::repeat_n(AffineExpr::Zero, pad).chain(self.results.iter().copied());
        Self::new(self.num_dims, results)
    }

    /// Compose `self ∘ inner`: feed `inner`'s results into `self`'s loop
    /// dimensions. Requires `self.num_dims == inner.num_results` and a
    /// symbol-free, well-formed outer map; returns `None` otherwise.
    pub fn compose(&self, inner: &AffineMap) -> Option<AffineMap> {
        if self.num_dims != inner.num_results() {
            return None;
        }
        let mut results: SmallVec<[AffineExpr; 4]> = SmallVec::with_capacity(self.results.len());
        for r in &self.results {
            match r {
                AffineExpr::Dim(d) => results.push(inner.results.get(*d).copied()?),
                AffineExpr::Zero => results.push(AffineExpr::Zero),
                AffineExpr::Symbol(_) => return None,
            }
        }
        Some(AffineMap { num_dims: inner.num_dims, results })
    }

    /// A projected permutation maps distinct loop dimensions to distinct
    /// results, possibly dropping some dimensions. With `allow_zeros`,
    /// constant-zero results are permitted in between.
    pub fn is_projected_permutation(&self, allow_zeros: bool) -> bool {
        if self.has_symbols() || self.results.len() > self.num_dims {
            return false;
        }
        let mut dims = SmallVec::<[usize; 4]>::new();
        for r in &self.results {
            match r {
                AffineExpr::Dim(d) if *d < self.num_dims => dims.push(*d),
                AffineExpr::Zero if allow_zeros => {}
                _ => return false,
            }
        }
        dims.iter().duplicates().next().is_none()
    }

    /// True when the results are exactly the trailing loop dimensions in
    /// order: `(d0, .., dn-1) -> (dn-k, .., dn-1)`.
    pub fn is_minor_identity(&self) -> bool {
        if self.results.len() > self.num_dims {
            return false;
        }
        let offset = self.num_dims - self.results.len();
        self.results
            .iter()
            .enumerate()
            .all(|(i, r)| matches!(r, AffineExpr::Dim(d) if *d == offset + i))
    }

    /// Minor identity where some results may be replaced by the zero marker.
    /// Returns the result positions holding zeros, or `None` when the map is
    /// not of this form.
    pub fn minor_identity_broadcast_dims(&self) -> Option<SmallVec<[usize; 2]>> {
        if self.has_symbols() || self.results.len() > self.num_dims {
            return None;
        }
        let offset = self.num_dims - self.results.len();
        let mut broadcast = SmallVec::new();
        for (i, r) in self.results.iter().enumerate() {
            match r {
                AffineExpr::Zero => broadcast.push(i),
                AffineExpr::Dim(d) if *d == offset + i => {}
                _ => return None,
            }
        }
        Some(broadcast)
    }
}

impl fmt::Display for AffineMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for d in 0..self.num_dims {
            if d > 0 {
                write!(f, ", ")?;
            }
            write!(f, "d{d}")?;
        }
        write!(f, ") -> (")?;
        for (i, r) in self.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match r {
                AffineExpr::Dim(d) => write!(f, "d{d}")?,
                AffineExpr::Symbol(s) => write!(f, "s{s}")?,
                AffineExpr::Zero => write!(f, "0")?,
            }
        }
        write!(f, ")")
    }
}
