//! Global iteration ranges and access patterns.
//!
//! A [`GlobalRange`] is a closed-open box in global logical index space.
//! Emptiness (`hi <= lo` on any axis) is a first-class outcome: every
//! operation in this crate treats an empty range as a no-op rather than an
//! error.

use smallvec::SmallVec;

use crate::{AxisVec, MeshError, Result, MAX_DIM};

/// A closed-open N-d box `[lo_0, hi_0) x [lo_1, hi_1) x ...` in global
/// logical index space. Indices may be negative (halo cells sit below the
/// logical origin).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalRange {
    bounds: AxisVec<(isize, isize)>,
}

impl GlobalRange {
    pub fn new(bounds: &[(isize, isize)]) -> Result<Self> {
        let ndim = bounds.len();
        if ndim == 0 || ndim > MAX_DIM {
            return Err(MeshError::TooManyAxes(ndim, MAX_DIM));
        }
        Ok(Self {
            bounds: SmallVec::from_slice(bounds),
        })
    }

    /// Build from the flat `[lo_0, hi_0, lo_1, hi_1, ...]` encoding.
    pub fn from_flat(flat: &[isize]) -> Result<Self> {
        if flat.len() % 2 != 0 {
            return Err(MeshError::RankMismatch(flat.len() / 2, flat.len()));
        }
        let bounds: AxisVec<(isize, isize)> =
            flat.chunks_exact(2).map(|c| (c[0], c[1])).collect();
        if bounds.is_empty() || bounds.len() > MAX_DIM {
            return Err(MeshError::TooManyAxes(bounds.len(), MAX_DIM));
        }
        Ok(Self { bounds })
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.bounds.len()
    }

    #[inline]
    pub fn lo(&self, axis: usize) -> isize {
        self.bounds[axis].0
    }

    #[inline]
    pub fn hi(&self, axis: usize) -> isize {
        self.bounds[axis].1
    }

    /// Extent along `axis`; 0 when the axis is inverted or degenerate.
    #[inline]
    pub fn extent(&self, axis: usize) -> usize {
        (self.bounds[axis].1 - self.bounds[axis].0).max(0) as usize
    }

    /// Per-axis extents.
    pub fn extents(&self) -> AxisVec<usize> {
        (0..self.ndim()).map(|a| self.extent(a)).collect()
    }

    /// Total element count of the box.
    pub fn len(&self) -> usize {
        (0..self.ndim()).map(|a| self.extent(a)).product()
    }

    /// True when any axis has `hi <= lo`.
    pub fn is_empty(&self) -> bool {
        self.bounds.iter().any(|&(lo, hi)| hi <= lo)
    }

    /// Per-axis intersection with `other`.
    pub fn intersect(&self, other: &GlobalRange) -> Result<GlobalRange> {
        if self.ndim() != other.ndim() {
            return Err(MeshError::RankMismatch(self.ndim(), other.ndim()));
        }
        Ok(Self {
            bounds: self
                .bounds
                .iter()
                .zip(other.bounds.iter())
                .map(|(&(al, ah), &(bl, bh))| (al.max(bl), ah.min(bh)))
                .collect(),
        })
    }

    /// True when `other` lies inside this box. Empty boxes are contained in
    /// everything.
    pub fn contains(&self, other: &GlobalRange) -> bool {
        if other.is_empty() {
            return true;
        }
        self.ndim() == other.ndim()
            && self
                .bounds
                .iter()
                .zip(other.bounds.iter())
                .all(|(&(al, ah), &(bl, bh))| al <= bl && bh <= ah)
    }

    /// The empty box anchored at this box's low corner. Used by the local
    /// range resolver to signal "no intersection" without leaving the
    /// requested coordinate frame.
    pub fn collapsed(&self) -> GlobalRange {
        Self {
            bounds: self.bounds.iter().map(|&(lo, _)| (lo, lo)).collect(),
        }
    }
}

/// A set of per-axis stencil offsets describing how an operation touches
/// the cells around each iteration point.
///
/// The local range resolver only ever needs [`AccessPattern::identity`],
/// the single zero-offset point; richer patterns belong to the external
/// decomposition layer's own consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessPattern {
    points: Vec<AxisVec<isize>>,
}

impl AccessPattern {
    /// The single-point identity pattern: one all-zero offset.
    pub fn identity(ndim: usize) -> Self {
        Self {
            points: vec![SmallVec::from_elem(0, ndim)],
        }
    }

    pub fn ndim(&self) -> usize {
        self.points.first().map_or(0, |p| p.len())
    }

    pub fn points(&self) -> impl Iterator<Item = &[isize]> {
        self.points.iter().map(|p| p.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flat_round_trip() {
        let r = GlobalRange::from_flat(&[1, 5, -1, 3, 0, 2]).unwrap();
        assert_eq!(r.ndim(), 3);
        assert_eq!((r.lo(1), r.hi(1)), (-1, 3));
        assert_eq!(r.extents().as_slice(), &[4, 4, 2]);
        assert_eq!(r.len(), 32);
        assert!(!r.is_empty());
    }

    #[test]
    fn test_empty_when_any_axis_inverted() {
        let r = GlobalRange::from_flat(&[0, 4, 3, 3]).unwrap();
        assert!(r.is_empty());
        assert_eq!(r.extent(1), 0);
        let r = GlobalRange::from_flat(&[0, 4, 5, 2]).unwrap();
        assert!(r.is_empty());
        assert_eq!(r.extent(1), 0);
    }

    #[test]
    fn test_intersect_and_contains() {
        let a = GlobalRange::from_flat(&[0, 8, 0, 8]).unwrap();
        let b = GlobalRange::from_flat(&[4, 12, 2, 6]).unwrap();
        let c = a.intersect(&b).unwrap();
        assert_eq!(c, GlobalRange::from_flat(&[4, 8, 2, 6]).unwrap());
        assert!(a.contains(&c));
        assert!(b.contains(&c));
        assert!(!c.contains(&a));
    }

    #[test]
    fn test_collapsed_is_empty_and_contained() {
        let r = GlobalRange::from_flat(&[2, 6, -1, 4]).unwrap();
        let e = r.collapsed();
        assert!(e.is_empty());
        assert_eq!(e.len(), 0);
        assert!(r.contains(&e));
    }

    #[test]
    fn test_identity_pattern() {
        let p = AccessPattern::identity(3);
        assert_eq!(p.ndim(), 3);
        let pts: Vec<&[isize]> = p.points().collect();
        assert_eq!(pts, vec![&[0isize, 0, 0][..]]);
    }

    #[test]
    fn test_odd_flat_length_rejected() {
        assert!(GlobalRange::from_flat(&[0, 4, 1]).is_err());
    }
}
