//! Local range resolution against an external partition.
//!
//! The decomposition that assigns sub-boxes of a globally indexed array to
//! compute partitions is owned elsewhere and fixed at setup time; this
//! module only queries it. The adapter here exists because mapping a
//! "global box" onto a "local box" — driving the shared range-computation
//! facility with a single-point identity stencil — is a classic source of
//! off-by-one defects at partition boundaries.

use crate::desc::MeshLayout;
use crate::range::{AccessPattern, GlobalRange};
use crate::{MeshError, Result};

/// The externally supplied decomposition facility.
///
/// Given an access pattern and a globally addressed range, reports the
/// per-axis half-open sub-range the local partition owns, or `None` when
/// the global range intersects nothing local.
pub trait Partition {
    fn local_span(&self, pattern: &AccessPattern, global: &GlobalRange) -> Option<GlobalRange>;
}

/// Clip a globally addressed iteration range to what the local partition
/// owns of `layout`'s array.
///
/// No intersection is not an error: the result is an empty range anchored
/// at the global low corner, and callers must check `is_empty()` before
/// sizing buffers or loops from it.
pub fn resolve_local_range(
    partition: &dyn Partition,
    layout: &MeshLayout,
    global: &GlobalRange,
) -> Result<GlobalRange> {
    if global.ndim() != layout.ndim() {
        return Err(MeshError::RankMismatch(layout.ndim(), global.ndim()));
    }
    let pattern = AccessPattern::identity(global.ndim());
    match partition.local_span(&pattern, global) {
        Some(local) => {
            if local.ndim() != global.ndim() {
                return Err(MeshError::RankMismatch(global.ndim(), local.ndim()));
            }
            Ok(local)
        }
        None => Ok(global.collapsed()),
    }
}

/// A degenerate decomposition: one partition owns everything, so every
/// global range resolves to itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoleOwner;

impl Partition for SoleOwner {
    fn local_span(&self, _pattern: &AccessPattern, global: &GlobalRange) -> Option<GlobalRange> {
        Some(global.clone())
    }
}

/// A partition owning a fixed sub-box; resolution is intersection.
#[derive(Clone, Debug)]
pub struct BoxPartition {
    owned: GlobalRange,
}

impl BoxPartition {
    pub fn new(owned: GlobalRange) -> Self {
        Self { owned }
    }

    pub fn owned(&self) -> &GlobalRange {
        &self.owned
    }
}

impl Partition for BoxPartition {
    fn local_span(&self, _pattern: &AccessPattern, global: &GlobalRange) -> Option<GlobalRange> {
        let clipped = self.owned.intersect(global).ok()?;
        if clipped.is_empty() {
            None
        } else {
            Some(clipped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::StorageMode;

    fn layout_2d() -> MeshLayout {
        MeshLayout::new(&[10, 10], &[-1, -1], 1, 8, StorageMode::Interleaved).unwrap()
    }

    #[test]
    fn test_sole_owner_resolves_full_range() {
        let layout = layout_2d();
        let global = GlobalRange::from_flat(&[0, 8, 2, 6]).unwrap();
        let local = resolve_local_range(&SoleOwner, &layout, &global).unwrap();
        assert_eq!(local, global);
    }

    #[test]
    fn test_box_partition_clips_to_subset() {
        let layout = layout_2d();
        let owned = GlobalRange::from_flat(&[4, 12, 4, 12]).unwrap();
        let part = BoxPartition::new(owned);
        let global = GlobalRange::from_flat(&[0, 8, 0, 8]).unwrap();
        let local = resolve_local_range(&part, &layout, &global).unwrap();
        assert_eq!(local, GlobalRange::from_flat(&[4, 8, 4, 8]).unwrap());
        assert!(global.contains(&local));
    }

    #[test]
    fn test_disjoint_partition_yields_empty_not_error() {
        let layout = layout_2d();
        let part = BoxPartition::new(GlobalRange::from_flat(&[20, 30, 20, 30]).unwrap());
        let global = GlobalRange::from_flat(&[0, 8, 0, 8]).unwrap();
        let local = resolve_local_range(&part, &layout, &global).unwrap();
        assert!(local.is_empty());
        assert!(global.contains(&local));
        // Anchored at the requested low corner.
        assert_eq!(local.lo(0), 0);
        assert_eq!(local.hi(0), 0);
    }

    #[test]
    fn test_rank_mismatch_rejected() {
        let layout = layout_2d();
        let global = GlobalRange::from_flat(&[0, 4]).unwrap();
        let err = resolve_local_range(&SoleOwner, &layout, &global).unwrap_err();
        assert!(matches!(err, MeshError::RankMismatch(2, 1)));
    }
}
