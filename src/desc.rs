//! Array descriptors, byte views, and the residency stale marker.
//!
//! A [`MeshLayout`] describes the allocated (halo-padded) shape of an array
//! without owning its storage; [`MeshView`] / [`MeshViewMut`] bind a layout
//! to a raw byte region, validated at construction. The allocator and
//! host/device residency tracking live outside this crate — the only
//! residency interaction here is [`ResidencyCell`], a two-valued stale
//! marker that mutating codec operations set and never clear.

use std::sync::atomic::{AtomicU8, Ordering};

use smallvec::SmallVec;

use crate::{AxisVec, MeshError, Result, MAX_DIM};

/// How the named components of an element are laid out in memory.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StorageMode {
    /// Components of one element are adjacent (array-of-structs).
    Interleaved,
    /// Each component is a separate whole-array plane (struct-of-arrays).
    Planar,
}

/// Which residency domain a byte region represents.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MemorySide {
    Host,
    Device,
}

impl MemorySide {
    pub fn other(self) -> Self {
        match self {
            MemorySide::Host => MemorySide::Device,
            MemorySide::Device => MemorySide::Host,
        }
    }
}

const STALE_NONE: u8 = 0;
const STALE_HOST: u8 = 1;
const STALE_DEVICE: u8 = 2;

/// Two-valued staleness marker for an array whose authoritative copy lives
/// in more than one residency domain.
///
/// After a codec operation writes through a view that carries a cell, the
/// side *opposite* the written one is marked stale so later reads there
/// trigger a resync. The resync itself, and clearing the flag, belong to
/// the external residency layer.
#[derive(Debug, Default)]
pub struct ResidencyCell(AtomicU8);

impl ResidencyCell {
    pub const fn new() -> Self {
        Self(AtomicU8::new(STALE_NONE))
    }

    /// Record that `side` now holds the authoritative bytes.
    pub fn mark_written(&self, side: MemorySide) {
        let stale = match side.other() {
            MemorySide::Host => STALE_HOST,
            MemorySide::Device => STALE_DEVICE,
        };
        self.0.store(stale, Ordering::Release);
    }

    /// The side whose copy is out of date, if any.
    pub fn stale(&self) -> Option<MemorySide> {
        match self.0.load(Ordering::Acquire) {
            STALE_HOST => Some(MemorySide::Host),
            STALE_DEVICE => Some(MemorySide::Device),
            _ => None,
        }
    }

    /// Clear the marker after a resync. Called by the residency layer, not
    /// by this crate.
    pub fn clear(&self) {
        self.0.store(STALE_NONE, Ordering::Release);
    }
}

/// Shape metadata for a halo-padded mesh array.
///
/// `size` is the *allocated* per-axis extent, including padding. `halo_lo`
/// is the offset of logical index 0 relative to the allocated origin
/// (non-positive: the halo extends below the logical origin), so logical
/// index `g` on axis `a` lives at padded index `g - halo_lo[a]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshLayout {
    size: AxisVec<usize>,
    halo_lo: AxisVec<isize>,
    components: usize,
    type_size: usize,
    storage: StorageMode,
}

impl MeshLayout {
    pub fn new(
        size: &[usize],
        halo_lo: &[isize],
        components: usize,
        type_size: usize,
        storage: StorageMode,
    ) -> Result<Self> {
        let ndim = size.len();
        if ndim == 0 || ndim > MAX_DIM {
            return Err(MeshError::TooManyAxes(ndim, MAX_DIM));
        }
        if halo_lo.len() != ndim {
            return Err(MeshError::RankMismatch(ndim, halo_lo.len()));
        }
        for (axis, &d) in halo_lo.iter().enumerate() {
            if d > 0 {
                return Err(MeshError::InvalidHalo { axis, value: d });
            }
        }
        if components == 0 || type_size == 0 {
            return Err(MeshError::InvalidElement {
                components,
                type_size,
            });
        }
        Ok(Self {
            size: SmallVec::from_slice(size),
            halo_lo: SmallVec::from_slice(halo_lo),
            components,
            type_size,
            storage,
        })
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.size.len()
    }

    #[inline]
    pub fn size(&self) -> &[usize] {
        &self.size
    }

    #[inline]
    pub fn halo_lo(&self) -> &[isize] {
        &self.halo_lo
    }

    #[inline]
    pub fn components(&self) -> usize {
        self.components
    }

    #[inline]
    pub fn type_size(&self) -> usize {
        self.type_size
    }

    #[inline]
    pub fn storage(&self) -> StorageMode {
        self.storage
    }

    /// Bytes per logical element, all components included.
    #[inline]
    pub fn elem_size(&self) -> usize {
        self.components * self.type_size
    }

    /// Number of element slots in the padded allocation, per component.
    #[inline]
    pub fn spatial_len(&self) -> usize {
        self.size.iter().product()
    }

    /// Total byte length a conforming allocation must provide.
    #[inline]
    pub fn required_bytes(&self) -> usize {
        self.spatial_len() * self.elem_size()
    }

    /// Exclusive prefix products of `size`: elements skipped per unit step
    /// of each axis.
    pub(crate) fn pitches(&self) -> AxisVec<usize> {
        let mut p = AxisVec::with_capacity(self.ndim());
        let mut acc = 1usize;
        for &s in self.size.iter() {
            p.push(acc);
            acc *= s;
        }
        p
    }

    /// Padded base index on `axis` for a box of `extent` starting at
    /// logical `lo`, bounds-checked against the allocated extent.
    pub(crate) fn padded_base(&self, axis: usize, lo: isize, extent: usize) -> Result<usize> {
        let base = lo - self.halo_lo[axis];
        if base < 0 || base as usize + extent > self.size[axis] {
            return Err(MeshError::OutOfBounds {
                axis,
                lo,
                hi: lo + extent as isize,
                size: self.size[axis],
            });
        }
        Ok(base as usize)
    }
}

/// Immutable byte view over a mesh array allocation.
#[derive(Clone, Copy, Debug)]
pub struct MeshView<'a> {
    layout: &'a MeshLayout,
    bytes: &'a [u8],
}

impl<'a> MeshView<'a> {
    pub fn new(layout: &'a MeshLayout, bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < layout.required_bytes() {
            return Err(MeshError::BufferTooSmall {
                needed: layout.required_bytes(),
                have: bytes.len(),
            });
        }
        Ok(Self { layout, bytes })
    }

    #[inline]
    pub fn layout(&self) -> &'a MeshLayout {
        self.layout
    }

    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Mutable byte view over a mesh array allocation, optionally bound to a
/// residency cell.
#[derive(Debug)]
pub struct MeshViewMut<'a> {
    layout: &'a MeshLayout,
    bytes: &'a mut [u8],
    residency: Option<(&'a ResidencyCell, MemorySide)>,
}

impl<'a> MeshViewMut<'a> {
    pub fn new(layout: &'a MeshLayout, bytes: &'a mut [u8]) -> Result<Self> {
        if bytes.len() < layout.required_bytes() {
            return Err(MeshError::BufferTooSmall {
                needed: layout.required_bytes(),
                have: bytes.len(),
            });
        }
        Ok(Self {
            layout,
            bytes,
            residency: None,
        })
    }

    /// Attach the residency cell for this allocation, naming which side
    /// these bytes are. Mutating codec operations will mark the other side
    /// stale on completion.
    pub fn with_residency(mut self, cell: &'a ResidencyCell, side: MemorySide) -> Self {
        self.residency = Some((cell, side));
        self
    }

    #[inline]
    pub fn layout(&self) -> &'a MeshLayout {
        self.layout
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.bytes
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.bytes
    }

    /// Flag the opposite residency domain as stale, if a cell is attached.
    pub(crate) fn mark_written(&self) {
        if let Some((cell, side)) = self.residency {
            cell.mark_written(side);
        }
    }
}
