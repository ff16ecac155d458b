//! Slab codec: pack a rectangular sub-box of a padded array into a flat
//! transfer buffer, and the mirror injection.
//!
//! Two addressing models live here. [`extract_slab`] / [`inject_slab`]
//! position the box by a global range corrected per axis by the halo
//! offset (`range.lo(axis) - halo_lo[axis]`). [`pack_halo`] /
//! [`unpack_halo`] are the boundary-exchange variant: per-axis scan
//! direction of +1 or -1 over padded-array indices, with independent buffer
//! strides, so the same routine packs halo regions on either side of the
//! owned box and always fills the buffer front-to-back.
//!
//! Axis 0 of an interleaved array is contiguous and moves as one run per
//! outer index combination; planar storage moves `components` separate runs
//! per element, each offset by a whole-array plane. Everything above axis 0
//! is one generalized mixed-radix loop — dimensionality only changes the
//! digit count, never the arithmetic.

use smallvec::SmallVec;

use crate::desc::{MeshLayout, MeshView, MeshViewMut, StorageMode};
use crate::range::GlobalRange;
use crate::{AxisVec, MeshError, Result};

/// Enumerate the byte runs of a slab copy as `(buf_off, dat_off, len)`.
fn for_each_slab_run(
    layout: &MeshLayout,
    buf_extent: &[usize],
    range: &GlobalRange,
    buf_len: usize,
    mut emit: impl FnMut(usize, usize, usize),
) -> Result<()> {
    let ndim = layout.ndim();
    if buf_extent.len() != ndim {
        return Err(MeshError::RankMismatch(ndim, buf_extent.len()));
    }
    if range.ndim() != ndim {
        return Err(MeshError::RankMismatch(ndim, range.ndim()));
    }
    if range.is_empty() || buf_extent.iter().any(|&e| e == 0) {
        return Ok(());
    }

    let mut base: AxisVec<usize> = SmallVec::with_capacity(ndim);
    for axis in 0..ndim {
        base.push(layout.padded_base(axis, range.lo(axis), buf_extent[axis])?);
    }

    let elem = layout.elem_size();
    let needed: usize = buf_extent.iter().product::<usize>() * elem;
    if buf_len < needed {
        return Err(MeshError::BufferTooSmall {
            needed,
            have: buf_len,
        });
    }

    let pitch = layout.pitches();
    let mut bpitch: AxisVec<usize> = AxisVec::with_capacity(ndim);
    let mut acc = 1usize;
    for &e in buf_extent {
        bpitch.push(acc);
        acc *= e;
    }

    let ts = layout.type_size();
    let comps = layout.components();
    let plane = layout.spatial_len();
    let n0 = buf_extent[0];

    let rows: usize = buf_extent[1..].iter().product();
    let mut idx: AxisVec<usize> = SmallVec::from_elem(0, ndim);
    let mut dat_row: usize = base
        .iter()
        .zip(pitch.iter())
        .map(|(&b, &p)| b * p)
        .sum();
    let mut buf_row = 0usize;

    for row in 0..rows {
        match layout.storage() {
            StorageMode::Interleaved => emit(buf_row * elem, dat_row * elem, n0 * elem),
            StorageMode::Planar => {
                for i in 0..n0 {
                    for d in 0..comps {
                        emit(
                            (buf_row + i) * elem + d * ts,
                            (d * plane + dat_row + i) * ts,
                            ts,
                        );
                    }
                }
            }
        }
        if row + 1 == rows {
            break;
        }
        let mut a = 1;
        loop {
            idx[a] += 1;
            dat_row += pitch[a];
            buf_row += bpitch[a];
            if idx[a] < buf_extent[a] {
                break;
            }
            dat_row -= buf_extent[a] * pitch[a];
            buf_row -= buf_extent[a] * bpitch[a];
            idx[a] = 0;
            a += 1;
        }
    }
    Ok(())
}

/// Copy the box described by `buf_extent`, positioned at `range`'s low
/// corner, out of the padded array into the flat buffer.
///
/// An empty range or a zero extent is a no-op. The box must lie inside the
/// padded allocation; violations are reported before any byte moves.
pub fn extract_slab(
    buf: &mut [u8],
    src: &MeshView<'_>,
    buf_extent: &[usize],
    range: &GlobalRange,
) -> Result<()> {
    let bytes = src.bytes();
    for_each_slab_run(src.layout(), buf_extent, range, buf.len(), |b, d, len| {
        buf[b..b + len].copy_from_slice(&bytes[d..d + len]);
    })
}

/// Mirror of [`extract_slab`]: copy the flat buffer back into the box.
///
/// On completion the destination's residency cell, if attached, has its
/// opposite side marked stale.
pub fn inject_slab(
    buf: &[u8],
    dst: &mut MeshViewMut<'_>,
    buf_extent: &[usize],
    range: &GlobalRange,
) -> Result<()> {
    let layout = dst.layout();
    let bytes = dst.bytes_mut();
    for_each_slab_run(layout, buf_extent, range, buf.len(), |b, d, len| {
        bytes[d..d + len].copy_from_slice(&buf[b..b + len]);
    })?;
    dst.mark_written();
    Ok(())
}

/// One axis of a directional halo scan.
///
/// `start` and `end` are padded-array indices; `step` is +1 (forward scan,
/// `[start, end)`) or -1 (reverse scan, `(end, start]` visited downward).
/// `buf_stride` is the buffer pitch of this axis in elements; the buffer
/// offset of a visited cell is `(idx - start) * step * buf_stride`, so the
/// buffer fills front-to-back whichever way the array is scanned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HaloAxis {
    pub start: isize,
    pub end: isize,
    pub step: isize,
    pub buf_stride: usize,
}

impl HaloAxis {
    /// Number of cells the scan visits.
    #[inline]
    fn count(&self) -> usize {
        (self.start - self.end).unsigned_abs()
    }
}

/// Enumerate the byte runs of a halo copy as `(buf_off, dat_off, len)`.
fn for_each_halo_run(
    layout: &MeshLayout,
    axes: &[HaloAxis],
    buf_offset: usize,
    buf_len: usize,
    mut emit: impl FnMut(usize, usize, usize),
) -> Result<()> {
    let ndim = layout.ndim();
    if axes.len() != ndim {
        return Err(MeshError::RankMismatch(ndim, axes.len()));
    }
    for ax in axes {
        if ax.step != 1 && ax.step != -1 {
            return Err(MeshError::InvalidStep(ax.step));
        }
    }
    if axes.iter().any(|ax| ax.count() == 0) {
        return Ok(());
    }
    for (axis, ax) in axes.iter().enumerate() {
        let (lo, hi) = if ax.step == 1 {
            (ax.start, ax.end)
        } else {
            (ax.end + 1, ax.start + 1)
        };
        if lo < 0 || hi > layout.size()[axis] as isize {
            return Err(MeshError::OutOfBounds {
                axis,
                lo,
                hi,
                size: layout.size()[axis],
            });
        }
    }

    let elem = layout.elem_size();
    let last = buf_offset
        + axes
            .iter()
            .map(|ax| (ax.count() - 1) * ax.buf_stride)
            .sum::<usize>();
    let needed = (last + 1) * elem;
    if buf_len < needed {
        return Err(MeshError::BufferTooSmall {
            needed,
            have: buf_len,
        });
    }

    let pitch = layout.pitches();
    let ts = layout.type_size();
    let comps = layout.components();
    let plane = layout.spatial_len();

    let total: usize = axes.iter().map(|ax| ax.count()).product();
    let mut idx: AxisVec<usize> = SmallVec::from_elem(0, ndim);
    let mut sp: isize = axes
        .iter()
        .zip(pitch.iter())
        .map(|(ax, &p)| ax.start * p as isize)
        .sum();
    let mut boff = buf_offset;

    for step in 0..total {
        let cell = sp as usize;
        match layout.storage() {
            StorageMode::Interleaved => emit(boff * elem, cell * elem, elem),
            StorageMode::Planar => {
                for d in 0..comps {
                    emit(boff * elem + d * ts, (d * plane + cell) * ts, ts);
                }
            }
        }
        if step + 1 == total {
            break;
        }
        let mut a = 0;
        loop {
            idx[a] += 1;
            sp += axes[a].step * pitch[a] as isize;
            boff += axes[a].buf_stride;
            if idx[a] < axes[a].count() {
                break;
            }
            sp -= axes[a].step * (axes[a].count() as isize) * pitch[a] as isize;
            boff -= axes[a].count() * axes[a].buf_stride;
            idx[a] = 0;
            a += 1;
        }
    }
    Ok(())
}

/// Pack a halo region of the array into the buffer, starting `buf_offset`
/// elements in. Scan direction is per-axis; the buffer is always filled
/// front-to-back.
pub fn pack_halo(
    buf: &mut [u8],
    buf_offset: usize,
    src: &MeshView<'_>,
    axes: &[HaloAxis],
) -> Result<()> {
    let bytes = src.bytes();
    for_each_halo_run(src.layout(), axes, buf_offset, buf.len(), |b, d, len| {
        buf[b..b + len].copy_from_slice(&bytes[d..d + len]);
    })
}

/// Mirror of [`pack_halo`]: scatter the buffer into the halo region.
/// Marks the destination's residency cell on completion.
pub fn unpack_halo(
    buf: &[u8],
    buf_offset: usize,
    dst: &mut MeshViewMut<'_>,
    axes: &[HaloAxis],
) -> Result<()> {
    let layout = dst.layout();
    let bytes = dst.bytes_mut();
    for_each_halo_run(layout, axes, buf_offset, buf.len(), |b, d, len| {
        bytes[d..d + len].copy_from_slice(&buf[b..b + len]);
    })?;
    dst.mark_written();
    Ok(())
}
