//! Strided block copy between two physical layouts of one logical box.
//!
//! The two arrays describe the same logical sub-box but may differ in
//! per-axis padding and in storage mode — the correspondence between
//! elements is purely by logical index, never by byte offset. Each logical
//! index maps to disjoint destination bytes, so the loop is
//! embarrassingly parallel and is handed to a [`CopyBackend`] for
//! scheduling.

use std::time::Instant;

use crate::backend::{CopyBackend, IterSpace, SendPtr};
use crate::desc::{MeshViewMut, StorageMode};
use crate::metrics::TransferCounters;
use crate::range::GlobalRange;
use crate::{MeshError, Result};

/// Which way the bytes flow between the two views.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Copy `a` into `b`.
    Forward,
    /// Copy `b` into `a`.
    Reverse,
}

/// Copy every logical element of `range` between `a` and `b`.
///
/// Both views map `range` through their own halo offsets, so the same
/// logical cell may sit at different padded coordinates on each side. The
/// element structure (`components` x `type_size`) must match; storage modes
/// need not. When `counters` is supplied, elapsed time and bytes moved
/// (both sides counted) are accumulated — best-effort instrumentation, not
/// required for correctness.
pub fn relocate_block(
    a: &mut MeshViewMut<'_>,
    b: &mut MeshViewMut<'_>,
    range: &GlobalRange,
    direction: Direction,
    backend: &dyn CopyBackend,
    counters: Option<&TransferCounters>,
) -> Result<()> {
    let (src_layout, dst_layout) = match direction {
        Direction::Forward => (a.layout(), b.layout()),
        Direction::Reverse => (b.layout(), a.layout()),
    };

    let ndim = src_layout.ndim();
    if dst_layout.ndim() != ndim {
        return Err(MeshError::RankMismatch(ndim, dst_layout.ndim()));
    }
    if range.ndim() != ndim {
        return Err(MeshError::RankMismatch(ndim, range.ndim()));
    }
    if src_layout.components() != dst_layout.components()
        || src_layout.type_size() != dst_layout.type_size()
    {
        return Err(MeshError::ComponentMismatch {
            components: (src_layout.components(), dst_layout.components()),
            type_size: (src_layout.type_size(), dst_layout.type_size()),
        });
    }
    if range.is_empty() {
        return Ok(());
    }

    let extents = range.extents();
    let mut src_base = 0usize;
    let mut dst_base = 0usize;
    let src_pitch = src_layout.pitches();
    let dst_pitch = dst_layout.pitches();
    for axis in 0..ndim {
        src_base +=
            src_layout.padded_base(axis, range.lo(axis), extents[axis])? * src_pitch[axis];
        dst_base +=
            dst_layout.padded_base(axis, range.lo(axis), extents[axis])? * dst_pitch[axis];
    }

    let comps = src_layout.components();
    let ts = src_layout.type_size();
    let elem = src_layout.elem_size();
    let src_mode = src_layout.storage();
    let dst_mode = dst_layout.storage();
    let src_plane = src_layout.spatial_len();
    let dst_plane = dst_layout.spatial_len();

    let space = IterSpace::new(&extents)?;

    let (src_ptr, dst_ptr) = match direction {
        Direction::Forward => (
            SendPtr(a.bytes().as_ptr() as *mut u8),
            SendPtr(b.bytes_mut().as_mut_ptr()),
        ),
        Direction::Reverse => (
            SendPtr(b.bytes().as_ptr() as *mut u8),
            SendPtr(a.bytes_mut().as_mut_ptr()),
        ),
    };

    let body = |li: &[usize]| {
        let mut s_cell = src_base;
        let mut d_cell = dst_base;
        for (axis, &i) in li.iter().enumerate() {
            s_cell += i * src_pitch[axis];
            d_cell += i * dst_pitch[axis];
        }
        let src = src_ptr.as_const();
        let dst = dst_ptr.as_ptr();
        unsafe {
            if src_mode == StorageMode::Interleaved && dst_mode == StorageMode::Interleaved {
                std::ptr::copy_nonoverlapping(src.add(s_cell * elem), dst.add(d_cell * elem), elem);
            } else {
                for d in 0..comps {
                    let s_off = match src_mode {
                        StorageMode::Interleaved => s_cell * elem + d * ts,
                        StorageMode::Planar => (d * src_plane + s_cell) * ts,
                    };
                    let d_off = match dst_mode {
                        StorageMode::Interleaved => d_cell * elem + d * ts,
                        StorageMode::Planar => (d * dst_plane + d_cell) * ts,
                    };
                    std::ptr::copy_nonoverlapping(src.add(s_off), dst.add(d_off), ts);
                }
            }
        }
    };

    let started = counters.map(|_| Instant::now());
    backend.execute(&space, &body);
    if let (Some(c), Some(t0)) = (counters, started) {
        let moved = 2 * range.len() as u64 * elem as u64;
        c.record(t0.elapsed(), moved);
    }
    tracing::trace!(elems = range.len(), ?direction, "relocated block");

    match direction {
        Direction::Forward => b.mark_written(),
        Direction::Reverse => a.mark_written(),
    }
    Ok(())
}
