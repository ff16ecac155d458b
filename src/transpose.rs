//! Layout transposition: permute and re-stride an N-d array between two
//! shape descriptions.
//!
//! The core routine is a single dimension-parametrized mixed-radix walk:
//! source elements are visited in flat order (axis 0 fastest), the
//! destination offset is carried incrementally through the permutation, and
//! exactly `type_size` bytes move per element. The mapping is a bijection
//! on offsets whenever the two shapes have equal element counts; a
//! destination with grown per-axis padding is also accepted ("out has to be
//! no smaller"), in which case the mapping is injective.

use smallvec::SmallVec;

#[cfg(feature = "parallel")]
use crate::backend::SendPtr;
use crate::desc::StorageMode;
use crate::{AxisVec, MeshError, Result, Tuning, MAX_DIM};

/// A layout pair may carry the spatial axes plus a component axis and a
/// repetition axis.
pub(crate) const MAX_LAYOUT_AXES: usize = MAX_DIM + 2;

/// Permute and re-stride `src` into `dst`.
///
/// Every source element at multi-index `idx` (decoded against `size_in`,
/// axis 0 fastest) lands at flat destination offset
/// `sum(idx[d] * prod(size_out[..dim_perm[d]]))`.
///
/// Fails fast — before any byte is written — when `dim_perm` is not a
/// bijection, when a destination extent cannot hold its source extent, or
/// when either buffer is too short. An empty `size_in` extent makes the
/// whole call a no-op.
pub fn transpose_bytes(
    src: &[u8],
    dst: &mut [u8],
    type_size: usize,
    size_in: &[usize],
    size_out: &[usize],
    dim_perm: &[usize],
    tuning: &Tuning,
) -> Result<()> {
    let ndim = size_in.len();
    if ndim == 0 || ndim > MAX_LAYOUT_AXES {
        return Err(MeshError::TooManyAxes(ndim, MAX_LAYOUT_AXES));
    }
    if size_out.len() != ndim {
        return Err(MeshError::RankMismatch(ndim, size_out.len()));
    }
    if dim_perm.len() != ndim {
        return Err(MeshError::RankMismatch(ndim, dim_perm.len()));
    }
    if type_size == 0 {
        return Err(MeshError::InvalidElement {
            components: 1,
            type_size,
        });
    }

    let mut seen = [false; MAX_LAYOUT_AXES];
    for &p in dim_perm {
        if p >= ndim || seen[p] {
            return Err(MeshError::NotAPermutation(dim_perm.to_vec()));
        }
        seen[p] = true;
    }
    for d in 0..ndim {
        if size_out[dim_perm[d]] < size_in[d] {
            return Err(MeshError::ShapeMismatch(
                size_in.to_vec(),
                size_out.to_vec(),
            ));
        }
    }

    let total_in: usize = size_in.iter().product();
    let total_out: usize = size_out.iter().product();
    if src.len() < total_in * type_size {
        return Err(MeshError::BufferTooSmall {
            needed: total_in * type_size,
            have: src.len(),
        });
    }
    if dst.len() < total_out * type_size {
        return Err(MeshError::BufferTooSmall {
            needed: total_out * type_size,
            have: dst.len(),
        });
    }
    if total_in == 0 {
        return Ok(());
    }

    // Destination pitch of each *input* axis: exclusive prefix products of
    // size_out, routed through the permutation.
    let mut prod_out: AxisVec<usize> = SmallVec::with_capacity(ndim);
    let mut acc = 1usize;
    for &s in size_out {
        prod_out.push(acc);
        acc *= s;
    }
    let out_pitch: AxisVec<usize> = dim_perm.iter().map(|&p| prod_out[p]).collect();

    let outer = size_in[ndim - 1];

    #[cfg(feature = "parallel")]
    if total_in >= tuning.min_parallel_len && outer > 1 {
        use rayon::prelude::*;

        // Outermost-axis slabs write disjoint destination offsets, so they
        // can run on any number of threads.
        let src_ptr = SendPtr(src.as_ptr() as *mut u8);
        let dst_ptr = SendPtr(dst.as_mut_ptr());
        (0..outer).into_par_iter().for_each(|k| unsafe {
            transpose_chunk(
                src_ptr.as_const(),
                dst_ptr.as_ptr(),
                type_size,
                size_in,
                &out_pitch,
                k,
                k + 1,
            );
        });
        return Ok(());
    }
    #[cfg(not(feature = "parallel"))]
    let _ = tuning;

    unsafe {
        transpose_chunk(
            src.as_ptr(),
            dst.as_mut_ptr(),
            type_size,
            size_in,
            &out_pitch,
            0,
            outer,
        );
    }
    Ok(())
}

/// Walk the source elements whose outermost-axis index lies in
/// `[outer_lo, outer_hi)`, copying each into its permuted destination slot.
///
/// # Safety
/// `src` must cover `prod(size_in) * type_size` bytes and `dst` must cover
/// every offset reachable through `out_pitch`; both were validated by the
/// caller. Distinct `[outer_lo, outer_hi)` windows touch disjoint
/// destination bytes.
unsafe fn transpose_chunk(
    src: *const u8,
    dst: *mut u8,
    type_size: usize,
    size_in: &[usize],
    out_pitch: &[usize],
    outer_lo: usize,
    outer_hi: usize,
) {
    let ndim = size_in.len();
    let inner: usize = size_in[..ndim - 1].iter().product();
    let chunk = inner * (outer_hi - outer_lo);
    if chunk == 0 {
        return;
    }

    let mut counters: AxisVec<usize> = SmallVec::from_elem(0, ndim);
    counters[ndim - 1] = outer_lo;
    let mut src_off = outer_lo * inner * type_size;
    let mut dst_idx = outer_lo * out_pitch[ndim - 1];

    for step in 0..chunk {
        std::ptr::copy_nonoverlapping(src.add(src_off), dst.add(dst_idx * type_size), type_size);
        src_off += type_size;
        if step + 1 == chunk {
            break;
        }
        // Multi-digit counter with per-axis radix size_in[m]; the
        // destination index carries along with each digit.
        let mut m = 0;
        loop {
            counters[m] += 1;
            dst_idx += out_pitch[m];
            if counters[m] < size_in[m] {
                break;
            }
            dst_idx -= size_in[m] * out_pitch[m];
            counters[m] = 0;
            m += 1;
        }
    }
}

/// Derivation inputs for a storage-mode conversion.
///
/// `spatial_from` / `spatial_to` are the allocated spatial extents on each
/// side — they may differ in padding, as long as every target extent holds
/// its source extent. `repeat` lays that many whole-array instances out
/// contiguously (1 = a single instance).
#[derive(Clone, Copy, Debug)]
pub struct ConvertSpec<'a> {
    pub spatial_from: &'a [usize],
    pub spatial_to: &'a [usize],
    pub components: usize,
    pub type_size: usize,
    pub from: StorageMode,
    pub to: StorageMode,
    pub repeat: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LayoutAxis {
    Component,
    Spatial(usize),
    Repeat,
}

/// Axis order, innermost first, of one side of the layout pair. The
/// component axis sits innermost when interleaved and immediately outside
/// the spatial axes when planar; the repetition axis is always outermost.
fn axis_order(
    ndim_sp: usize,
    has_comp: bool,
    has_repeat: bool,
    mode: StorageMode,
) -> AxisVec<LayoutAxis> {
    let mut order = AxisVec::new();
    if has_comp && mode == StorageMode::Interleaved {
        order.push(LayoutAxis::Component);
    }
    for d in 0..ndim_sp {
        order.push(LayoutAxis::Spatial(d));
    }
    if has_comp && mode == StorageMode::Planar {
        order.push(LayoutAxis::Component);
    }
    if has_repeat {
        order.push(LayoutAxis::Repeat);
    }
    order
}

/// Convert an array between interleaved and planar component storage,
/// optionally re-padding the spatial extents at the same time.
///
/// This is a configuration-derivation step: it builds the
/// `size_in`/`size_out`/`dim_perm` triple for the storage-mode toggle and
/// delegates to [`transpose_bytes`]. `from == to` is a pure re-padding
/// copy; `repeat == 0` is a no-op.
pub fn convert_storage(
    src: &[u8],
    dst: &mut [u8],
    spec: &ConvertSpec<'_>,
    tuning: &Tuning,
) -> Result<()> {
    let ndim_sp = spec.spatial_from.len();
    if ndim_sp == 0 || ndim_sp > MAX_DIM {
        return Err(MeshError::TooManyAxes(ndim_sp, MAX_DIM));
    }
    if spec.spatial_to.len() != ndim_sp {
        return Err(MeshError::RankMismatch(ndim_sp, spec.spatial_to.len()));
    }
    if spec.components == 0 || spec.type_size == 0 {
        return Err(MeshError::InvalidElement {
            components: spec.components,
            type_size: spec.type_size,
        });
    }

    let has_comp = spec.components > 1;
    let has_repeat = spec.repeat != 1;
    let in_order = axis_order(ndim_sp, has_comp, has_repeat, spec.from);
    let out_order = axis_order(ndim_sp, has_comp, has_repeat, spec.to);

    let size_in: AxisVec<usize> = in_order
        .iter()
        .map(|&a| match a {
            LayoutAxis::Component => spec.components,
            LayoutAxis::Spatial(d) => spec.spatial_from[d],
            LayoutAxis::Repeat => spec.repeat,
        })
        .collect();
    let size_out: AxisVec<usize> = out_order
        .iter()
        .map(|&a| match a {
            LayoutAxis::Component => spec.components,
            LayoutAxis::Spatial(d) => spec.spatial_to[d],
            LayoutAxis::Repeat => spec.repeat,
        })
        .collect();

    let mut spatial_pos: AxisVec<usize> = SmallVec::from_elem(0, ndim_sp);
    let mut comp_pos = 0usize;
    let mut repeat_pos = 0usize;
    for (i, &a) in out_order.iter().enumerate() {
        match a {
            LayoutAxis::Component => comp_pos = i,
            LayoutAxis::Spatial(d) => spatial_pos[d] = i,
            LayoutAxis::Repeat => repeat_pos = i,
        }
    }
    let dim_perm: AxisVec<usize> = in_order
        .iter()
        .map(|&a| match a {
            LayoutAxis::Component => comp_pos,
            LayoutAxis::Spatial(d) => spatial_pos[d],
            LayoutAxis::Repeat => repeat_pos,
        })
        .collect();

    tracing::debug!(
        from = ?spec.from,
        to = ?spec.to,
        axes = in_order.len(),
        repeat = spec.repeat,
        "converting storage layout"
    );

    transpose_bytes(
        src,
        dst,
        spec.type_size,
        &size_in,
        &size_out,
        &dim_perm,
        tuning,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> Tuning {
        Tuning::default()
    }

    #[test]
    fn test_rejects_non_permutation() {
        let src = [0u8; 6];
        let mut dst = [0u8; 6];
        let err = transpose_bytes(&src, &mut dst, 1, &[2, 3], &[3, 2], &[0, 0], &tuning())
            .unwrap_err();
        assert!(matches!(err, MeshError::NotAPermutation(_)));
        let err = transpose_bytes(&src, &mut dst, 1, &[2, 3], &[3, 2], &[0, 2], &tuning())
            .unwrap_err();
        assert!(matches!(err, MeshError::NotAPermutation(_)));
    }

    #[test]
    fn test_rejects_shrinking_extent() {
        let src = [0u8; 6];
        let mut dst = [0u8; 6];
        let err = transpose_bytes(&src, &mut dst, 1, &[2, 3], &[2, 2], &[0, 1], &tuning())
            .unwrap_err();
        assert!(matches!(err, MeshError::ShapeMismatch(_, _)));
    }

    #[test]
    fn test_rejects_short_destination() {
        let src = [0u8; 6];
        let mut dst = [0u8; 5];
        let err = transpose_bytes(&src, &mut dst, 1, &[2, 3], &[3, 2], &[1, 0], &tuning())
            .unwrap_err();
        assert!(matches!(err, MeshError::BufferTooSmall { .. }));
    }

    #[test]
    fn test_2d_swap_known_values() {
        // 2x3 box, axis 0 fastest: src[i + 2j] -> dst[3i + j].
        let src: Vec<u8> = (0..6).collect();
        let mut dst = vec![0u8; 6];
        transpose_bytes(&src, &mut dst, 1, &[2, 3], &[3, 2], &[1, 0], &tuning()).unwrap();
        assert_eq!(dst, vec![0, 2, 4, 1, 3, 5]);
    }

    #[test]
    fn test_identity_perm_repads() {
        // Grow axis 0 from 2 to 3 slots; the extra slot stays untouched.
        let src: Vec<u8> = (1..=4).collect();
        let mut dst = vec![0u8; 6];
        transpose_bytes(&src, &mut dst, 1, &[2, 2], &[3, 2], &[0, 1], &tuning()).unwrap();
        assert_eq!(dst, vec![1, 2, 0, 3, 4, 0]);
    }

    #[test]
    fn test_wide_elements_move_whole() {
        let src: Vec<u8> = (0..12).collect();
        let mut dst = vec![0u8; 12];
        // 3x2 of 2-byte elements, axes swapped.
        transpose_bytes(&src, &mut dst, 2, &[3, 2], &[2, 3], &[1, 0], &tuning()).unwrap();
        assert_eq!(dst, vec![0, 1, 6, 7, 2, 3, 8, 9, 4, 5, 10, 11]);
    }

    #[test]
    fn test_empty_extent_is_noop() {
        let src = [0u8; 0];
        let mut dst = [7u8; 4];
        transpose_bytes(&src, &mut dst, 1, &[0, 4], &[4, 0], &[1, 0], &tuning()).unwrap();
        assert_eq!(dst, [7u8; 4]);
    }

    #[test]
    fn test_convert_interleaved_to_planar_1d() {
        // Two components a, b over three cells: AOS -> two stacked planes.
        let src = [10u8, 20, 11, 21, 12, 22];
        let mut dst = [0u8; 6];
        let spec = ConvertSpec {
            spatial_from: &[3],
            spatial_to: &[3],
            components: 2,
            type_size: 1,
            from: StorageMode::Interleaved,
            to: StorageMode::Planar,
            repeat: 1,
        };
        convert_storage(&src, &mut dst, &spec, &tuning()).unwrap();
        assert_eq!(dst, [10, 11, 12, 20, 21, 22]);
    }

    #[test]
    fn test_convert_round_trip_2d() {
        let src: Vec<u8> = (0..48).collect();
        let mut planar = vec![0u8; 48];
        let mut back = vec![0u8; 48];
        let fwd = ConvertSpec {
            spatial_from: &[4, 3],
            spatial_to: &[4, 3],
            components: 2,
            type_size: 2,
            from: StorageMode::Interleaved,
            to: StorageMode::Planar,
            repeat: 1,
        };
        convert_storage(&src, &mut planar, &fwd, &tuning()).unwrap();
        let rev = ConvertSpec {
            from: StorageMode::Planar,
            to: StorageMode::Interleaved,
            ..fwd
        };
        convert_storage(&planar, &mut back, &rev, &tuning()).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn test_convert_with_repeat_axis() {
        // Two contiguous instances of a 2-cell, 2-component array.
        let src = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut dst = [0u8; 8];
        let spec = ConvertSpec {
            spatial_from: &[2],
            spatial_to: &[2],
            components: 2,
            type_size: 1,
            from: StorageMode::Interleaved,
            to: StorageMode::Planar,
            repeat: 2,
        };
        convert_storage(&src, &mut dst, &spec, &tuning()).unwrap();
        // Each instance converts in place: planes within the instance.
        assert_eq!(dst, [1, 3, 2, 4, 5, 7, 6, 8]);
    }
}
