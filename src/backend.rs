//! Parallel-execution backends for the block-copy dispatcher.
//!
//! A backend receives an N-d iteration space and a per-iteration byte-copy
//! body and is responsible only for scheduling: every iteration writes a
//! disjoint set of destination bytes, so no synchronization is needed
//! mid-loop and any execution order produces identical output.

use smallvec::SmallVec;

use crate::{AxisVec, MeshError, Result, MAX_DIM};

/// A raw pointer wrapper that is `Send` + `Sync`.
///
/// # Safety
/// The caller must guarantee that the pointed-to data is valid for the
/// lifetime of any parallel operation and that no data races occur
/// (different iterations write to disjoint regions).
pub(crate) struct SendPtr<T>(pub(crate) *mut T);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendPtr<T> {}

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

impl<T> SendPtr<T> {
    pub(crate) fn as_ptr(self) -> *mut T {
        self.0
    }

    pub(crate) fn as_const(self) -> *const T {
        self.0 as *const T
    }
}

/// A dense N-d iteration space: per-axis counts, axis 0 varying fastest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IterSpace {
    extents: AxisVec<usize>,
}

impl IterSpace {
    pub fn new(extents: &[usize]) -> Result<Self> {
        if extents.is_empty() || extents.len() > MAX_DIM {
            return Err(MeshError::TooManyAxes(extents.len(), MAX_DIM));
        }
        Ok(Self {
            extents: SmallVec::from_slice(extents),
        })
    }

    #[inline]
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.extents.len()
    }

    /// Total iteration count.
    #[inline]
    pub fn len(&self) -> usize {
        self.extents.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extents.iter().any(|&e| e == 0)
    }

    /// Decode a flat index into a multi-index, axis 0 fastest.
    pub fn decode(&self, mut flat: usize, idx: &mut [usize]) {
        for (i, &e) in self.extents.iter().enumerate() {
            idx[i] = flat % e;
            flat /= e;
        }
    }
}

/// Executes the iterations of an N-d space; the body copies the bytes of
/// exactly one logical element per call.
pub trait CopyBackend: Sync {
    fn execute(&self, space: &IterSpace, body: &(dyn Fn(&[usize]) + Sync));
}

/// Runs the whole space on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialBackend;

impl CopyBackend for SerialBackend {
    fn execute(&self, space: &IterSpace, body: &(dyn Fn(&[usize]) + Sync)) {
        if space.is_empty() {
            return;
        }
        let ndim = space.ndim();
        let extents = space.extents();
        let total = space.len();
        let mut idx: AxisVec<usize> = SmallVec::from_elem(0, ndim);
        for step in 0..total {
            body(&idx);
            if step + 1 == total {
                break;
            }
            let mut a = 0;
            loop {
                idx[a] += 1;
                if idx[a] < extents[a] {
                    break;
                }
                idx[a] = 0;
                a += 1;
            }
        }
    }
}

/// Splits the flattened space across the rayon thread pool once it is large
/// enough to amortize task overhead; smaller spaces run serially.
#[cfg(feature = "parallel")]
#[derive(Clone, Copy, Debug)]
pub struct RayonBackend {
    pub min_parallel_len: usize,
}

#[cfg(feature = "parallel")]
impl Default for RayonBackend {
    fn default() -> Self {
        Self {
            min_parallel_len: crate::MIN_PARALLEL_LEN,
        }
    }
}

#[cfg(feature = "parallel")]
impl CopyBackend for RayonBackend {
    fn execute(&self, space: &IterSpace, body: &(dyn Fn(&[usize]) + Sync)) {
        use rayon::prelude::*;

        let total = space.len();
        if total < self.min_parallel_len {
            return SerialBackend.execute(space, body);
        }
        let ndim = space.ndim();
        (0..total).into_par_iter().for_each(|flat| {
            let mut idx = [0usize; MAX_DIM];
            space.decode(flat, &mut idx[..ndim]);
            body(&idx[..ndim]);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn visit_sum(backend: &dyn CopyBackend, extents: &[usize]) -> (usize, usize) {
        let space = IterSpace::new(extents).unwrap();
        let count = AtomicUsize::new(0);
        let sum = AtomicUsize::new(0);
        backend.execute(&space, &|idx| {
            count.fetch_add(1, Ordering::Relaxed);
            // Weigh each axis so distinct multi-indices contribute
            // distinct totals.
            let mut enc = 0usize;
            let mut scale = 1usize;
            for (&i, &e) in idx.iter().zip(extents.iter()) {
                enc += i * scale;
                scale *= e;
            }
            sum.fetch_add(enc, Ordering::Relaxed);
        });
        (count.into_inner(), sum.into_inner())
    }

    #[test]
    fn test_serial_visits_every_index_once() {
        let (count, sum) = visit_sum(&SerialBackend, &[3, 4, 2]);
        assert_eq!(count, 24);
        assert_eq!(sum, (0..24).sum::<usize>());
    }

    #[test]
    fn test_serial_empty_axis_is_noop() {
        let (count, _) = visit_sum(&SerialBackend, &[3, 0, 2]);
        assert_eq!(count, 0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_rayon_matches_serial() {
        let backend = RayonBackend {
            min_parallel_len: 1,
        };
        let (count, sum) = visit_sum(&backend, &[5, 7, 3]);
        let (scount, ssum) = visit_sum(&SerialBackend, &[5, 7, 3]);
        assert_eq!(count, scount);
        assert_eq!(sum, ssum);
    }

    #[test]
    fn test_decode_axis0_fastest() {
        let space = IterSpace::new(&[3, 4]).unwrap();
        let mut idx = [0usize; 2];
        space.decode(7, &mut idx);
        assert_eq!(idx, [1, 2]);
    }
}
