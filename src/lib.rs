//! Relocation and reshaping kernels for halo-padded structured-mesh arrays.
//!
//! This crate moves blocks of typed elements that live inside a larger,
//! halo-padded N-dimensional array across three axes of variation: linear
//! memory layout (interleaved-by-component vs. planar-by-component),
//! dimension ordering, and ownership boundary (which sub-box of a globally
//! indexed array a compute partition actually holds).
//!
//! # Components
//!
//! - [`transpose_bytes`] / [`convert_storage`]: permute and re-stride an
//!   N-d array between two layout descriptions ([`transpose`] module)
//! - [`extract_slab`] / [`inject_slab`] and [`pack_halo`] / [`unpack_halo`]:
//!   pack a rectangular sub-box of a padded array to/from a flat transfer
//!   buffer, with per-axis step direction ([`slab`] module)
//! - [`resolve_local_range`]: clip a globally addressed iteration range to
//!   the sub-range owned by the local partition ([`partition`] module)
//! - [`relocate_block`]: parallel strided copy between two buffers holding
//!   the same logical sub-box under different physical layouts ([`copy`]
//!   module)
//!
//! # Example
//!
//! ```rust
//! use meshpack::{extract_slab, GlobalRange, MeshLayout, MeshView, StorageMode};
//!
//! // A 2-d array padded to 6x6 with a halo of depth 1, one f64 per cell.
//! let layout = MeshLayout::new(&[6, 6], &[-1, -1], 1, 8, StorageMode::Interleaved).unwrap();
//! let data = vec![0u8; layout.required_bytes()];
//! let view = MeshView::new(&layout, &data).unwrap();
//!
//! // Pull the 4x4 interior out into a flat buffer.
//! let range = GlobalRange::from_flat(&[0, 4, 0, 4]).unwrap();
//! let mut buf = vec![0u8; 4 * 4 * 8];
//! extract_slab(&mut buf, &view, &[4, 4], &range).unwrap();
//! ```
//!
//! Every operation is a pure transformation over its explicit inputs: no
//! component holds state across calls, and each output byte is written by
//! exactly one iteration, so any parallelization granularity produces
//! identical results.

pub mod backend;
pub mod copy;
pub mod desc;
pub mod metrics;
pub mod partition;
pub mod range;
pub mod slab;
pub mod transpose;

pub use backend::{CopyBackend, IterSpace, SerialBackend};
#[cfg(feature = "parallel")]
pub use backend::RayonBackend;
pub use copy::{relocate_block, Direction};
pub use desc::{MemorySide, MeshLayout, MeshView, MeshViewMut, ResidencyCell, StorageMode};
pub use metrics::{CounterRegistry, TransferCounters};
pub use partition::{resolve_local_range, BoxPartition, Partition, SoleOwner};
pub use range::{AccessPattern, GlobalRange};
pub use slab::{extract_slab, inject_slab, pack_halo, unpack_halo, HaloAxis};
pub use transpose::{convert_storage, transpose_bytes, ConvertSpec};

use smallvec::SmallVec;

/// Maximum spatial dimensionality of a mesh array.
pub const MAX_DIM: usize = 5;

/// Minimum element count before a kernel splits work across threads.
pub const MIN_PARALLEL_LEN: usize = 1 << 15;

/// Per-axis scratch vector. Inline capacity covers the spatial axes plus the
/// component and repetition axes a layout pair can add.
pub(crate) type AxisVec<T> = SmallVec<[T; 8]>;

/// Tuning knobs threaded explicitly into calls that can parallelize.
///
/// There is deliberately no process-wide configuration: behavior must be
/// reproducible from a call's arguments alone.
#[derive(Clone, Copy, Debug)]
pub struct Tuning {
    /// Element count below which the transposer stays single-threaded.
    pub min_parallel_len: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            min_parallel_len: MIN_PARALLEL_LEN,
        }
    }
}

/// Errors that can occur while relocating or reshaping mesh data.
///
/// Configuration errors are raised before any memory is touched; an
/// operation either fails whole or runs whole. An empty iteration range is
/// *not* an error anywhere in this crate — it is a no-op outcome callers
/// branch on.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    /// Axis count exceeds the supported maximum.
    #[error("axis count {0} exceeds supported maximum {1}")]
    TooManyAxes(usize, usize),

    /// Two inputs disagree on dimensionality.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// `dim_perm` is not a bijection on the axis set.
    #[error("dim_perm is not a permutation: {0:?}")]
    NotAPermutation(Vec<usize>),

    /// Destination extents cannot hold the source extents.
    #[error("shape mismatch: {0:?} does not fit in {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// A requested range falls outside the padded allocation.
    #[error("range [{lo}, {hi}) on axis {axis} outside padded extent {size}")]
    OutOfBounds {
        axis: usize,
        lo: isize,
        hi: isize,
        size: usize,
    },

    /// A caller-supplied buffer cannot hold the packed box.
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    /// Two arrays disagree on element structure.
    #[error(
        "component layout mismatch: {}x{} byte components vs {}x{} byte components",
        .components.0, .type_size.0, .components.1, .type_size.1
    )]
    ComponentMismatch {
        components: (usize, usize),
        type_size: (usize, usize),
    },

    /// A halo scan step other than +1 or -1.
    #[error("invalid step {0}: must be +1 or -1")]
    InvalidStep(isize),

    /// A halo depth that extends above the logical origin.
    #[error("halo offset must be non-positive: got {value} on axis {axis}")]
    InvalidHalo { axis: usize, value: isize },

    /// A degenerate element description.
    #[error("invalid element: {components} components of {type_size} bytes")]
    InvalidElement { components: usize, type_size: usize },
}

/// Result type for mesh data-movement operations.
pub type Result<T> = std::result::Result<T, MeshError>;
