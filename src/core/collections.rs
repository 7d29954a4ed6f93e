//! Small-buffer collection aliases used on hot geometric paths.
//!
//! A simplex of intrinsic dimension `d` has `d + 1` vertices; for the
//! dimensions met in practice this fits on the stack, so per-simplex scratch
//! buffers avoid heap allocation inside batched queries.

use smallvec::SmallVec;

/// Inline capacity covering simplices up to dimension 7.
///
/// Larger simplices still work; the buffer spills to the heap.
pub const MAX_PRACTICAL_DIMENSION_SIZE: usize = 8;

/// Stack-first buffer for short per-simplex data.
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::core::collections::SmallBuffer;
///
/// let mut buffer: SmallBuffer<usize, 4> = SmallBuffer::new();
/// buffer.extend([0, 1, 2]);
/// assert!(!buffer.spilled());
/// ```
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;

/// Buffer for the vertex indices (or coordinates along one axis) of a simplex.
pub type SimplexBuffer<T> = SmallBuffer<T, MAX_PRACTICAL_DIMENSION_SIZE>;
