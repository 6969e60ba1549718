//! Shared type aliases.

use smallvec::SmallVec;

/// Coordinate/shape type. Tensors of up to six modes stay off the heap.
pub type Shape = SmallVec<[usize; 6]>;
