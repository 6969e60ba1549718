//! Packed tensor storage.

use crate::array::Array;
use crate::datatype::Datatype;
use crate::format::Format;
use crate::index::Index;

/// Owns the packed representation of one tensor: the per-level index
/// arrays and the values buffer, tied to a [`Format`].
///
/// The storage exclusively owns its arrays; replacing the index or values
/// releases the previous buffers unless they were registered as
/// user-owned.
#[derive(Debug)]
pub struct Storage {
    dtype: Datatype,
    index: Index,
    values: Array,
}

impl Storage {
    /// Empty storage for a tensor of the given component type and
    /// dimensions. Dense levels are seeded with their extents; sparse
    /// levels stay unassembled.
    pub fn new(dtype: Datatype, dims: &[usize], format: Format) -> Storage {
        Storage {
            dtype,
            index: Index::with_dense_extents(format, dims),
            values: Array::zeroed(dtype, 0),
        }
    }

    /// The component type of the values.
    #[inline]
    pub fn dtype(&self) -> Datatype {
        self.dtype
    }

    /// The storage format.
    #[inline]
    pub fn format(&self) -> &Format {
        self.index.format()
    }

    /// The index arrays.
    #[inline]
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Replaces the index arrays.
    pub fn set_index(&mut self, index: Index) {
        self.index = index;
    }

    /// The values buffer.
    #[inline]
    pub fn values(&self) -> &Array {
        &self.values
    }

    /// Mutable access to the values buffer.
    #[inline]
    pub fn values_mut(&mut self) -> &mut Array {
        &mut self.values
    }

    /// Replaces the values buffer.
    pub fn set_values(&mut self, values: Array) {
        self.values = values;
    }

    /// Total footprint: index arrays plus values, in bytes.
    pub fn size_in_bytes(&self) -> usize {
        let mut bytes = 0;
        for level in 0..self.index.num_mode_indices() {
            for array in self.index.mode_index(level).arrays() {
                bytes += array.size_in_bytes();
            }
        }
        bytes + self.values.size_in_bytes()
    }
}
