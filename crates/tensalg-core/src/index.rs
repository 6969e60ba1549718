//! Compressed index trees.
//!
//! An [`Index`] holds one [`ModeIndex`] per stored level. What the arrays
//! of a mode index mean is dictated by the level's kind: dense levels hold
//! a single one-entry extent array, sparse levels hold `pos` and `crd`.
//! For a sparse level below `n` parent positions, `pos` has `n + 1`
//! entries starting at zero, is monotone non-decreasing, and each parent's
//! `crd[pos[k]..pos[k+1]]` run is strictly increasing.

use crate::array::Array;
use crate::datatype::Datatype;
use crate::format::{Format, ModeFormat};

/// The index arrays of one stored level.
#[derive(Debug)]
pub struct ModeIndex {
    arrays: Vec<Array>,
}

impl ModeIndex {
    pub fn new(arrays: Vec<Array>) -> ModeIndex {
        ModeIndex { arrays }
    }

    /// A level with no arrays yet (unassembled sparse level).
    pub fn empty() -> ModeIndex {
        ModeIndex { arrays: Vec::new() }
    }

    #[inline]
    pub fn num_arrays(&self) -> usize {
        self.arrays.len()
    }

    /// The `i`-th index array of this level.
    ///
    /// # Panics
    ///
    /// Panics if the level has fewer than `i + 1` arrays.
    #[inline]
    pub fn array(&self, i: usize) -> &Array {
        &self.arrays[i]
    }

    #[inline]
    pub fn arrays(&self) -> &[Array] {
        &self.arrays
    }

    /// Consumes the level, yielding its arrays.
    pub fn into_arrays(self) -> Vec<Array> {
        self.arrays
    }
}

/// The per-level index arrays of a packed tensor, in storage order.
#[derive(Debug)]
pub struct Index {
    format: Format,
    mode_indices: Vec<ModeIndex>,
}

impl Index {
    /// Builds an index over the given per-level arrays.
    ///
    /// # Panics
    ///
    /// Panics unless one mode index is supplied per format level.
    pub fn new(format: Format, mode_indices: Vec<ModeIndex>) -> Index {
        assert_eq!(
            format.order(),
            mode_indices.len(),
            "one mode index per format level"
        );
        Index {
            format,
            mode_indices,
        }
    }

    /// An index with empty levels, except dense levels which are seeded
    /// with their runtime extents.
    pub fn with_dense_extents(format: Format, dims: &[usize]) -> Index {
        let mode_formats = format.mode_formats();
        let ordering = format.mode_ordering().to_vec();
        let mode_indices = mode_formats
            .iter()
            .enumerate()
            .map(|(level, mode)| match mode {
                ModeFormat::Dense(_) => {
                    let extent = dims[ordering[level]] as i64;
                    let dtype = format.level_array_types()[level][0];
                    ModeIndex::new(vec![
                        Array::from_i64s(dtype, &[extent]).expect("integer extent array")
                    ])
                }
                ModeFormat::Sparse => ModeIndex::empty(),
            })
            .collect();
        Index {
            format,
            mode_indices,
        }
    }

    #[inline]
    pub fn format(&self) -> &Format {
        &self.format
    }

    #[inline]
    pub fn num_mode_indices(&self) -> usize {
        self.mode_indices.len()
    }

    /// The index arrays of stored level `level`.
    #[inline]
    pub fn mode_index(&self, level: usize) -> &ModeIndex {
        &self.mode_indices[level]
    }

    /// Consumes the index, yielding its per-level arrays.
    pub fn into_mode_indices(self) -> Vec<ModeIndex> {
        self.mode_indices
    }

    /// Total number of value slots the index describes: dense levels
    /// multiply their extents, sparse levels narrow to their stored
    /// coordinate count. Zero for an unassembled sparse level.
    pub fn size(&self) -> usize {
        let mut slots = 1usize;
        for (level, mode) in self.format.mode_formats().iter().enumerate() {
            let mode_index = &self.mode_indices[level];
            match mode {
                ModeFormat::Dense(_) => {
                    if mode_index.num_arrays() == 0 {
                        return 0;
                    }
                    slots *= mode_index.array(0).get_int(0) as usize;
                }
                ModeFormat::Sparse => {
                    if mode_index.num_arrays() < 2 {
                        return 0;
                    }
                    let pos = mode_index.array(0);
                    if pos.len() < slots + 1 {
                        return 0;
                    }
                    slots = pos.get_int(slots) as usize;
                }
            }
        }
        slots
    }
}

/// Builds a CSR index from row pointer and column index arrays.
pub fn make_csr_index(num_rows: usize, rowptr: Vec<i32>, colidx: Vec<i32>) -> Index {
    let format = Format::csr();
    let extent = Array::from_i64s(Datatype::Int32, &[num_rows as i64]).expect("extent array");
    Index::new(
        format,
        vec![
            ModeIndex::new(vec![extent]),
            ModeIndex::new(vec![Array::from_vec(rowptr), Array::from_vec(colidx)]),
        ],
    )
}

/// Builds a CSC index from column pointer and row index arrays.
pub fn make_csc_index(num_cols: usize, colptr: Vec<i32>, rowidx: Vec<i32>) -> Index {
    let format = Format::csc();
    let extent = Array::from_i64s(Datatype::Int32, &[num_cols as i64]).expect("extent array");
    Index::new(
        format,
        vec![
            ModeIndex::new(vec![extent]),
            ModeIndex::new(vec![Array::from_vec(colptr), Array::from_vec(rowidx)]),
        ],
    )
}
