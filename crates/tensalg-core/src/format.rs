//! Storage format descriptions.
//!
//! A [`Format`] describes how each tensor mode is stored: the per-mode
//! storage kinds (grouped into [`ModeFormatPack`] super-modes), the
//! mode-ordering permutation giving the storage order of the logical modes,
//! and the element types of the per-level coordinate arrays.
//!
//! # Examples
//!
//! ```
//! use tensalg_core::format::{Format, ModeFormat};
//!
//! // CSR: dense rows over compressed columns.
//! let csr = Format::csr();
//! assert_eq!(csr.order(), 2);
//! assert_eq!(csr.mode_ordering(), &[0, 1]);
//!
//! // CSC stores the column mode first.
//! let csc = Format::csc();
//! assert_eq!(csc.mode_ordering(), &[1, 0]);
//! assert_eq!(csr.mode_formats(), csc.mode_formats());
//! assert_ne!(csr, csc);
//! ```

use std::fmt;

use crate::datatype::Datatype;
use crate::dimension::Dimension;
use crate::error::{FormatError, TensorResult};

/// Storage kind of one tensor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFormat {
    /// The mode is stored as a contiguous range `[0, size)`; no coordinate
    /// array is needed. May carry a statically known extent.
    Dense(Dimension),
    /// The mode is stored as compressed `(pos, crd)` arrays.
    Sparse,
}

impl ModeFormat {
    /// A dense mode whose extent comes from the tensor dimensions.
    pub fn dense() -> ModeFormat {
        ModeFormat::Dense(Dimension::Variable)
    }

    /// A dense mode with a statically known extent.
    pub fn dense_fixed(size: usize) -> ModeFormat {
        ModeFormat::Dense(Dimension::Fixed(size))
    }

    /// A compressed mode.
    pub fn sparse() -> ModeFormat {
        ModeFormat::Sparse
    }

    /// True if every coordinate in `[0, size)` is stored.
    pub fn is_full(self) -> bool {
        matches!(self, ModeFormat::Dense(_))
    }

    /// True if stored coordinates appear in ascending order.
    pub fn is_ordered(self) -> bool {
        true
    }

    /// True if no coordinate is stored more than once.
    pub fn is_unique(self) -> bool {
        true
    }

    /// True for dense modes.
    pub fn is_dense(self) -> bool {
        matches!(self, ModeFormat::Dense(_))
    }

    /// True for compressed modes.
    pub fn is_sparse(self) -> bool {
        matches!(self, ModeFormat::Sparse)
    }
}

impl fmt::Display for ModeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeFormat::Dense(Dimension::Fixed(n)) => write!(f, "dense({n})"),
            ModeFormat::Dense(Dimension::Variable) => write!(f, "dense"),
            ModeFormat::Sparse => write!(f, "sparse"),
        }
    }
}

/// An ordered group of mode formats stored contiguously as one super-mode,
/// which is how block formats are described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeFormatPack {
    formats: Vec<ModeFormat>,
}

impl ModeFormatPack {
    pub fn new(formats: Vec<ModeFormat>) -> ModeFormatPack {
        ModeFormatPack { formats }
    }

    /// The mode formats in the pack, in storage order.
    #[inline]
    pub fn formats(&self) -> &[ModeFormat] {
        &self.formats
    }

    /// Number of modes in the pack.
    #[inline]
    pub fn size(&self) -> usize {
        self.formats.len()
    }
}

impl From<ModeFormat> for ModeFormatPack {
    fn from(format: ModeFormat) -> Self {
        ModeFormatPack::new(vec![format])
    }
}

/// A complete tensor storage format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    packs: Vec<ModeFormatPack>,
    mode_ordering: Vec<usize>,
    level_array_types: Vec<Vec<Datatype>>,
}

impl Format {
    /// A format over the given per-level mode formats with the identity
    /// mode ordering.
    pub fn new(formats: Vec<ModeFormat>) -> TensorResult<Format> {
        let order = formats.len();
        Format::with_ordering(formats, (0..order).collect())
    }

    /// A format whose level `l` stores logical mode `ordering[l]`.
    ///
    /// The ordering must be a permutation of `[0, order)`.
    pub fn with_ordering(formats: Vec<ModeFormat>, ordering: Vec<usize>) -> TensorResult<Format> {
        Format::from_packs(formats.into_iter().map(ModeFormatPack::from).collect(), ordering)
    }

    /// A format over explicit super-mode packs.
    pub fn from_packs(packs: Vec<ModeFormatPack>, ordering: Vec<usize>) -> TensorResult<Format> {
        let order: usize = packs.iter().map(ModeFormatPack::size).sum();
        if ordering.len() != order || !is_permutation(&ordering, order) {
            return Err(FormatError::InvalidModeOrdering {
                ordering,
                order,
            }
            .into());
        }
        let mut format = Format {
            packs,
            mode_ordering: ordering,
            level_array_types: Vec::new(),
        };
        format.level_array_types = format
            .mode_formats()
            .iter()
            .map(|mode| match mode {
                ModeFormat::Dense(_) => vec![Datatype::Int32],
                ModeFormat::Sparse => vec![Datatype::Int32, Datatype::Int32],
            })
            .collect();
        Ok(format)
    }

    /// The order-zero format of a scalar.
    pub fn scalar() -> Format {
        Format {
            packs: Vec::new(),
            mode_ordering: Vec::new(),
            level_array_types: Vec::new(),
        }
    }

    /// Compressed sparse row: dense rows over compressed columns.
    pub fn csr() -> Format {
        Format::new(vec![ModeFormat::dense(), ModeFormat::sparse()]).expect("csr format")
    }

    /// Compressed sparse column: the column mode stored first.
    pub fn csc() -> Format {
        Format::with_ordering(
            vec![ModeFormat::dense(), ModeFormat::sparse()],
            vec![1, 0],
        )
        .expect("csc format")
    }

    /// Compressed sparse fiber: every mode compressed, identity ordering.
    pub fn csf(order: usize) -> Format {
        Format::new(vec![ModeFormat::sparse(); order]).expect("csf format")
    }

    /// Every mode dense, identity ordering.
    pub fn dense(order: usize) -> Format {
        Format::new(vec![ModeFormat::dense(); order]).expect("dense format")
    }

    /// A compressed vector.
    pub fn sparse_vector() -> Format {
        Format::new(vec![ModeFormat::sparse()]).expect("sparse vector format")
    }

    /// Number of modes.
    #[inline]
    pub fn order(&self) -> usize {
        self.mode_ordering.len()
    }

    /// The super-mode packs.
    #[inline]
    pub fn packs(&self) -> &[ModeFormatPack] {
        &self.packs
    }

    /// The per-level mode formats, flattened across packs in storage-level
    /// order. Level `l` of the stored index tree has kind
    /// `mode_formats()[l]`.
    pub fn mode_formats(&self) -> Vec<ModeFormat> {
        self.packs
            .iter()
            .flat_map(|pack| pack.formats().iter().copied())
            .collect()
    }

    /// The logical mode stored at each level.
    #[inline]
    pub fn mode_ordering(&self) -> &[usize] {
        &self.mode_ordering
    }

    /// The element types of the coordinate arrays at each level.
    #[inline]
    pub fn level_array_types(&self) -> &[Vec<Datatype>] {
        &self.level_array_types
    }

    /// Overrides the per-level coordinate array element types.
    ///
    /// Each level needs as many types as its kind has arrays (one for
    /// dense extents, two for sparse `pos`/`crd`), and all of them must be
    /// integer types.
    pub fn with_level_array_types(mut self, types: Vec<Vec<Datatype>>) -> TensorResult<Format> {
        if types.len() != self.order() {
            return Err(FormatError::LevelArrayCount {
                expected: self.order(),
                got: types.len(),
            }
            .into());
        }
        for (mode, level_types) in self.mode_formats().iter().zip(types.iter()) {
            let expected = match mode {
                ModeFormat::Dense(_) => 1,
                ModeFormat::Sparse => 2,
            };
            if level_types.len() != expected {
                return Err(FormatError::LevelArrayCount {
                    expected,
                    got: level_types.len(),
                }
                .into());
            }
            for &dtype in level_types {
                if !dtype.is_integer() {
                    return Err(FormatError::NonIntegerCoordinateType(dtype).into());
                }
            }
        }
        self.level_array_types = types;
        Ok(self)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, mode) in self.mode_formats().iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{mode}")?;
        }
        write!(f, "; {:?})", self.mode_ordering)
    }
}

fn is_permutation(ordering: &[usize], order: usize) -> bool {
    let mut seen = vec![false; order];
    for &mode in ordering {
        if mode >= order || seen[mode] {
            return false;
        }
        seen[mode] = true;
    }
    true
}
