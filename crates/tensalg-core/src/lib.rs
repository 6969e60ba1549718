//! # tensalg-core
//!
//! Storage engine for the tensalg sparse-tensor algebra stack.
//!
//! This crate provides:
//! - **Component types:** runtime [`Datatype`] tags, the [`Component`]
//!   scalar trait, tagged [`ComponentVal`] values
//! - **Formats:** per-mode storage kinds, super-mode packs, mode ordering,
//!   coordinate-array types
//! - **Storage:** ownership-tagged type-erased [`Array`]s, per-level
//!   [`Index`] trees, [`Storage`]
//! - **Staging & packing:** the [`CoordinateBuffer`] and the packer that
//!   sorts, deduplicates and emits compressed index arrays
//! - **Iteration:** storage-order `(coordinate, value)` walks
//!
//! # Examples
//!
//! ```
//! use tensalg_core::{pack_entries, Format, Shape};
//! use smallvec::SmallVec;
//!
//! let entries: Vec<(Shape, f64)> = vec![
//!     (SmallVec::from_slice(&[1, 0]), 3.0),
//!     (SmallVec::from_slice(&[0, 1]), 1.0),
//! ];
//! let packed = pack_entries(&[2, 2], &Format::csr(), entries).unwrap();
//! assert_eq!(packed.values.as_slice::<f64>().unwrap(), &[1.0, 3.0]);
//! ```

#![deny(warnings)]

pub mod array;
pub mod coordinate;
pub mod datatype;
pub mod dimension;
pub mod error;
pub mod format;
pub mod index;
pub mod iterate;
pub mod pack;
pub mod storage;
pub mod types;

#[cfg(test)]
mod property_tests;

// Re-exports
pub use array::{AlignedBytes, Array, Ownership};
pub use coordinate::CoordinateBuffer;
pub use datatype::{join, Complex, Component, ComponentVal, Datatype};
pub use dimension::Dimension;
pub use error::{FormatError, TensorError, TensorResult};
pub use format::{Format, ModeFormat, ModeFormatPack};
pub use index::{make_csc_index, make_csr_index, Index, ModeIndex};
pub use iterate::{entries, ValueIter};
pub use pack::{pack_buffer, pack_entries, PackResult};
pub use storage::Storage;
pub use types::Shape;
