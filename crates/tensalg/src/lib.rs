//! # tensalg
//!
//! A sparse-tensor algebra engine: tensor computations are written in
//! index notation (`A(i,j) = B(i,j,k) * c(k)`), compiled into specialized
//! kernels that walk compressed storage formats, and executed lazily on
//! first read.
//!
//! This is the meta crate of the stack: it provides the user-visible
//! [`Tensor`] handle, the compile → assemble → compute lifecycle, the
//! [`KernelBackend`] seam with its reference [`Interpreter`], and
//! re-exports the storage engine (`tensalg-core`) and the index-notation
//! layer (`tensalg-ir`).
//!
//! ## Quick start
//!
//! ```
//! use tensalg::prelude::*;
//!
//! // B is a CSR matrix, c a compressed vector
//! let mut b = Tensor::new("B", Datatype::Float64, &[2, 3], Format::csr()).unwrap();
//! b.insert(&[0, 0], 1.0).unwrap();
//! b.insert(&[1, 2], 2.0).unwrap();
//! b.pack().unwrap();
//!
//! let mut c = Tensor::new("c", Datatype::Float64, &[3], Format::sparse_vector()).unwrap();
//! c.insert(&[0], 3.0).unwrap();
//! c.insert(&[2], 4.0).unwrap();
//! c.pack().unwrap();
//!
//! // a(i) = B(i,k) * c(k); k is contracted
//! let mut a = Tensor::new("a", Datatype::Float64, &[2], Format::sparse_vector()).unwrap();
//! let (i, k) = (IndexVar::named("i"), IndexVar::named("k"));
//! a.assign(&[i.clone()], b.access(&[i, k.clone()]).unwrap() * c.access(&[k]).unwrap())
//!     .unwrap();
//!
//! assert_eq!(a.get_value::<f64>(&[0]).unwrap(), 3.0);
//! assert_eq!(a.get_value::<f64>(&[1]).unwrap(), 8.0);
//! ```

#![deny(warnings)]

pub mod backend;
pub mod compare;
pub mod ffi;
pub mod interp;
pub mod matrix;
pub mod tensor;
mod transpose;

// Re-exports
pub use backend::{FuncHandle, KernelBackend, Property};
pub use compare::equals;
pub use ffi::{unpack_tensor_data, RawTensor, RawTensorArg, MODE_DENSE, MODE_SPARSE};
pub use interp::Interpreter;
pub use matrix::{csc_arrays, csr_arrays, from_csc, from_csr, from_raw_csr};
pub use tensor::Tensor;

pub use tensalg_core::{
    join, make_csc_index, make_csr_index, pack_buffer, pack_entries, AlignedBytes, Array,
    Complex, Component, ComponentVal, CoordinateBuffer, Datatype, Dimension, Format,
    FormatError, Index, ModeFormat, ModeFormatPack, ModeIndex, Ownership, PackResult, Shape,
    Storage, TensorError, TensorResult, ValueIter,
};
pub use tensalg_ir::{
    derive_iteration_order, make_reduction_notation, operand_vars, required_mode_ordering,
    storage_order_vars, Access, Assignment, BinaryOp, ExprNode, ExprRewriter, ExprVisitor,
    ExprVisitorStrict, IndexExpr, IndexVar, Reduction, TensorVar,
};

/// The common imports for working with tensors and index notation.
pub mod prelude {
    pub use crate::backend::{KernelBackend, Property};
    pub use crate::compare::equals;
    pub use crate::tensor::Tensor;
    pub use tensalg_core::{Datatype, Format, ModeFormat};
    pub use tensalg_ir::{Access, BinaryOp, IndexExpr, IndexVar};
}
