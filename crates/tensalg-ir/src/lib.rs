//! # tensalg-ir
//!
//! Index-notation layer of the tensalg stack: expression trees over index
//! variables, the visitor/rewriter framework, assignments with
//! reduction-notation canonicalization, and the global iteration-order
//! derivation the lowering backend depends on.
//!
//! # Examples
//!
//! ```
//! use tensalg_core::{Datatype, Format};
//! use tensalg_ir::{
//!     make_reduction_notation, Access, Assignment, IndexExpr, IndexVar, TensorVar,
//! };
//!
//! let (i, j, k) = (
//!     IndexVar::named("i"),
//!     IndexVar::named("j"),
//!     IndexVar::named("k"),
//! );
//! let a = TensorVar::new("A", Datatype::Float64, vec![2, 3], Format::csr());
//! let b = TensorVar::new("B", Datatype::Float64, vec![2, 3, 4], Format::csf(3));
//! let c = TensorVar::new("c", Datatype::Float64, vec![4], Format::sparse_vector());
//!
//! // A(i,j) = B(i,j,k) * c(k); the contracted k becomes a reduction
//! let lhs = Access::new(a, vec![i.clone(), j.clone()]).unwrap();
//! let rhs = IndexExpr::from(Access::new(b, vec![i, j, k.clone()]).unwrap())
//!     * IndexExpr::from(Access::new(c, vec![k.clone()]).unwrap());
//! let assignment = make_reduction_notation(&Assignment::new(lhs, rhs));
//! assert_eq!(assignment.reduction_vars(), vec![k]);
//! ```

#![deny(warnings)]

pub mod assignment;
pub mod expr;
pub mod order;
pub mod var;
pub mod visit;

// Re-exports
pub use assignment::{make_reduction_notation, Assignment};
pub use expr::{Access, BinaryOp, ExprNode, IndexExpr, Reduction};
pub use order::{derive_iteration_order, required_mode_ordering, storage_order_vars};
pub use var::{IndexVar, TensorVar};
pub use visit::{operand_vars, ExprRewriter, ExprVisitor, ExprVisitorStrict};
