//! Unified error types for the tensalg storage engine.
//!
//! User-error-class conditions (wrong arity, type mismatches, malformed
//! formats, lifecycle calls out of order) are reported through
//! [`TensorError`]. Programming-error-class invariant violations panic.

use thiserror::Error;

use crate::datatype::Datatype;

/// Top-level error type for tensor construction, packing and evaluation.
#[derive(Error, Debug)]
pub enum TensorError {
    /// A coordinate or index list has the wrong number of entries.
    #[error("wrong number of coordinates: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// A value's type does not match the tensor's component type.
    #[error("component type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: Datatype, got: Datatype },

    /// A coordinate component is outside the tensor's dimensions.
    #[error("coordinate {coord:?} is out of bounds for dimensions {dims:?}")]
    OutOfBounds { coord: Vec<usize>, dims: Vec<usize> },

    /// The format description is malformed.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// compile/assemble/compute was called on a tensor with no assignment.
    #[error("tensor has no expression to compile")]
    CompileWithoutExpression,

    /// assemble was called before compile.
    #[error("assemble called before compile")]
    AssembleWithoutCompile,

    /// compute was called before compile.
    #[error("compute called before compile")]
    ComputeWithoutCompile,

    /// Reserved for functionality beyond the supported mode kinds.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A value operation on a component type with no numeric semantics.
    #[error("component type {0} does not support value operations")]
    NonNumericComponent(Datatype),

    /// An operand referenced by an expression is no longer alive.
    #[error("operand tensor '{0}' is no longer alive")]
    UnknownOperand(String),

    /// The kernel backend reported a failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors raised while constructing or validating a [`crate::format::Format`].
#[derive(Error, Debug, Clone)]
pub enum FormatError {
    #[error("mode ordering {ordering:?} is not a permutation of 0..{order}")]
    InvalidModeOrdering { ordering: Vec<usize>, order: usize },

    #[error("unsupported mode format: {0}")]
    UnsupportedMode(String),

    #[error("format order {format_order} does not match dimension count {dims}")]
    OrderMismatch { format_order: usize, dims: usize },

    #[error("level array type {0} is not an integer type")]
    NonIntegerCoordinateType(Datatype),

    #[error("expected {expected} level array type lists, got {got}")]
    LevelArrayCount { expected: usize, got: usize },
}

/// Result type alias for storage-engine operations.
pub type TensorResult<T> = Result<T, TensorError>;
