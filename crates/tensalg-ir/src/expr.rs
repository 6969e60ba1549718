//! The index-notation expression tree.
//!
//! Expressions are `Rc`-shared tagged unions; rewriters hand back the same
//! node when nothing underneath changed, so trees share structure
//! aggressively. The data type of a binary node is the widening join of
//! its operands.
//!
//! # Examples
//!
//! ```
//! use tensalg_core::{Datatype, Format};
//! use tensalg_ir::{Access, IndexExpr, IndexVar, TensorVar};
//!
//! let (i, j) = (IndexVar::named("i"), IndexVar::named("j"));
//! let b = TensorVar::new("B", Datatype::Float64, vec![2, 2], Format::csr());
//! let expr = IndexExpr::from(Access::new(b, vec![i, j]).unwrap()) * 2.0;
//! assert_eq!(expr.dtype(), Datatype::Float64);
//! ```

use std::fmt;
use std::ops;
use std::rc::Rc;

use tensalg_core::{join, Component, ComponentVal, Datatype, TensorError, TensorResult};

use crate::var::{IndexVar, TensorVar};

/// A binary operator, also used for reductions and compound assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Applies the operator to two components.
    pub fn apply<T: Component>(self, a: T, b: T) -> T {
        match self {
            BinaryOp::Add => T::add(a, b),
            BinaryOp::Sub => T::sub(a, b),
            BinaryOp::Mul => T::mul(a, b),
            BinaryOp::Div => T::div(a, b),
        }
    }

    /// The fold seed for a reduction under this operator.
    pub fn identity<T: Component>(self) -> T {
        match self {
            BinaryOp::Add | BinaryOp::Sub => T::zero(),
            BinaryOp::Mul | BinaryOp::Div => T::one(),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        write!(f, "{symbol}")
    }
}

/// A read of a tensor at a list of index variables.
#[derive(Debug, Clone)]
pub struct Access {
    pub tensor: TensorVar,
    pub indices: Vec<IndexVar>,
}

impl Access {
    /// Builds an access; the index arity must equal the tensor order.
    pub fn new(tensor: TensorVar, indices: Vec<IndexVar>) -> TensorResult<Access> {
        if indices.len() != tensor.order() {
            return Err(TensorError::ArityMismatch {
                expected: tensor.order(),
                got: indices.len(),
            });
        }
        Ok(Access { tensor, indices })
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.tensor)?;
        for (i, var) in self.indices.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{var}")?;
        }
        write!(f, ")")
    }
}

/// An implicit reduction over one index variable.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub op: BinaryOp,
    pub var: IndexVar,
    pub body: IndexExpr,
}

/// One node of an expression tree.
#[derive(Debug)]
pub enum ExprNode {
    Access(Access),
    Literal(ComponentVal),
    Neg(IndexExpr),
    Sqrt(IndexExpr),
    Add(IndexExpr, IndexExpr),
    Sub(IndexExpr, IndexExpr),
    Mul(IndexExpr, IndexExpr),
    Div(IndexExpr, IndexExpr),
    Reduction(Reduction),
}

/// A shared-ownership handle to an expression tree.
#[derive(Debug, Clone)]
pub struct IndexExpr {
    node: Rc<ExprNode>,
}

impl IndexExpr {
    fn wrap(node: ExprNode) -> IndexExpr {
        IndexExpr {
            node: Rc::new(node),
        }
    }

    /// A literal component value.
    pub fn literal<T: Component>(value: T) -> IndexExpr {
        IndexExpr::wrap(ExprNode::Literal(value.to_val()))
    }

    /// A reduction of `body` over `var` under `op`.
    pub fn reduction(op: BinaryOp, var: IndexVar, body: IndexExpr) -> IndexExpr {
        IndexExpr::wrap(ExprNode::Reduction(Reduction { op, var, body }))
    }

    /// The square root of this expression.
    pub fn sqrt(self) -> IndexExpr {
        IndexExpr::wrap(ExprNode::Sqrt(self))
    }

    /// The node behind this handle.
    #[inline]
    pub fn node(&self) -> &ExprNode {
        &self.node
    }

    /// True if both handles point at the same node.
    #[inline]
    pub fn ptr_eq(&self, other: &IndexExpr) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// The component type of this expression: the widening join of its
    /// operands.
    pub fn dtype(&self) -> Datatype {
        match self.node() {
            ExprNode::Access(access) => access.tensor.dtype(),
            ExprNode::Literal(value) => value.dtype(),
            ExprNode::Neg(arg) | ExprNode::Sqrt(arg) => arg.dtype(),
            ExprNode::Add(lhs, rhs)
            | ExprNode::Sub(lhs, rhs)
            | ExprNode::Mul(lhs, rhs)
            | ExprNode::Div(lhs, rhs) => join(lhs.dtype(), rhs.dtype()),
            ExprNode::Reduction(reduction) => reduction.body.dtype(),
        }
    }

    /// The index variables read by this expression, unique, in first
    /// appearance order.
    pub fn index_vars(&self) -> Vec<IndexVar> {
        let mut vars = Vec::new();
        collect_vars(self, &mut vars);
        vars
    }
}

fn collect_vars(expr: &IndexExpr, out: &mut Vec<IndexVar>) {
    match expr.node() {
        ExprNode::Access(access) => {
            for var in &access.indices {
                if !out.contains(var) {
                    out.push(var.clone());
                }
            }
        }
        ExprNode::Literal(_) => {}
        ExprNode::Neg(arg) | ExprNode::Sqrt(arg) => collect_vars(arg, out),
        ExprNode::Add(lhs, rhs)
        | ExprNode::Sub(lhs, rhs)
        | ExprNode::Mul(lhs, rhs)
        | ExprNode::Div(lhs, rhs) => {
            collect_vars(lhs, out);
            collect_vars(rhs, out);
        }
        ExprNode::Reduction(reduction) => collect_vars(&reduction.body, out),
    }
}

impl From<Access> for IndexExpr {
    fn from(access: Access) -> IndexExpr {
        IndexExpr::wrap(ExprNode::Access(access))
    }
}

macro_rules! impl_literal_from {
    ($($t:ty),*) => {
        $(impl From<$t> for IndexExpr {
            fn from(value: $t) -> IndexExpr {
                IndexExpr::literal(value)
            }
        })*
    };
}

impl_literal_from!(f32, f64, i32, i64);

impl<R: Into<IndexExpr>> ops::Add<R> for IndexExpr {
    type Output = IndexExpr;
    fn add(self, rhs: R) -> IndexExpr {
        IndexExpr::wrap(ExprNode::Add(self, rhs.into()))
    }
}

impl<R: Into<IndexExpr>> ops::Sub<R> for IndexExpr {
    type Output = IndexExpr;
    fn sub(self, rhs: R) -> IndexExpr {
        IndexExpr::wrap(ExprNode::Sub(self, rhs.into()))
    }
}

impl<R: Into<IndexExpr>> ops::Mul<R> for IndexExpr {
    type Output = IndexExpr;
    fn mul(self, rhs: R) -> IndexExpr {
        IndexExpr::wrap(ExprNode::Mul(self, rhs.into()))
    }
}

impl<R: Into<IndexExpr>> ops::Div<R> for IndexExpr {
    type Output = IndexExpr;
    fn div(self, rhs: R) -> IndexExpr {
        IndexExpr::wrap(ExprNode::Div(self, rhs.into()))
    }
}

impl ops::Neg for IndexExpr {
    type Output = IndexExpr;
    fn neg(self) -> IndexExpr {
        IndexExpr::wrap(ExprNode::Neg(self))
    }
}

impl fmt::Display for IndexExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            ExprNode::Access(access) => write!(f, "{access}"),
            ExprNode::Literal(value) => write!(f, "{value}"),
            ExprNode::Neg(arg) => write!(f, "-({arg})"),
            ExprNode::Sqrt(arg) => write!(f, "sqrt({arg})"),
            ExprNode::Add(lhs, rhs) => write!(f, "({lhs} + {rhs})"),
            ExprNode::Sub(lhs, rhs) => write!(f, "({lhs} - {rhs})"),
            ExprNode::Mul(lhs, rhs) => write!(f, "({lhs} * {rhs})"),
            ExprNode::Div(lhs, rhs) => write!(f, "({lhs} / {rhs})"),
            ExprNode::Reduction(r) => write!(f, "reduce({}, {}, {})", r.op, r.var, r.body),
        }
    }
}
