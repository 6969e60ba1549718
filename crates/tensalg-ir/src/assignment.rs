//! Assignments and reduction-notation canonicalization.

use std::fmt;

use crate::expr::{Access, BinaryOp, ExprNode, IndexExpr, Reduction};
use crate::var::IndexVar;
use crate::visit::ExprVisitor;

/// The binding `lhs(indices) = rhs`, optionally under a compound operator
/// (`lhs += rhs` style). Free variables are the lhs indices; every rhs
/// variable not on the lhs is a reduction variable.
#[derive(Debug, Clone)]
pub struct Assignment {
    lhs: Access,
    rhs: IndexExpr,
    op: Option<BinaryOp>,
}

impl Assignment {
    pub fn new(lhs: Access, rhs: IndexExpr) -> Assignment {
        Assignment { lhs, rhs, op: None }
    }

    /// An assignment that combines with the existing contents under `op`.
    pub fn compound(lhs: Access, op: BinaryOp, rhs: IndexExpr) -> Assignment {
        Assignment {
            lhs,
            rhs,
            op: Some(op),
        }
    }

    #[inline]
    pub fn lhs(&self) -> &Access {
        &self.lhs
    }

    #[inline]
    pub fn rhs(&self) -> &IndexExpr {
        &self.rhs
    }

    #[inline]
    pub fn op(&self) -> Option<BinaryOp> {
        self.op
    }

    /// The same assignment with a replacement right-hand side.
    pub fn with_rhs(&self, rhs: IndexExpr) -> Assignment {
        Assignment {
            lhs: self.lhs.clone(),
            rhs,
            op: self.op,
        }
    }

    /// The free variables, in lhs order.
    pub fn free_vars(&self) -> Vec<IndexVar> {
        self.lhs.indices.clone()
    }

    /// The rhs variables absent from the lhs, in first-appearance order.
    pub fn reduction_vars(&self) -> Vec<IndexVar> {
        let free = self.free_vars();
        self.rhs
            .index_vars()
            .into_iter()
            .filter(|var| !free.contains(var))
            .collect()
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Some(op) => write!(f, "{} {}= {}", self.lhs, op, self.rhs),
            None => write!(f, "{} = {}", self.lhs, self.rhs),
        }
    }
}

/// Canonicalizes an assignment into reduction notation: the rhs is split
/// at top-level additions and subtractions, and each term is wrapped in an
/// additive [`Reduction`] for every contracted variable it reads.
/// Variables already bound by an explicit reduction are left alone, so the
/// transformation is idempotent.
pub fn make_reduction_notation(assignment: &Assignment) -> Assignment {
    let free = assignment.free_vars();
    let rhs = reduce_terms(assignment.rhs(), &free);
    assignment.with_rhs(rhs)
}

fn reduce_terms(expr: &IndexExpr, free: &[IndexVar]) -> IndexExpr {
    match expr.node() {
        ExprNode::Add(lhs, rhs) => {
            let (l, r) = (reduce_terms(lhs, free), reduce_terms(rhs, free));
            if l.ptr_eq(lhs) && r.ptr_eq(rhs) {
                expr.clone()
            } else {
                l + r
            }
        }
        ExprNode::Sub(lhs, rhs) => {
            let (l, r) = (reduce_terms(lhs, free), reduce_terms(rhs, free));
            if l.ptr_eq(lhs) && r.ptr_eq(rhs) {
                expr.clone()
            } else {
                l - r
            }
        }
        _ => wrap_term(expr, free),
    }
}

fn wrap_term(term: &IndexExpr, free: &[IndexVar]) -> IndexExpr {
    let bound = bound_reduction_vars(term);
    let mut result = term.clone();
    for var in term.index_vars() {
        if !free.contains(&var) && !bound.contains(&var) {
            result = IndexExpr::reduction(BinaryOp::Add, var, result);
        }
    }
    result
}

fn bound_reduction_vars(expr: &IndexExpr) -> Vec<IndexVar> {
    struct Bound(Vec<IndexVar>);
    impl ExprVisitor for Bound {
        fn visit_reduction(&mut self, reduction: &Reduction) {
            self.0.push(reduction.var.clone());
            reduction.body.accept(self);
        }
    }
    let mut bound = Bound(Vec::new());
    expr.accept(&mut bound);
    bound.0
}
