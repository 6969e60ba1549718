//! Visitors and rewriters over expression trees.
//!
//! Two traversal protocols are provided: [`ExprVisitorStrict`] forces an
//! implementation to handle every variant, [`ExprVisitor`] walks children
//! by default so an implementation overrides only what it cares about.
//! [`ExprRewriter`] rebuilds a tree bottom-up and hands back the original
//! node (pointer-equal) wherever nothing underneath changed.

use std::collections::HashSet;

use tensalg_core::ComponentVal;

use crate::expr::{Access, ExprNode, IndexExpr, Reduction};
use crate::var::TensorVar;

/// A visitor that must handle every expression variant.
pub trait ExprVisitorStrict {
    fn visit_access(&mut self, access: &Access);
    fn visit_literal(&mut self, value: &ComponentVal);
    fn visit_neg(&mut self, arg: &IndexExpr);
    fn visit_sqrt(&mut self, arg: &IndexExpr);
    fn visit_add(&mut self, lhs: &IndexExpr, rhs: &IndexExpr);
    fn visit_sub(&mut self, lhs: &IndexExpr, rhs: &IndexExpr);
    fn visit_mul(&mut self, lhs: &IndexExpr, rhs: &IndexExpr);
    fn visit_div(&mut self, lhs: &IndexExpr, rhs: &IndexExpr);
    fn visit_reduction(&mut self, reduction: &Reduction);
}

/// A visitor whose default methods recurse into children.
pub trait ExprVisitor {
    fn visit_access(&mut self, _access: &Access) {}

    fn visit_literal(&mut self, _value: &ComponentVal) {}

    fn visit_neg(&mut self, arg: &IndexExpr) {
        arg.accept(self);
    }

    fn visit_sqrt(&mut self, arg: &IndexExpr) {
        arg.accept(self);
    }

    fn visit_add(&mut self, lhs: &IndexExpr, rhs: &IndexExpr) {
        lhs.accept(self);
        rhs.accept(self);
    }

    fn visit_sub(&mut self, lhs: &IndexExpr, rhs: &IndexExpr) {
        lhs.accept(self);
        rhs.accept(self);
    }

    fn visit_mul(&mut self, lhs: &IndexExpr, rhs: &IndexExpr) {
        lhs.accept(self);
        rhs.accept(self);
    }

    fn visit_div(&mut self, lhs: &IndexExpr, rhs: &IndexExpr) {
        lhs.accept(self);
        rhs.accept(self);
    }

    fn visit_reduction(&mut self, reduction: &Reduction) {
        reduction.body.accept(self);
    }
}

impl IndexExpr {
    /// Dispatches into a strict visitor.
    pub fn accept_strict<V: ExprVisitorStrict + ?Sized>(&self, visitor: &mut V) {
        match self.node() {
            ExprNode::Access(access) => visitor.visit_access(access),
            ExprNode::Literal(value) => visitor.visit_literal(value),
            ExprNode::Neg(arg) => visitor.visit_neg(arg),
            ExprNode::Sqrt(arg) => visitor.visit_sqrt(arg),
            ExprNode::Add(lhs, rhs) => visitor.visit_add(lhs, rhs),
            ExprNode::Sub(lhs, rhs) => visitor.visit_sub(lhs, rhs),
            ExprNode::Mul(lhs, rhs) => visitor.visit_mul(lhs, rhs),
            ExprNode::Div(lhs, rhs) => visitor.visit_div(lhs, rhs),
            ExprNode::Reduction(reduction) => visitor.visit_reduction(reduction),
        }
    }

    /// Dispatches into a default-walking visitor.
    pub fn accept<V: ExprVisitor + ?Sized>(&self, visitor: &mut V) {
        match self.node() {
            ExprNode::Access(access) => visitor.visit_access(access),
            ExprNode::Literal(value) => visitor.visit_literal(value),
            ExprNode::Neg(arg) => visitor.visit_neg(arg),
            ExprNode::Sqrt(arg) => visitor.visit_sqrt(arg),
            ExprNode::Add(lhs, rhs) => visitor.visit_add(lhs, rhs),
            ExprNode::Sub(lhs, rhs) => visitor.visit_sub(lhs, rhs),
            ExprNode::Mul(lhs, rhs) => visitor.visit_mul(lhs, rhs),
            ExprNode::Div(lhs, rhs) => visitor.visit_div(lhs, rhs),
            ExprNode::Reduction(reduction) => visitor.visit_reduction(reduction),
        }
    }
}

/// A bottom-up rewriter. Only the leaf hooks need overriding; interior
/// nodes are rebuilt when a child changed and returned untouched
/// otherwise.
pub trait ExprRewriter {
    fn rewrite_access(&mut self, expr: &IndexExpr, _access: &Access) -> IndexExpr {
        expr.clone()
    }

    fn rewrite_literal(&mut self, expr: &IndexExpr, _value: &ComponentVal) -> IndexExpr {
        expr.clone()
    }

    fn rewrite(&mut self, expr: &IndexExpr) -> IndexExpr {
        match expr.node() {
            ExprNode::Access(access) => self.rewrite_access(expr, access),
            ExprNode::Literal(value) => self.rewrite_literal(expr, value),
            ExprNode::Neg(arg) => {
                let new = self.rewrite(arg);
                if new.ptr_eq(arg) {
                    expr.clone()
                } else {
                    -new
                }
            }
            ExprNode::Sqrt(arg) => {
                let new = self.rewrite(arg);
                if new.ptr_eq(arg) {
                    expr.clone()
                } else {
                    new.sqrt()
                }
            }
            ExprNode::Add(lhs, rhs) => {
                let (l, r) = (self.rewrite(lhs), self.rewrite(rhs));
                if l.ptr_eq(lhs) && r.ptr_eq(rhs) {
                    expr.clone()
                } else {
                    l + r
                }
            }
            ExprNode::Sub(lhs, rhs) => {
                let (l, r) = (self.rewrite(lhs), self.rewrite(rhs));
                if l.ptr_eq(lhs) && r.ptr_eq(rhs) {
                    expr.clone()
                } else {
                    l - r
                }
            }
            ExprNode::Mul(lhs, rhs) => {
                let (l, r) = (self.rewrite(lhs), self.rewrite(rhs));
                if l.ptr_eq(lhs) && r.ptr_eq(rhs) {
                    expr.clone()
                } else {
                    l * r
                }
            }
            ExprNode::Div(lhs, rhs) => {
                let (l, r) = (self.rewrite(lhs), self.rewrite(rhs));
                if l.ptr_eq(lhs) && r.ptr_eq(rhs) {
                    expr.clone()
                } else {
                    l / r
                }
            }
            ExprNode::Reduction(reduction) => {
                let body = self.rewrite(&reduction.body);
                if body.ptr_eq(&reduction.body) {
                    expr.clone()
                } else {
                    IndexExpr::reduction(reduction.op, reduction.var.clone(), body)
                }
            }
        }
    }
}

/// The tensor operands read by an expression, unique by identity, in
/// visit order. Assignment installation, kernel argument packing and the
/// reference backend all rely on this order agreeing.
pub fn operand_vars(expr: &IndexExpr) -> Vec<TensorVar> {
    struct Operands {
        seen: HashSet<u64>,
        out: Vec<TensorVar>,
    }
    impl ExprVisitor for Operands {
        fn visit_access(&mut self, access: &Access) {
            if self.seen.insert(access.tensor.id()) {
                self.out.push(access.tensor.clone());
            }
        }
    }
    let mut operands = Operands {
        seen: HashSet::new(),
        out: Vec::new(),
    };
    expr.accept(&mut operands);
    operands.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::var::IndexVar;
    use tensalg_core::{Datatype, Format};

    fn access(name: &str, vars: &[&IndexVar]) -> Access {
        let dims = vec![2; vars.len()];
        let tensor = TensorVar::new(name, Datatype::Float64, dims.clone(), Format::csf(dims.len()));
        Access::new(tensor, vars.iter().map(|v| (*v).clone()).collect()).unwrap()
    }

    #[test]
    fn test_visitor_reaches_nested_accesses() {
        let (i, k) = (IndexVar::named("i"), IndexVar::named("k"));
        let expr = -(IndexExpr::from(access("B", &[&i, &k])) * IndexExpr::from(access("c", &[&k])));

        struct Count(usize);
        impl ExprVisitor for Count {
            fn visit_access(&mut self, _access: &Access) {
                self.0 += 1;
            }
        }
        let mut count = Count(0);
        expr.accept(&mut count);
        assert_eq!(count.0, 2);
    }

    #[test]
    fn test_strict_visitor_dispatch() {
        struct Last(String);
        impl ExprVisitorStrict for Last {
            fn visit_access(&mut self, _: &Access) {
                self.0 = "access".into();
            }
            fn visit_literal(&mut self, _: &ComponentVal) {
                self.0 = "literal".into();
            }
            fn visit_neg(&mut self, _: &IndexExpr) {
                self.0 = "neg".into();
            }
            fn visit_sqrt(&mut self, _: &IndexExpr) {
                self.0 = "sqrt".into();
            }
            fn visit_add(&mut self, _: &IndexExpr, _: &IndexExpr) {
                self.0 = "add".into();
            }
            fn visit_sub(&mut self, _: &IndexExpr, _: &IndexExpr) {
                self.0 = "sub".into();
            }
            fn visit_mul(&mut self, _: &IndexExpr, _: &IndexExpr) {
                self.0 = "mul".into();
            }
            fn visit_div(&mut self, _: &IndexExpr, _: &IndexExpr) {
                self.0 = "div".into();
            }
            fn visit_reduction(&mut self, _: &Reduction) {
                self.0 = "reduction".into();
            }
        }
        let mut last = Last(String::new());
        IndexExpr::literal(1.0f64).accept_strict(&mut last);
        assert_eq!(last.0, "literal");
        let i = IndexVar::named("i");
        IndexExpr::from(access("A", &[&i])).accept_strict(&mut last);
        assert_eq!(last.0, "access");
    }

    #[test]
    fn test_rewriter_preserves_identity() {
        let (i, k) = (IndexVar::named("i"), IndexVar::named("k"));
        let expr = IndexExpr::from(access("B", &[&i, &k])) + IndexExpr::from(access("c", &[&k]));

        struct Identity;
        impl ExprRewriter for Identity {}
        let rewritten = Identity.rewrite(&expr);
        assert!(rewritten.ptr_eq(&expr));
    }

    #[test]
    fn test_rewriter_rebuilds_changed_paths() {
        let i = IndexVar::named("i");
        let b = access("B", &[&i]);
        let expr = IndexExpr::from(b) + IndexExpr::literal(1.0f64);

        struct Double;
        impl ExprRewriter for Double {
            fn rewrite_access(&mut self, expr: &IndexExpr, _access: &Access) -> IndexExpr {
                expr.clone() * 2.0
            }
        }
        let rewritten = Double.rewrite(&expr);
        assert!(!rewritten.ptr_eq(&expr));
        assert_eq!(rewritten.to_string(), "((B(i) * 2) + 1)");
    }

    #[test]
    fn test_operand_vars_unique_in_order() {
        let (i, k) = (IndexVar::named("i"), IndexVar::named("k"));
        let b = access("B", &[&i, &k]);
        let c = access("c", &[&k]);
        let expr = (IndexExpr::from(b.clone()) * IndexExpr::from(c.clone()))
            + IndexExpr::from(b.clone());
        let operands = operand_vars(&expr);
        assert_eq!(operands.len(), 2);
        assert_eq!(operands[0], b.tensor);
        assert_eq!(operands[1], c.tensor);
    }
}
