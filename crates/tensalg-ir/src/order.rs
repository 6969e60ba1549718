//! Global iteration-order derivation.
//!
//! The lowering backend requires every operand's storage ordering to agree
//! with a single global iteration order over the assignment's variables.
//! This module derives that order and, per access, the mode ordering the
//! operand's storage must present. Rewriting mismatching operands is the
//! tensor layer's job.
//!
//! Tie-break: unseen rhs variables are inserted at their position within
//! the access that first mentions them, and earlier-encountered accesses
//! win. The choice is implementation-defined but deterministic.

use crate::assignment::Assignment;
use crate::expr::Access;
use crate::var::IndexVar;
use crate::visit::ExprVisitor;

/// The access's variables permuted into its storage order:
/// `result[level] = vars[mode_ordering[level]]`.
pub fn storage_order_vars(vars: &[IndexVar], mode_ordering: &[usize]) -> Vec<IndexVar> {
    mode_ordering.iter().map(|&mode| vars[mode].clone()).collect()
}

/// Derives the global iteration order of an assignment: the lhs free
/// variables in the lhs tensor's storage order, extended with every rhs
/// variable at its first-encountered within-access position.
pub fn derive_iteration_order(assignment: &Assignment) -> Vec<IndexVar> {
    let lhs = assignment.lhs();
    let seed = storage_order_vars(&lhs.indices, lhs.tensor.format().mode_ordering());

    struct Ordering {
        global: Vec<IndexVar>,
    }
    impl ExprVisitor for Ordering {
        fn visit_access(&mut self, access: &Access) {
            let vars =
                storage_order_vars(&access.indices, access.tensor.format().mode_ordering());
            for (at, var) in vars.into_iter().enumerate() {
                if !self.global.contains(&var) {
                    let at = at.min(self.global.len());
                    self.global.insert(at, var);
                }
            }
        }
    }

    let mut ordering = Ordering { global: seed };
    assignment.rhs().accept(&mut ordering);
    ordering.global
}

/// The mode ordering an operand's storage must present so that walking its
/// levels visits variables in global-order: level `l` of the result names
/// the logical mode whose variable comes `l`-th among the access's
/// variables in `global`.
pub fn required_mode_ordering(global: &[IndexVar], access: &Access) -> Vec<usize> {
    let mut modes: Vec<usize> = (0..access.indices.len()).collect();
    modes.sort_by_key(|&mode| {
        global
            .iter()
            .position(|var| *var == access.indices[mode])
            .unwrap_or(usize::MAX)
    });
    modes
}
