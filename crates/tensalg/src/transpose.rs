//! Operand transposition at compile time.
//!
//! The lowering backend requires every operand access to agree with one
//! global iteration order over the assignment's index variables. Before
//! lowering, the assignment's rhs is rewritten: any access whose tensor is
//! stored under a different mode ordering than the global order demands is
//! replaced by an access to a repacked copy of that tensor. The copies are
//! kept alive alongside the other operands until invocation.

use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use tensalg_ir::{
    derive_iteration_order, required_mode_ordering, Access, ExprRewriter, ExprVisitor,
    IndexExpr, IndexVar, TensorVar,
};

use crate::tensor::{resolve_operands, Tensor};

/// Rewrites `tensor`'s assignment so every operand's storage ordering
/// matches the global iteration order, repacking operands where needed.
/// Stores the result as the tensor's lowered assignment.
pub(crate) fn apply_transpose_rewrite(tensor: &Tensor) -> Result<()> {
    let assignment = tensor
        .content
        .borrow()
        .assignment
        .clone()
        .expect("assignment checked before lowering");

    let global = derive_iteration_order(&assignment);

    // accesses whose storage ordering disagrees with the global order
    struct Mismatches<'a> {
        global: &'a [IndexVar],
        found: Vec<(TensorVar, Vec<usize>)>,
    }
    impl ExprVisitor for Mismatches<'_> {
        fn visit_access(&mut self, access: &Access) {
            let required = required_mode_ordering(self.global, access);
            if required != access.tensor.format().mode_ordering()
                && !self
                    .found
                    .iter()
                    .any(|(var, ordering)| *var == access.tensor && *ordering == required)
            {
                self.found.push((access.tensor.clone(), required));
            }
        }
    }
    let mut mismatches = Mismatches {
        global: &global,
        found: Vec::new(),
    };
    assignment.rhs().accept(&mut mismatches);

    if mismatches.found.is_empty() {
        tensor.content.borrow_mut().lowered = Some(assignment);
        return Ok(());
    }

    // repack each mismatching operand under its required ordering
    let mut operands = resolve_operands(assignment.rhs())?;
    let mut replacements: HashMap<(u64, Vec<usize>), Tensor> = HashMap::new();
    for (var, required) in mismatches.found {
        let operand = operands
            .iter()
            .find(|operand| operand.tensor_var() == var)
            .expect("mismatching access resolves to an operand");
        debug!(
            operand = var.name(),
            ordering = ?required,
            "repacking operand to match the iteration order"
        );
        let repacked = operand.change_mode_ordering(&required)?;
        replacements.insert((var.id(), required), repacked);
    }

    struct Transposer<'a> {
        global: &'a [IndexVar],
        replacements: &'a HashMap<(u64, Vec<usize>), Tensor>,
    }
    impl ExprRewriter for Transposer<'_> {
        fn rewrite_access(&mut self, expr: &IndexExpr, access: &Access) -> IndexExpr {
            let required = required_mode_ordering(self.global, access);
            match self.replacements.get(&(access.tensor.id(), required)) {
                Some(replacement) => IndexExpr::from(
                    Access::new(replacement.tensor_var(), access.indices.clone())
                        .expect("replacement keeps the operand order"),
                ),
                None => expr.clone(),
            }
        }
    }
    let mut transposer = Transposer {
        global: &global,
        replacements: &replacements,
    };
    let rewritten = assignment.with_rhs(transposer.rewrite(assignment.rhs()));

    operands.extend(replacements.into_values());
    let mut content = tensor.content.borrow_mut();
    content.operands = operands;
    content.lowered = Some(rewritten);
    Ok(())
}
