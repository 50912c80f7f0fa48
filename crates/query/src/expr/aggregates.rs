//! Aggregate discovery.
//!
//! Collects the outermost aggregate function calls in an expression: calls
//! nested inside another aggregate belong to that aggregate's argument and
//! are not collected (the validator rejects them anyway).

use crate::expr::{Expr, FunctionCall};
use crate::functions;

/// Find every outermost aggregate call in `expr`, appending clones to `found`
/// unless an equivalent call was already collected.
pub fn find_aggregates(expr: &Expr, found: &mut Vec<FunctionCall>) {
    if let Expr::Function(call) = expr {
        if functions::is_aggregate(&call.name) {
            let already = found
                .iter()
                .any(|seen| Expr::Function(seen.clone()).equivalent_to(expr));
            if !already {
                found.push(call.clone());
            }
            return;
        }
    }
    for child in expr.dependencies() {
        find_aggregates(child, found);
    }
}

/// Whether the expression contains any aggregate call.
pub fn contains_aggregate(expr: &Expr) -> bool {
    let mut found = Vec::new();
    find_aggregates(expr, &mut found);
    !found.is_empty()
}
