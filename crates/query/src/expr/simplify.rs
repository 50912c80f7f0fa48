//! The simplifier pass.
//!
//! Folds literal-only subtrees by evaluating them against an empty item,
//! rewrites `NOT NOT x` to `x`, flattens nested AND/OR into their n-ary
//! forms, and absorbs boolean literals in logical operators. The pass is
//! idempotent: simplifying an already-simplified tree is a no-op.

use crate::error::Result;
use crate::expr::eval::{EvalContext, EvalError};
use crate::expr::{Expr, Literal, Operator};
use quill_value::Value;

/// Simplify an expression in place.
pub fn simplify(expr: &mut Expr) -> Result<()> {
    expr.transform(&mut |node| {
        rewrite(node);
        fold(node)
    })
}

/// Structural rewrites that do not require evaluation. Children are already
/// simplified when this runs (transform is depth-first).
fn rewrite(node: &mut Expr) {
    match node {
        Expr::Operator(Operator::Not(inner)) => {
            match inner.as_mut() {
                // NOT NOT x => x
                Expr::Operator(Operator::Not(x)) => {
                    let x = std::mem::replace(x.as_mut(), Expr::Literal(Literal::Null));
                    *node = x;
                }
                // NOT true => false, NOT false => true
                Expr::Literal(Literal::Bool(b)) => {
                    *node = Expr::Literal(Literal::Bool(!*b));
                }
                _ => {}
            }
        }
        Expr::Operator(Operator::And(terms)) => {
            flatten(terms, |op| match op {
                Operator::And(inner) => Some(inner),
                _ => None,
            });
            // false dominates, true is the identity
            if terms
                .iter()
                .any(|t| matches!(t, Expr::Literal(Literal::Bool(false))))
            {
                *node = Expr::Literal(Literal::Bool(false));
                return;
            }
            terms.retain(|t| !matches!(t, Expr::Literal(Literal::Bool(true))));
            collapse(node, true);
        }
        Expr::Operator(Operator::Or(terms)) => {
            flatten(terms, |op| match op {
                Operator::Or(inner) => Some(inner),
                _ => None,
            });
            if terms
                .iter()
                .any(|t| matches!(t, Expr::Literal(Literal::Bool(true))))
            {
                *node = Expr::Literal(Literal::Bool(true));
                return;
            }
            terms.retain(|t| !matches!(t, Expr::Literal(Literal::Bool(false))));
            collapse(node, false);
        }
        _ => {}
    }
}

fn flatten(terms: &mut Vec<Expr>, extract: impl Fn(&mut Operator) -> Option<&mut Vec<Expr>>) {
    let mut flattened = Vec::with_capacity(terms.len());
    for mut term in terms.drain(..) {
        if let Expr::Operator(op) = &mut term {
            if let Some(inner) = extract(op) {
                flattened.append(inner);
                continue;
            }
        }
        flattened.push(term);
    }
    *terms = flattened;
}

/// After absorption an AND/OR may be empty (identity) or a single term.
fn collapse(node: &mut Expr, identity: bool) {
    let Expr::Operator(Operator::And(terms) | Operator::Or(terms)) = node else {
        return;
    };
    if terms.is_empty() {
        *node = Expr::Literal(Literal::Bool(identity));
    } else if terms.len() == 1 {
        if let Some(single) = terms.pop() {
            *node = single;
        }
    }
}

/// Evaluate constant subtrees down to literals. Folding a constant that
/// evaluates to MISSING produces the MISSING literal; a real evaluation error
/// (e.g. an invalid literal LIKE pattern) surfaces now, before execution.
fn fold(node: &mut Expr) -> Result<()> {
    if matches!(node, Expr::Literal(_)) || !node.is_constant() {
        return Ok(());
    }
    let empty = Value::object();
    match node.evaluate(&EvalContext::value(&empty)) {
        Ok(value) => {
            *node = Literal::from_value(value);
            Ok(())
        }
        Err(EvalError::Undefined(_)) => {
            *node = Expr::Literal(Literal::Missing);
            Ok(())
        }
        Err(EvalError::Fatal(err)) => Err(err),
    }
}
