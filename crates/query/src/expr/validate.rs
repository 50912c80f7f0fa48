//! The validator pass.
//!
//! Checks what the parser cannot: that functions exist, arities match,
//! DISTINCT only modifies aggregates, and aggregates do not nest.

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::functions;

/// Validate one expression tree. `inside_aggregate` guards against nesting.
pub fn validate(expr: &Expr) -> Result<()> {
    validate_inner(expr, false)
}

fn validate_inner(expr: &Expr, inside_aggregate: bool) -> Result<()> {
    let mut nested = inside_aggregate;
    if let Expr::Function(call) = expr {
        let aggregate = functions::is_aggregate(&call.name);
        if aggregate {
            if inside_aggregate {
                return Err(Error::Semantic(format!(
                    "aggregate {} cannot be nested inside another aggregate",
                    call.name
                )));
            }
            if call.star {
                if call.name != "COUNT" {
                    return Err(Error::Semantic(format!(
                        "{}(*) is not defined, only COUNT(*)",
                        call.name
                    )));
                }
                if !call.args.is_empty() || call.distinct {
                    return Err(Error::Semantic("COUNT(*) takes no argument".into()));
                }
            } else if call.args.len() != 1 {
                return Err(Error::Semantic(format!(
                    "{} takes exactly 1 argument, got {}",
                    call.name,
                    call.args.len()
                )));
            }
            nested = true;
        } else {
            if call.star {
                return Err(Error::Semantic(format!(
                    "{}(*) is not a valid call",
                    call.name
                )));
            }
            if call.distinct {
                return Err(Error::Semantic(format!(
                    "DISTINCT applies to aggregates, not {}",
                    call.name
                )));
            }
            let function = functions::lookup(&call.name)
                .ok_or_else(|| Error::Semantic(format!("unknown function {}", call.name)))?;
            let signature = function.signature();
            if call.args.len() < signature.min_args
                || signature.max_args.is_some_and(|max| call.args.len() > max)
            {
                return Err(Error::Semantic(format!(
                    "{} called with {} arguments",
                    call.name,
                    call.args.len()
                )));
            }
        }
    }
    for child in expr.dependencies() {
        validate_inner(child, nested)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::Parser;

    fn check(text: &str) -> Result<()> {
        validate(&Parser::parse_expression_text(text).unwrap())
    }

    #[test]
    fn known_functions_validate() {
        assert!(check("LENGTH(name)").is_ok());
        assert!(check("UPPER(LOWER(name))").is_ok());
        assert!(check("COUNT(*)").is_ok());
        assert!(check("SUM(DISTINCT price)").is_ok());
        assert!(check("IFNULL(a, b)").is_ok());
    }

    #[test]
    fn unknown_functions_and_bad_arity_fail() {
        assert!(check("NO_SUCH_FN(1)").is_err());
        assert!(check("LENGTH()").is_err());
        assert!(check("LENGTH(a, b)").is_err());
        assert!(check("SUM(a, b)").is_err());
        assert!(check("SUM(*)").is_err());
    }

    #[test]
    fn distinct_only_on_aggregates() {
        assert!(check("UPPER(DISTINCT name)").is_err());
    }

    #[test]
    fn aggregates_do_not_nest() {
        assert!(check("SUM(COUNT(x))").is_err());
        assert!(check("SUM(LENGTH(x))").is_ok());
        assert!(check("SUM(x) + COUNT(y)").is_ok());
    }
}
