//! Functional-dependency checking against a GROUP BY clause.
//!
//! When grouping, every expression in SELECT, HAVING, and ORDER BY must be
//! determined by the group: equivalent to a grouping expression, contained
//! inside an aggregate, or constant. The check walks top-down and stops
//! descending at satisfied subtrees; a property that survives to a leaf is
//! the offending reference.

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::functions;

pub struct GroupCheck<'a> {
    pub group_by: &'a [Expr],
}

impl GroupCheck<'_> {
    pub fn check(&self, expr: &Expr) -> Result<()> {
        if self
            .group_by
            .iter()
            .any(|group| group.equivalent_to(expr))
        {
            return Ok(());
        }
        match expr {
            Expr::Function(call) if functions::is_aggregate(&call.name) => Ok(()),
            Expr::Property(_) => Err(Error::NotInGroupBy(expr.to_string())),
            _ => {
                for child in expr.dependencies() {
                    self.check(child)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::Parser;

    fn check(group_by: &[&str], text: &str) -> Result<()> {
        let groups: Vec<Expr> = group_by
            .iter()
            .map(|g| Parser::parse_expression_text(g).unwrap())
            .collect();
        let expr = Parser::parse_expression_text(text).unwrap();
        GroupCheck { group_by: &groups }.check(&expr)
    }

    #[test]
    fn grouped_and_aggregated_expressions_pass() {
        assert!(check(&["dept"], "dept").is_ok());
        assert!(check(&["dept"], "COUNT(*)").is_ok());
        assert!(check(&["dept"], "SUM(age) + 1").is_ok());
        // expressions over grouped expressions are determined by the group
        assert!(check(&["dept"], r#"dept + "x""#).is_ok());
        assert!(check(&["a.b + 1"], "a.b + 1").is_ok());
        // literals are always fine
        assert!(check(&["dept"], "42").is_ok());
    }

    #[test]
    fn ungrouped_properties_fail() {
        assert_eq!(
            check(&["dept"], "age"),
            Err(Error::NotInGroupBy("age".into()))
        );
        assert_eq!(
            check(&["dept"], "SUM(age) + age"),
            Err(Error::NotInGroupBy("age".into()))
        );
        // aggregates shelter their arguments, but only their arguments
        assert!(check(&["dept"], "SUM(age)").is_ok());
        assert_eq!(check(&[], "age"), Err(Error::NotInGroupBy("age".into())));
    }
}
