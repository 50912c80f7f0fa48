//! Formal notation conversion.
//!
//! After parsing, identifier paths are bare: `age` or `b.age`. Before
//! execution every path must be attributed to a FROM source. The converter is
//! parameterized by the known aliases, the forbidden names (a bucket name
//! shadowed by an AS alias may no longer be referenced), and the default
//! alias bare names attach to. A name that cannot be attributed is an
//! ambiguous reference.

use crate::error::{Error, Result};
use crate::expr::Expr;

pub struct FormalNotation<'a> {
    /// Names that may not appear as a leading path segment.
    pub forbidden: &'a [String],
    /// Known source aliases; a path already starting with one is left alone.
    pub aliases: &'a [String],
    /// The alias bare paths are rewritten under; empty when there is no
    /// unambiguous default (multiple sources, or no FROM at all).
    pub default_alias: &'a str,
}

impl FormalNotation<'_> {
    /// Rewrite an expression to formal notation in place. Idempotent: a
    /// formalized tree's paths all start with known aliases and pass through
    /// untouched.
    pub fn convert(&self, expr: &mut Expr) -> Result<()> {
        expr.transform(&mut |node| {
            let Expr::Property(path) = node else {
                return Ok(());
            };
            let head = path.first().cloned().unwrap_or_default();
            if self.forbidden.iter().any(|name| *name == head) {
                return Err(Error::AmbiguousReference(head));
            }
            if self.aliases.iter().any(|alias| *alias == head) {
                return Ok(());
            }
            if self.default_alias.is_empty() {
                return Err(Error::AmbiguousReference(head));
            }
            path.insert(0, self.default_alias.to_string());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::Parser;

    fn convert(text: &str, forbidden: &[&str], aliases: &[&str], default_alias: &str) -> Result<String> {
        let mut expr = Parser::parse_expression_text(text).unwrap();
        let forbidden: Vec<String> = forbidden.iter().map(|s| s.to_string()).collect();
        let aliases: Vec<String> = aliases.iter().map(|s| s.to_string()).collect();
        FormalNotation {
            forbidden: &forbidden,
            aliases: &aliases,
            default_alias,
        }
        .convert(&mut expr)?;
        Ok(expr.to_string())
    }

    #[test]
    fn bare_names_attach_to_the_default_alias() {
        assert_eq!(convert("age > 30", &[], &["b"], "b").unwrap(), "b.age > 30");
        assert_eq!(
            convert("a.b.c + d", &[], &["a"], "a").unwrap(),
            "a.b.c + a.d"
        );
    }

    #[test]
    fn known_aliases_pass_through() {
        assert_eq!(
            convert("o.total + c.credit", &[], &["o", "c"], "o").unwrap(),
            "o.total + c.credit"
        );
    }

    #[test]
    fn forbidden_and_unattributable_names_are_ambiguous() {
        assert_eq!(
            convert("bucket.x", &["bucket"], &["b"], "b"),
            Err(Error::AmbiguousReference("bucket".into()))
        );
        assert_eq!(
            convert("x + 1", &[], &[], ""),
            Err(Error::AmbiguousReference("x".into()))
        );
    }

    #[test]
    fn idempotent() {
        let aliases: Vec<String> = vec!["b".into()];
        let mut expr = Parser::parse_expression_text("age > 30 AND name = \"x\"").unwrap();
        let pass = FormalNotation {
            forbidden: &[],
            aliases: &aliases,
            default_alias: "b",
        };
        pass.convert(&mut expr).unwrap();
        let once = expr.clone();
        pass.convert(&mut expr).unwrap();
        assert!(once.equivalent_to(&expr));
    }
}
