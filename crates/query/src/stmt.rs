//! Statement structures.
//!
//! The parser builds these; the planner validates, formalizes, and lowers
//! them into an operator chain. Result-name resolution (explicit aliases,
//! trailing-property names, generated `$n` names) lives here because it is a
//! property of the statement, not of the plan.

use crate::error::{Error, Result};
use crate::expr::Expr;
use std::fmt;

#[derive(Debug, Clone)]
pub enum Statement {
    Select(SelectStatement),
    CreateIndex(CreateIndexStatement),
}

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Join types for keyed joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER"),
            JoinType::Left => write!(f, "LEFT"),
        }
    }
}

/// One entry of the select list: `*`, `expr.*`, or `expr [AS alias]`.
#[derive(Debug, Clone)]
pub struct ResultExpr {
    pub star: bool,
    pub expr: Option<Expr>,
    pub alias: Option<String>,
}

impl ResultExpr {
    pub fn star() -> Self {
        ResultExpr {
            star: true,
            expr: None,
            alias: None,
        }
    }

    pub fn dot_star(expr: Expr) -> Self {
        ResultExpr {
            star: true,
            expr: Some(expr),
            alias: None,
        }
    }

    pub fn named(expr: Expr, alias: Option<String>) -> Self {
        ResultExpr {
            star: false,
            expr: Some(expr),
            alias,
        }
    }
}

/// The KEY/KEYS descriptor of a keyed join.
#[derive(Debug, Clone)]
pub struct KeyExpr {
    /// KEYS (an array of keys) vs KEY (a single key).
    pub many: bool,
    pub expr: Expr,
}

/// A chained join term: `[INNER|LEFT] JOIN bucket [AS alias] KEY|KEYS expr`.
#[derive(Debug, Clone)]
pub struct KeyJoinTerm {
    pub join_type: JoinType,
    pub bucket: String,
    pub alias: Option<String>,
    pub keys: KeyExpr,
}

impl KeyJoinTerm {
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.bucket)
    }
}

/// The FROM clause: a bucket term plus chained keyed joins.
#[derive(Debug, Clone)]
pub struct FromClause {
    pub pool: Option<String>,
    pub bucket: String,
    pub alias: Option<String>,
    pub joins: Vec<KeyJoinTerm>,
}

impl FromClause {
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.bucket)
    }
}

#[derive(Debug, Clone)]
pub struct SelectStatement {
    pub distinct: bool,
    pub select: Vec<ResultExpr>,
    pub from: Option<FromClause>,
    pub r#where: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<(Expr, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub explain: bool,
}

#[derive(Debug, Clone)]
pub struct CreateIndexStatement {
    pub name: String,
    pub pool: Option<String>,
    pub bucket: String,
    pub method: Option<String>,
    pub expressions: Vec<Expr>,
}

impl SelectStatement {
    /// Resolve result names: explicit aliases first (duplicates are errors),
    /// then trailing property segments (clashes with a used name are errors),
    /// then generated `$1`, `$2`, ... skipping names already taken. Star
    /// entries keep no alias; they expand at execution time.
    pub fn resolve_result_names(&mut self) -> Result<()> {
        let mut in_use: Vec<String> = Vec::new();
        for result in &self.select {
            if let Some(alias) = &result.alias {
                if in_use.contains(alias) {
                    return Err(Error::DuplicateAlias(alias.clone()));
                }
                in_use.push(alias.clone());
            }
        }

        for result in &mut self.select {
            if result.star || result.alias.is_some() {
                continue;
            }
            if let Some(name) = result.expr.as_ref().and_then(trailing_property) {
                if in_use.contains(&name) {
                    return Err(Error::DuplicateAlias(name));
                }
                in_use.push(name.clone());
                result.alias = Some(name);
            }
        }

        for result in &mut self.select {
            if result.star || result.alias.is_some() {
                continue;
            }
            let mut counter = 1usize;
            let name = loop {
                let candidate = format!("${}", counter);
                if !in_use.contains(&candidate) {
                    break candidate;
                }
                counter += 1;
            };
            in_use.push(name.clone());
            result.alias = Some(name);
        }
        Ok(())
    }
}

/// When an expression ends in a property, its trailing segment proposes the
/// result name: `a` names `a`, `a.b.c` names `c`.
fn trailing_property(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Property(path) => path.last().cloned(),
        Expr::Field { field, .. } => Some(field.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(expr: Expr, alias: Option<&str>) -> ResultExpr {
        ResultExpr::named(expr, alias.map(|s| s.to_string()))
    }

    fn statement(select: Vec<ResultExpr>) -> SelectStatement {
        SelectStatement {
            distinct: false,
            select,
            from: None,
            r#where: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            explain: false,
        }
    }

    fn aliases(stmt: &SelectStatement) -> Vec<Option<&str>> {
        stmt.select.iter().map(|r| r.alias.as_deref()).collect()
    }

    #[test]
    fn trailing_segments_name_properties() {
        let mut stmt = statement(vec![
            named(Expr::property("name"), None),
            named(Expr::Property(vec!["b".into(), "age".into()]), None),
        ]);
        stmt.resolve_result_names().unwrap();
        assert_eq!(aliases(&stmt), vec![Some("name"), Some("age")]);
    }

    #[test]
    fn generated_names_skip_used_ones(){
        let mut stmt = statement(vec![
            named(Expr::Literal(crate::expr::Literal::Number(1.0)), Some("$2")),
            named(Expr::Literal(crate::expr::Literal::Number(2.0)), None),
            named(Expr::Literal(crate::expr::Literal::Number(3.0)), None),
        ]);
        stmt.resolve_result_names().unwrap();
        assert_eq!(aliases(&stmt), vec![Some("$2"), Some("$1"), Some("$3")]);
    }

    #[test]
    fn duplicate_aliases_fail() {
        let mut stmt = statement(vec![
            named(Expr::property("name"), Some("x")),
            named(Expr::property("age"), Some("x")),
        ]);
        assert_eq!(
            stmt.resolve_result_names(),
            Err(Error::DuplicateAlias("x".into()))
        );
        // a proposed property name clashing with an explicit alias fails too
        let mut stmt = statement(vec![
            named(Expr::property("age"), Some("name")),
            named(Expr::property("name"), None),
        ]);
        assert_eq!(
            stmt.resolve_result_names(),
            Err(Error::DuplicateAlias("name".into()))
        );
    }

    #[test]
    fn stars_keep_no_alias() {
        let mut stmt = statement(vec![
            ResultExpr::star(),
            named(Expr::property("a"), None),
        ]);
        stmt.resolve_result_names().unwrap();
        assert_eq!(aliases(&stmt), vec![None, Some("a")]);
    }
}
