//! The planner.
//!
//! Lowers a parsed SELECT into the linear operator chain: Scan → KeyJoin* →
//! Filter(WHERE) → Group → Filter(HAVING) → Order → Offset → Limit → Project
//! → Distinct, omitting absent stages. Before lowering, the statement is
//! preprocessed in a fixed order: parameters bound, expressions validated and
//! simplified, result names resolved, identifiers formalized, aggregates
//! discovered, and — when grouping — group references rewritten to synthetic
//! bindings and functional dependencies checked.

use crate::error::{Error, Result};
use crate::expr::{aggregates, formal::FormalNotation, group_check::GroupCheck, simplify, validate};
use crate::expr::{Expr, FunctionCall, Literal};
use crate::plan::{AggregateCall, AggregateFunc, GroupKey, Plan, Projection, Stage};
use crate::stmt::{SelectStatement, Statement};
use quill_catalog::ScanShape;
use quill_value::Value;
use std::collections::HashMap;

/// What the requester is allowed to use. Passed through the planner instead
/// of living in a process-wide flag.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub aggregates: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities { aggregates: true }
    }
}

pub struct Planner {
    capabilities: Capabilities,
}

impl Planner {
    pub fn new(capabilities: Capabilities) -> Self {
        Planner { capabilities }
    }

    pub fn plan(
        &self,
        statement: Statement,
        params: &HashMap<String, Value>,
    ) -> Result<Plan> {
        match statement {
            Statement::Select(select) => self.plan_select(select, params),
            Statement::CreateIndex(_) => Err(Error::Internal(
                "CREATE INDEX is executed directly, not planned".into(),
            )),
        }
    }

    pub fn plan_select(
        &self,
        mut stmt: SelectStatement,
        params: &HashMap<String, Value>,
    ) -> Result<Plan> {
        let explain = stmt.explain;
        let pool = stmt.from.as_ref().and_then(|from| from.pool.clone());

        self.preprocess(&mut stmt, params)?;

        let grouping = self.discover_grouping(&stmt)?;
        if let Some(grouping) = &grouping {
            self.check_dependencies(&stmt, grouping)?;
            rewrite_statement(&mut stmt, grouping);
        }

        let mut stages = self.build_chain(&stmt, grouping)?;
        collapse_bare_count(&mut stages);

        if explain {
            let description = Plan {
                pool: pool.clone(),
                stages,
            }
            .describe();
            stages = vec![Stage::Dummy, Stage::Explain { description }];
        }

        Ok(Plan { pool, stages })
    }

    /// Parameter binding, validation, simplification, name resolution, and
    /// formal-notation conversion, in that order.
    fn preprocess(
        &self,
        stmt: &mut SelectStatement,
        params: &HashMap<String, Value>,
    ) -> Result<()> {
        each_expression(stmt, &mut |expr| bind_parameters(expr, params))?;
        each_expression(stmt, &mut |expr| validate::validate(expr))?;

        // aggregates may only appear in SELECT, HAVING, and ORDER BY
        if let Some(condition) = &stmt.r#where {
            if aggregates::contains_aggregate(condition) {
                return Err(Error::Semantic(
                    "aggregate functions are not allowed in WHERE".into(),
                ));
            }
        }
        for group in &stmt.group_by {
            if aggregates::contains_aggregate(group) {
                return Err(Error::Semantic(
                    "aggregate functions are not allowed in GROUP BY".into(),
                ));
            }
        }
        if let Some(from) = &stmt.from {
            for join in &from.joins {
                if aggregates::contains_aggregate(&join.keys.expr) {
                    return Err(Error::Semantic(
                        "aggregate functions are not allowed in join keys".into(),
                    ));
                }
            }
        }

        each_expression(stmt, &mut |expr| simplify::simplify(expr))?;
        stmt.resolve_result_names()?;

        // formalize identifiers against the FROM aliases
        let mut aliases: Vec<String> = Vec::new();
        let mut forbidden: Vec<String> = Vec::new();
        let mut default_alias = String::new();
        if let Some(from) = &stmt.from {
            default_alias = from.alias().to_string();
            aliases.push(from.alias().to_string());
            if from.alias.is_some() {
                forbidden.push(from.bucket.clone());
            }
            for join in &from.joins {
                aliases.push(join.alias().to_string());
                if join.alias.is_some() {
                    forbidden.push(join.bucket.clone());
                }
            }
        }
        for alias in &aliases {
            if aliases.iter().filter(|a| *a == alias).count() > 1 {
                return Err(Error::DuplicateAlias(alias.clone()));
            }
        }
        forbidden.retain(|name| !aliases.contains(name));
        let converter = FormalNotation {
            forbidden: &forbidden,
            aliases: &aliases,
            default_alias: &default_alias,
        };
        each_expression(stmt, &mut |expr| converter.convert(expr))?;

        // a bare * stands for the whole default source document
        if !default_alias.is_empty() {
            for result in &mut stmt.select {
                if result.star && result.expr.is_none() {
                    result.expr = Some(Expr::property(default_alias.clone()));
                }
            }
        }
        Ok(())
    }

    /// Whether this statement groups, and if so the group keys and the
    /// deduplicated aggregate calls with their synthetic bindings.
    fn discover_grouping(&self, stmt: &SelectStatement) -> Result<Option<Grouping>> {
        let mut calls: Vec<FunctionCall> = Vec::new();
        for result in &stmt.select {
            if let Some(expr) = &result.expr {
                aggregates::find_aggregates(expr, &mut calls);
            }
        }
        if let Some(having) = &stmt.having {
            aggregates::find_aggregates(having, &mut calls);
        }
        for (expr, _) in &stmt.order_by {
            aggregates::find_aggregates(expr, &mut calls);
        }

        if calls.is_empty() && stmt.group_by.is_empty() && stmt.having.is_none() {
            return Ok(None);
        }
        if !calls.is_empty() && !self.capabilities.aggregates {
            return Err(Error::Semantic(
                "aggregate functions are not enabled for this request".into(),
            ));
        }

        let keys: Vec<GroupKey> = stmt
            .group_by
            .iter()
            .enumerate()
            .map(|(i, expr)| GroupKey {
                binding: format!("$group_{}", i),
                expr: expr.clone(),
            })
            .collect();

        let mut aggregate_calls = Vec::new();
        for (i, call) in calls.into_iter().enumerate() {
            let planned = AggregateCall {
                binding: format!("$agg_{}", i),
                func: AggregateFunc::from_name(&call.name)?,
                distinct: call.distinct,
                arg: if call.star {
                    None
                } else {
                    Some(call.args[0].clone())
                },
            };
            aggregate_calls.push((call, planned));
        }

        Ok(Some(Grouping {
            keys,
            aggregates: aggregate_calls,
        }))
    }

    /// Functional dependencies: with grouping, every SELECT, HAVING, and
    /// ORDER BY expression must be determined by the group.
    fn check_dependencies(&self, stmt: &SelectStatement, grouping: &Grouping) -> Result<()> {
        let group_exprs: Vec<Expr> = grouping.keys.iter().map(|k| k.expr.clone()).collect();
        let checker = GroupCheck {
            group_by: &group_exprs,
        };
        for result in &stmt.select {
            if result.star {
                return Err(Error::NotInGroupBy("*".into()));
            }
            if let Some(expr) = &result.expr {
                checker.check(expr)?;
            }
        }
        if let Some(having) = &stmt.having {
            checker.check(having)?;
        }
        for (expr, _) in &stmt.order_by {
            checker.check(expr)?;
        }
        Ok(())
    }

    fn build_chain(
        &self,
        stmt: &SelectStatement,
        grouping: Option<Grouping>,
    ) -> Result<Vec<Stage>> {
        let mut stages = Vec::new();

        match &stmt.from {
            None => stages.push(Stage::Dummy),
            Some(from) => {
                let shape = if statement_needs_payloads(stmt) {
                    ScanShape::Full
                } else {
                    ScanShape::KeysOnly
                };
                stages.push(Stage::Scan {
                    bucket: from.bucket.clone(),
                    alias: from.alias().to_string(),
                    shape,
                });
                for join in &from.joins {
                    stages.push(Stage::KeyJoin {
                        bucket: join.bucket.clone(),
                        alias: join.alias().to_string(),
                        join_type: join.join_type,
                        many: join.keys.many,
                        keys: join.keys.expr.clone(),
                    });
                }
            }
        }

        if let Some(condition) = &stmt.r#where {
            stages.push(Stage::Filter {
                condition: condition.clone(),
            });
        }

        if let Some(grouping) = grouping {
            stages.push(Stage::Group {
                keys: grouping.keys,
                aggregates: grouping.aggregates.into_iter().map(|(_, call)| call).collect(),
            });
        }

        if let Some(having) = &stmt.having {
            stages.push(Stage::Filter {
                condition: having.clone(),
            });
        }

        if !stmt.order_by.is_empty() {
            stages.push(Stage::Order {
                by: stmt.order_by.clone(),
            });
        }
        if let Some(offset) = stmt.offset {
            stages.push(Stage::Offset(offset));
        }
        if let Some(limit) = stmt.limit {
            stages.push(Stage::Limit(limit));
        }

        stages.push(Stage::Project {
            result: stmt
                .select
                .iter()
                .map(|r| Projection {
                    star: r.star,
                    expr: r.expr.clone(),
                    alias: r.alias.clone(),
                })
                .collect(),
        });

        if stmt.distinct {
            stages.push(Stage::Distinct);
        }
        Ok(stages)
    }
}

/// The discovered grouping: keys plus (original call, planned accumulator)
/// pairs. The original calls are needed to rewrite references downstream.
struct Grouping {
    keys: Vec<GroupKey>,
    aggregates: Vec<(FunctionCall, AggregateCall)>,
}

fn bind_parameters(expr: &mut Expr, params: &HashMap<String, Value>) -> Result<()> {
    expr.transform(&mut |node| {
        if let Expr::Parameter(name) = node {
            let value = params
                .get(name)
                .ok_or_else(|| Error::Semantic(format!("missing parameter ${}", name)))?;
            *node = Literal::from_value(value.clone());
        }
        Ok(())
    })
}

/// Apply a closure to every expression in the statement.
fn each_expression(
    stmt: &mut SelectStatement,
    apply: &mut impl FnMut(&mut Expr) -> Result<()>,
) -> Result<()> {
    for result in &mut stmt.select {
        if let Some(expr) = &mut result.expr {
            apply(expr)?;
        }
    }
    if let Some(from) = &mut stmt.from {
        for join in &mut from.joins {
            apply(&mut join.keys.expr)?;
        }
    }
    if let Some(condition) = &mut stmt.r#where {
        apply(condition)?;
    }
    for group in &mut stmt.group_by {
        apply(group)?;
    }
    if let Some(having) = &mut stmt.having {
        apply(having)?;
    }
    for (expr, _) in &mut stmt.order_by {
        apply(expr)?;
    }
    Ok(())
}

/// Rewrite SELECT, HAVING, and ORDER BY to reference the group bindings:
/// subtrees equivalent to a grouping expression become `$group_N` and
/// aggregate calls become `$agg_N`. Aggregate arguments are matched in their
/// group-rewritten form since the depth-first rewrite reaches them first.
fn rewrite_statement(stmt: &mut SelectStatement, grouping: &Grouping) {
    let matchers: Vec<(Expr, String)> = grouping
        .aggregates
        .iter()
        .map(|(call, planned)| {
            let mut form = Expr::Function(call.clone());
            rewrite_expr(&mut form, &grouping.keys, &[]);
            (form, planned.binding.clone())
        })
        .collect();

    for result in &mut stmt.select {
        if let Some(expr) = &mut result.expr {
            rewrite_expr(expr, &grouping.keys, &matchers);
        }
    }
    if let Some(having) = &mut stmt.having {
        rewrite_expr(having, &grouping.keys, &matchers);
    }
    for (expr, _) in &mut stmt.order_by {
        rewrite_expr(expr, &grouping.keys, &matchers);
    }
}

fn rewrite_expr(expr: &mut Expr, keys: &[GroupKey], aggregates: &[(Expr, String)]) {
    let _ = expr.transform::<std::convert::Infallible>(&mut |node| {
        if let Some((_, binding)) = aggregates.iter().find(|(form, _)| form.equivalent_to(node)) {
            *node = Expr::property(binding.clone());
            return Ok(());
        }
        if let Some(key) = keys.iter().find(|key| key.expr.equivalent_to(node)) {
            *node = Expr::property(key.binding.clone());
        }
        Ok(())
    });
}

/// Whether any expression in the statement needs document payloads; when
/// nothing does (COUNT(*), META()-only projections) the scan is downgraded
/// to keys-only.
fn statement_needs_payloads(stmt: &SelectStatement) -> bool {
    let mut needs = false;
    let mut check = |expr: &Expr| {
        needs |= !expr.walk(&mut |node| {
            !matches!(node, Expr::Property(_))
                && !matches!(node, Expr::Function(call) if call.name == "VALUE")
        });
    };
    for result in &stmt.select {
        if result.star {
            return true;
        }
        if let Some(expr) = &result.expr {
            check(expr);
        }
    }
    if let Some(from) = &stmt.from {
        for join in &from.joins {
            check(&join.keys.expr);
        }
    }
    if let Some(condition) = &stmt.r#where {
        check(condition);
    }
    for group in &stmt.group_by {
        check(group);
    }
    if let Some(having) = &stmt.having {
        check(having);
    }
    for (expr, _) in &stmt.order_by {
        check(expr);
    }
    needs
}

/// Collapse `Scan → Group{COUNT(*) only}` into a count scan that asks the
/// bucket for its cardinality instead of streaming every document.
fn collapse_bare_count(stages: &mut Vec<Stage>) {
    let collapsible = matches!(
        (stages.first(), stages.get(1)),
        (
            Some(Stage::Scan { .. }),
            Some(Stage::Group { keys, aggregates })
        ) if keys.is_empty()
            && aggregates.len() == 1
            && aggregates[0].func == AggregateFunc::Count
            && aggregates[0].arg.is_none()
    );
    if !collapsible {
        return;
    }
    let Stage::Scan { bucket, .. } = &stages[0] else {
        return;
    };
    let Stage::Group { aggregates, .. } = &stages[1] else {
        return;
    };
    let replacement = Stage::CountScan {
        bucket: bucket.clone(),
        binding: aggregates[0].binding.clone(),
    };
    stages.splice(0..2, [replacement]);
}
