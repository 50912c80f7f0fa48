//! The expression tree.
//!
//! Expressions are owned, immutable-in-spirit trees. The rewriting passes
//! (`simplify`, `formal`, the grouping rewrites) work through [`Expr::transform`],
//! which rebuilds depth-first and replaces nodes in place; read-only passes
//! use [`Expr::walk`]. Evaluation lives in [`eval`], the standard passes in
//! their own modules.

pub mod aggregates;
pub mod eval;
pub mod formal;
pub mod group_check;
pub mod simplify;
pub mod validate;

pub use eval::{EvalContext, EvalError, EvalResult};

use quill_value::{number_to_string, Value};
use std::fmt;

/// A scalar literal. Array and object constructors are expression variants,
/// since their elements may be arbitrary expressions.
#[derive(Clone, Debug)]
pub enum Literal {
    Missing,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

/// Literal equality is by value bits, so that expression trees can be
/// compared structurally. NaN equals NaN here; IEEE semantics apply during
/// evaluation, not during tree comparison.
impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Missing, Literal::Missing) => true,
            (Literal::Null, Literal::Null) => true,
            (Literal::Bool(l), Literal::Bool(r)) => l == r,
            (Literal::Number(l), Literal::Number(r)) => l.to_bits() == r.to_bits(),
            (Literal::Str(l), Literal::Str(r)) => l == r,
            _ => false,
        }
    }
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Missing => Value::Missing,
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::Str(s) => Value::Str(s.clone()),
        }
    }

    /// The literal spelling of a value, used by the simplifier when folding.
    /// Array and object values come back as constructor expressions.
    pub fn from_value(value: Value) -> Expr {
        match value {
            Value::Missing => Expr::Literal(Literal::Missing),
            Value::Null => Expr::Literal(Literal::Null),
            Value::Bool(b) => Expr::Literal(Literal::Bool(b)),
            Value::Number(n) => Expr::Literal(Literal::Number(n)),
            Value::Str(s) => Expr::Literal(Literal::Str(s)),
            Value::Array(elements) => {
                Expr::Array(elements.into_iter().map(Literal::from_value).collect())
            }
            Value::Object(fields) => Expr::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Literal::from_value(v)))
                    .collect(),
            ),
        }
    }
}

/// Existence tests: IS [NOT] NULL / MISSING / VALUED.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExistenceTest {
    Null,
    Missing,
    Valued,
}

impl fmt::Display for ExistenceTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExistenceTest::Null => write!(f, "NULL"),
            ExistenceTest::Missing => write!(f, "MISSING"),
            ExistenceTest::Valued => write!(f, "VALUED"),
        }
    }
}

/// A function call, scalar or aggregate. Names are stored uppercase; the
/// registry decides which names are aggregates.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub distinct: bool,
    /// COUNT(*) and friends: no argument, count rows.
    pub star: bool,
}

/// Collection quantifiers over an array-valued expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantifier {
    Any,
    All,
    First,
    Array,
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Any => write!(f, "ANY"),
            Quantifier::All => write!(f, "ALL"),
            Quantifier::First => write!(f, "FIRST"),
            Quantifier::Array => write!(f, "ARRAY"),
        }
    }
}

/// `ANY|ALL|FIRST|ARRAY <output> OVER <over> [WHEN <when>]`. Each element of
/// the OVER array becomes the evaluation item for `output` and `when`.
#[derive(Clone, Debug, PartialEq)]
pub struct Collection {
    pub quantifier: Quantifier,
    pub output: Box<Expr>,
    pub over: Box<Expr>,
    pub when: Option<Box<Expr>>,
}

/// Expression operators.
#[derive(Clone, Debug, PartialEq)]
pub enum Operator {
    /// n-ary conjunction; the simplifier flattens nested ANDs into one node.
    And(Vec<Expr>),
    /// n-ary disjunction.
    Or(Vec<Expr>),
    Not(Box<Expr>),

    Equal(Box<Expr>, Box<Expr>),
    NotEqual(Box<Expr>, Box<Expr>),
    LessThan(Box<Expr>, Box<Expr>),
    LessThanOrEqual(Box<Expr>, Box<Expr>),
    GreaterThan(Box<Expr>, Box<Expr>),
    GreaterThanOrEqual(Box<Expr>, Box<Expr>),
    Like {
        left: Box<Expr>,
        right: Box<Expr>,
        negated: bool,
    },

    Add(Box<Expr>, Box<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    Multiply(Box<Expr>, Box<Expr>),
    Divide(Box<Expr>, Box<Expr>),
    Remainder(Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),

    Is {
        expr: Box<Expr>,
        test: ExistenceTest,
        negated: bool,
    },
}

/// An expression tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// An identifier path such as `b.age`. After formalization the first
    /// segment is always a source alias.
    Property(Vec<String>),
    /// Element access with a computed index: `base[index]`.
    Element {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// Field access on a non-path base: `base.field` where `base` is not a
    /// plain property (those fold into `Property`).
    Field {
        base: Box<Expr>,
        field: String,
    },
    /// Array constructor with embedded expressions.
    Array(Vec<Expr>),
    /// Object constructor with embedded expressions.
    Object(Vec<(String, Expr)>),
    /// A named parameter `$name`, replaced with a literal before planning.
    Parameter(String),
    Operator(Operator),
    Function(FunctionCall),
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },
    Collection(Collection),
}

impl From<Literal> for Expr {
    fn from(literal: Literal) -> Self {
        Expr::Literal(literal)
    }
}

impl From<Operator> for Expr {
    fn from(operator: Operator) -> Self {
        Expr::Operator(operator)
    }
}

impl Expr {
    /// A single-segment property.
    pub fn property<S: Into<String>>(name: S) -> Expr {
        Expr::Property(vec![name.into()])
    }

    /// The direct children of this node.
    pub fn dependencies(&self) -> Vec<&Expr> {
        use Operator::*;
        match self {
            Expr::Literal(_) | Expr::Property(_) | Expr::Parameter(_) => Vec::new(),
            Expr::Element { base, index } => vec![base.as_ref(), index.as_ref()],
            Expr::Field { base, .. } => vec![base.as_ref()],
            Expr::Array(elements) => elements.iter().collect(),
            Expr::Object(fields) => fields.iter().map(|(_, v)| v).collect(),
            Expr::Operator(op) => match op {
                And(terms) | Or(terms) => terms.iter().collect(),
                Not(e) | Negate(e) | Is { expr: e, .. } => vec![e.as_ref()],
                Equal(l, r)
                | NotEqual(l, r)
                | LessThan(l, r)
                | LessThanOrEqual(l, r)
                | GreaterThan(l, r)
                | GreaterThanOrEqual(l, r)
                | Add(l, r)
                | Subtract(l, r)
                | Multiply(l, r)
                | Divide(l, r)
                | Remainder(l, r)
                | Like {
                    left: l, right: r, ..
                } => vec![l.as_ref(), r.as_ref()],
            },
            Expr::Function(call) => call.args.iter().collect(),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                let mut children = Vec::new();
                if let Some(operand) = operand {
                    children.push(operand.as_ref());
                }
                for (when, then) in when_clauses {
                    children.push(when);
                    children.push(then);
                }
                if let Some(else_clause) = else_clause {
                    children.push(else_clause.as_ref());
                }
                children
            }
            Expr::Collection(collection) => {
                let mut children = vec![collection.output.as_ref(), collection.over.as_ref()];
                if let Some(when) = &collection.when {
                    children.push(when.as_ref());
                }
                children
            }
        }
    }

    /// Walks the expression tree depth-first, calling the visitor for every
    /// node. Halts and returns false if the visitor returns false.
    pub fn walk(&self, visitor: &mut impl FnMut(&Expr) -> bool) -> bool {
        if !visitor(self) {
            return false;
        }
        self.dependencies().into_iter().all(|child| child.walk(visitor))
    }

    /// Transforms the tree depth-first, applying the closure to every node
    /// after its children and replacing the node in place.
    pub fn transform<E>(
        &mut self,
        transformer: &mut impl FnMut(&mut Expr) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        use Operator::*;
        match self {
            Expr::Literal(_) | Expr::Property(_) | Expr::Parameter(_) => {}
            Expr::Element { base, index } => {
                base.transform(transformer)?;
                index.transform(transformer)?;
            }
            Expr::Field { base, .. } => base.transform(transformer)?,
            Expr::Array(elements) => {
                for element in elements {
                    element.transform(transformer)?;
                }
            }
            Expr::Object(fields) => {
                for (_, value) in fields {
                    value.transform(transformer)?;
                }
            }
            Expr::Operator(op) => match op {
                And(terms) | Or(terms) => {
                    for term in terms {
                        term.transform(transformer)?;
                    }
                }
                Not(e) | Negate(e) | Is { expr: e, .. } => e.transform(transformer)?,
                Equal(l, r)
                | NotEqual(l, r)
                | LessThan(l, r)
                | LessThanOrEqual(l, r)
                | GreaterThan(l, r)
                | GreaterThanOrEqual(l, r)
                | Add(l, r)
                | Subtract(l, r)
                | Multiply(l, r)
                | Divide(l, r)
                | Remainder(l, r)
                | Like {
                    left: l, right: r, ..
                } => {
                    l.transform(transformer)?;
                    r.transform(transformer)?;
                }
            },
            Expr::Function(call) => {
                for arg in &mut call.args {
                    arg.transform(transformer)?;
                }
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(operand) = operand {
                    operand.transform(transformer)?;
                }
                for (when, then) in when_clauses {
                    when.transform(transformer)?;
                    then.transform(transformer)?;
                }
                if let Some(else_clause) = else_clause {
                    else_clause.transform(transformer)?;
                }
            }
            Expr::Collection(collection) => {
                collection.output.transform(transformer)?;
                collection.over.transform(transformer)?;
                if let Some(when) = &mut collection.when {
                    when.transform(transformer)?;
                }
            }
        }
        transformer(self)
    }

    /// Whether the tree contains no property, parameter, aggregate, or
    /// context-dependent function references, i.e. evaluates the same against
    /// any item.
    pub fn is_constant(&self) -> bool {
        self.walk(&mut |expr| match expr {
            Expr::Property(_) | Expr::Parameter(_) => false,
            Expr::Function(call) => {
                !matches!(call.name.as_str(), "META" | "VALUE")
                    && !crate::functions::is_aggregate(&call.name)
            }
            _ => true,
        })
    }

    /// Structural equivalence modulo operator symmetry: commutative binary
    /// operators compare both operand orders, and AND/OR compare as
    /// multisets.
    pub fn equivalent_to(&self, other: &Expr) -> bool {
        use Operator::*;
        match (self, other) {
            (Expr::Literal(l), Expr::Literal(r)) => l == r,
            (Expr::Property(l), Expr::Property(r)) => l == r,
            (Expr::Parameter(l), Expr::Parameter(r)) => l == r,
            (
                Expr::Element { base: lb, index: li },
                Expr::Element { base: rb, index: ri },
            ) => lb.equivalent_to(rb) && li.equivalent_to(ri),
            (
                Expr::Field { base: lb, field: lf },
                Expr::Field { base: rb, field: rf },
            ) => lf == rf && lb.equivalent_to(rb),
            (Expr::Array(l), Expr::Array(r)) => pairwise(l, r),
            (Expr::Object(l), Expr::Object(r)) => {
                l.len() == r.len()
                    && l.iter()
                        .zip(r.iter())
                        .all(|((lk, lv), (rk, rv))| lk == rk && lv.equivalent_to(rv))
            }
            (Expr::Function(l), Expr::Function(r)) => {
                l.name == r.name
                    && l.distinct == r.distinct
                    && l.star == r.star
                    && pairwise(&l.args, &r.args)
            }
            (
                Expr::Case {
                    operand: lo,
                    when_clauses: lw,
                    else_clause: le,
                },
                Expr::Case {
                    operand: ro,
                    when_clauses: rw,
                    else_clause: re,
                },
            ) => {
                option_equivalent(lo, ro)
                    && lw.len() == rw.len()
                    && lw
                        .iter()
                        .zip(rw.iter())
                        .all(|((lc, lt), (rc, rt))| lc.equivalent_to(rc) && lt.equivalent_to(rt))
                    && option_equivalent(le, re)
            }
            (Expr::Collection(l), Expr::Collection(r)) => {
                l.quantifier == r.quantifier
                    && l.output.equivalent_to(&r.output)
                    && l.over.equivalent_to(&r.over)
                    && option_equivalent(&l.when, &r.when)
            }
            (Expr::Operator(l), Expr::Operator(r)) => match (l, r) {
                // multiset equivalence for the n-ary logicals
                (And(ls), And(rs)) | (Or(ls), Or(rs)) => multiset_equivalent(ls, rs),
                (Not(le), Not(re)) | (Negate(le), Negate(re)) => le.equivalent_to(re),
                (
                    Is {
                        expr: le,
                        test: lt,
                        negated: ln,
                    },
                    Is {
                        expr: re,
                        test: rt,
                        negated: rn,
                    },
                ) => lt == rt && ln == rn && le.equivalent_to(re),
                // commutative: either operand order matches
                (Equal(ll, lr), Equal(rl, rr))
                | (NotEqual(ll, lr), NotEqual(rl, rr))
                | (Add(ll, lr), Add(rl, rr))
                | (Multiply(ll, lr), Multiply(rl, rr)) => {
                    (ll.equivalent_to(rl) && lr.equivalent_to(rr))
                        || (ll.equivalent_to(rr) && lr.equivalent_to(rl))
                }
                // order-sensitive
                (LessThan(ll, lr), LessThan(rl, rr))
                | (LessThanOrEqual(ll, lr), LessThanOrEqual(rl, rr))
                | (GreaterThan(ll, lr), GreaterThan(rl, rr))
                | (GreaterThanOrEqual(ll, lr), GreaterThanOrEqual(rl, rr))
                | (Subtract(ll, lr), Subtract(rl, rr))
                | (Divide(ll, lr), Divide(rl, rr))
                | (Remainder(ll, lr), Remainder(rl, rr)) => {
                    ll.equivalent_to(rl) && lr.equivalent_to(rr)
                }
                (
                    Like {
                        left: ll,
                        right: lr,
                        negated: ln,
                    },
                    Like {
                        left: rl,
                        right: rr,
                        negated: rn,
                    },
                ) => ln == rn && ll.equivalent_to(rl) && lr.equivalent_to(rr),
                _ => false,
            },
            _ => false,
        }
    }
}

fn pairwise(l: &[Expr], r: &[Expr]) -> bool {
    l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| a.equivalent_to(b))
}

fn option_equivalent(l: &Option<Box<Expr>>, r: &Option<Box<Expr>>) -> bool {
    match (l, r) {
        (None, None) => true,
        (Some(a), Some(b)) => a.equivalent_to(b),
        _ => false,
    }
}

fn multiset_equivalent(l: &[Expr], r: &[Expr]) -> bool {
    if l.len() != r.len() {
        return false;
    }
    let mut used = vec![false; r.len()];
    'outer: for a in l {
        for (i, b) in r.iter().enumerate() {
            if !used[i] && a.equivalent_to(b) {
                used[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// Display: the canonical printable form. Operator children that are
// themselves operators are parenthesized so the output re-parses to an
// equivalent tree.
// ---------------------------------------------------------------------------

fn fmt_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if matches!(expr, Expr::Operator(_)) {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

fn fmt_binary(f: &mut fmt::Formatter<'_>, l: &Expr, symbol: &str, r: &Expr) -> fmt::Result {
    fmt_operand(f, l)?;
    write!(f, " {} ", symbol)?;
    fmt_operand(f, r)
}

/// Quote a path segment with backticks when it is not a plain identifier.
fn fmt_segment(f: &mut fmt::Formatter<'_>, segment: &str) -> fmt::Result {
    let plain = !segment.is_empty()
        && segment
            .chars()
            .enumerate()
            .all(|(i, c)| c == '_' || c == '$' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()));
    if plain {
        write!(f, "{}", segment)
    } else {
        write!(f, "`{}`", segment)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operator::*;
        match self {
            Expr::Literal(Literal::Missing) => write!(f, "MISSING"),
            Expr::Literal(Literal::Null) => write!(f, "null"),
            Expr::Literal(Literal::Bool(b)) => write!(f, "{}", b),
            Expr::Literal(Literal::Number(n)) => write!(f, "{}", number_to_string(*n)),
            Expr::Literal(Literal::Str(s)) => write!(f, "{:?}", s),
            Expr::Property(path) => {
                for (i, segment) in path.iter().enumerate() {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    fmt_segment(f, segment)?;
                }
                Ok(())
            }
            Expr::Element { base, index } => {
                fmt_operand(f, base)?;
                write!(f, "[{}]", index)
            }
            Expr::Field { base, field } => {
                fmt_operand(f, base)?;
                write!(f, ".")?;
                fmt_segment(f, field)
            }
            Expr::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Expr::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Expr::Parameter(name) => write!(f, "${}", name),
            Expr::Operator(op) => match op {
                And(terms) | Or(terms) => {
                    let keyword = if matches!(op, And(_)) { "AND" } else { "OR" };
                    for (i, term) in terms.iter().enumerate() {
                        if i > 0 {
                            write!(f, " {} ", keyword)?;
                        }
                        fmt_operand(f, term)?;
                    }
                    Ok(())
                }
                Not(e) => {
                    write!(f, "NOT ")?;
                    fmt_operand(f, e)
                }
                Negate(e) => {
                    write!(f, "-")?;
                    fmt_operand(f, e)
                }
                Equal(l, r) => fmt_binary(f, l, "=", r),
                NotEqual(l, r) => fmt_binary(f, l, "!=", r),
                LessThan(l, r) => fmt_binary(f, l, "<", r),
                LessThanOrEqual(l, r) => fmt_binary(f, l, "<=", r),
                GreaterThan(l, r) => fmt_binary(f, l, ">", r),
                GreaterThanOrEqual(l, r) => fmt_binary(f, l, ">=", r),
                Add(l, r) => fmt_binary(f, l, "+", r),
                Subtract(l, r) => fmt_binary(f, l, "-", r),
                Multiply(l, r) => fmt_binary(f, l, "*", r),
                Divide(l, r) => fmt_binary(f, l, "/", r),
                Remainder(l, r) => fmt_binary(f, l, "%", r),
                Like {
                    left,
                    right,
                    negated,
                } => fmt_binary(f, left, if *negated { "NOT LIKE" } else { "LIKE" }, right),
                Is {
                    expr,
                    test,
                    negated,
                } => {
                    fmt_operand(f, expr)?;
                    write!(f, " IS {}{}", if *negated { "NOT " } else { "" }, test)
                }
            },
            Expr::Function(call) => {
                write!(f, "{}(", call.name)?;
                if call.star {
                    write!(f, "*")?;
                } else {
                    if call.distinct {
                        write!(f, "DISTINCT ")?;
                    }
                    for (i, arg) in call.args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                }
                write!(f, ")")
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                write!(f, "CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {}", operand)?;
                }
                for (when, then) in when_clauses {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(else_clause) = else_clause {
                    write!(f, " ELSE {}", else_clause)?;
                }
                write!(f, " END")
            }
            Expr::Collection(collection) => {
                write!(
                    f,
                    "{} {} OVER {}",
                    collection.quantifier, collection.output, collection.over
                )?;
                if let Some(when) = &collection.when {
                    write!(f, " WHEN {}", when)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Expr {
        Expr::Literal(Literal::Number(n))
    }

    fn add(l: Expr, r: Expr) -> Expr {
        Operator::Add(Box::new(l), Box::new(r)).into()
    }

    #[test]
    fn equivalence_modulo_symmetry() {
        let a = Expr::property("a");
        let b = Expr::property("b");
        assert!(add(a.clone(), b.clone()).equivalent_to(&add(b.clone(), a.clone())));
        let sub = |l: Expr, r: Expr| Expr::from(Operator::Subtract(Box::new(l), Box::new(r)));
        assert!(!sub(a.clone(), b.clone()).equivalent_to(&sub(b.clone(), a.clone())));
        // symmetry holds for nested operands too
        let l = Expr::from(Operator::Multiply(
            Box::new(add(a.clone(), b.clone())),
            Box::new(num(2.0)),
        ));
        let r = Expr::from(Operator::Multiply(
            Box::new(add(b.clone(), a.clone())),
            Box::new(num(2.0)),
        ));
        assert!(l.equivalent_to(&r));
    }

    #[test]
    fn and_is_a_multiset() {
        let terms = |es: Vec<Expr>| Expr::from(Operator::And(es));
        let x = Expr::property("x");
        let y = Expr::property("y");
        let z = Expr::property("z");
        assert!(terms(vec![x.clone(), y.clone(), z.clone()])
            .equivalent_to(&terms(vec![z.clone(), x.clone(), y.clone()])));
        assert!(!terms(vec![x.clone(), y.clone()]).equivalent_to(&terms(vec![x.clone(), x.clone()])));
    }

    #[test]
    fn display_forms() {
        let e = add(num(7.0), num(7.0));
        assert_eq!(e.to_string(), "7 + 7");
        let nested = Expr::from(Operator::Multiply(
            Box::new(add(Expr::property("a"), num(1.0))),
            Box::new(num(2.0)),
        ));
        assert_eq!(nested.to_string(), "(a + 1) * 2");
        let is = Expr::from(Operator::Is {
            expr: Box::new(Expr::Property(vec!["b".into(), "age".into()])),
            test: ExistenceTest::Missing,
            negated: true,
        });
        assert_eq!(is.to_string(), "b.age IS NOT MISSING");
    }

    #[test]
    fn walk_visits_all_dependencies() {
        let e = Expr::from(Operator::And(vec![
            add(Expr::property("a"), num(1.0)),
            Expr::from(Operator::Not(Box::new(Expr::property("b")))),
        ]));
        let mut count = 0;
        e.walk(&mut |_| {
            count += 1;
            true
        });
        assert_eq!(count, 6);
    }
}
