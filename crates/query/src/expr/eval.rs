//! Expression evaluation.
//!
//! Evaluation returns `Result<Value, EvalError>` where
//! [`EvalError::Undefined`] is the MISSING sentinel: it rides the error slot
//! purely so that operators can short-circuit, and it is trapped back into a
//! value (or an omission) at the operator boundary. [`EvalError::Fatal`]
//! carries a real error.
//!
//! Every binary operator shares the same preamble: a MISSING operand
//! propagates MISSING, a NULL left operand yields NULL without evaluating the
//! right side. LIKE and the existence tests document their own rules.

use crate::error::Error;
use crate::expr::{Collection, ExistenceTest, Expr, FunctionCall, Literal, Operator, Quantifier};
use crate::functions;
use quill_value::{collate, same_class, Item, Meta, Value};
use std::cmp::Ordering;

/// The MISSING sentinel or a real failure.
#[derive(Debug, Clone)]
pub enum EvalError {
    /// The expression was undefined for this item; the payload names the
    /// unresolvable path for diagnostics.
    Undefined(String),
    Fatal(Error),
}

impl From<Error> for EvalError {
    fn from(err: Error) -> Self {
        EvalError::Fatal(err)
    }
}

pub type EvalResult = std::result::Result<Value, EvalError>;

/// The item an expression is evaluated against. Collection quantifiers
/// rebind the context to each array element, which carries no metadata.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub value: &'a Value,
    pub meta: Option<&'a Meta>,
}

impl<'a> EvalContext<'a> {
    pub fn item(item: &'a Item) -> Self {
        EvalContext {
            value: item.value(),
            meta: Some(item.meta()),
        }
    }

    pub fn value(value: &'a Value) -> Self {
        EvalContext { value, meta: None }
    }
}

impl Expr {
    pub fn evaluate(&self, ctx: &EvalContext) -> EvalResult {
        match self {
            Expr::Literal(Literal::Missing) => Err(EvalError::Undefined("MISSING".into())),
            Expr::Literal(literal) => Ok(literal.to_value()),
            Expr::Property(path) => {
                let mut current = ctx.value;
                for segment in path {
                    current = current.field(segment);
                }
                if current.is_missing() {
                    Err(EvalError::Undefined(path.join(".")))
                } else {
                    Ok(current.clone())
                }
            }
            Expr::Element { base, index } => {
                let base = base.evaluate(ctx)?;
                let index = index.evaluate(ctx)?;
                let resolved = match &index {
                    Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => base.index(*n as usize),
                    Value::Str(key) => base.field(key),
                    _ => &Value::Missing,
                };
                if resolved.is_missing() {
                    Err(EvalError::Undefined(format!("{}", self)))
                } else {
                    Ok(resolved.clone())
                }
            }
            Expr::Field { base, field } => {
                let base = base.evaluate(ctx)?;
                let resolved = base.field(field);
                if resolved.is_missing() {
                    Err(EvalError::Undefined(format!("{}", self)))
                } else {
                    Ok(resolved.clone())
                }
            }
            Expr::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    match element.evaluate(ctx) {
                        Ok(value) => values.push(value),
                        // a missing element keeps its position
                        Err(EvalError::Undefined(_)) => values.push(Value::Missing),
                        Err(fatal) => return Err(fatal),
                    }
                }
                Ok(Value::Array(values))
            }
            Expr::Object(fields) => {
                let mut object = std::collections::BTreeMap::new();
                for (key, value) in fields {
                    match value.evaluate(ctx) {
                        Ok(value) => {
                            object.insert(key.clone(), value);
                        }
                        // objects cannot hold MISSING; the key is omitted
                        Err(EvalError::Undefined(_)) => {}
                        Err(fatal) => return Err(fatal),
                    }
                }
                Ok(Value::Object(object))
            }
            Expr::Parameter(name) => Err(EvalError::Fatal(Error::Internal(format!(
                "unbound parameter ${}",
                name
            )))),
            Expr::Operator(op) => evaluate_operator(op, ctx),
            Expr::Function(call) => evaluate_function(call, ctx),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => evaluate_case(operand, when_clauses, else_clause, ctx),
            Expr::Collection(collection) => evaluate_collection(collection, ctx),
        }
    }
}

fn evaluate_operator(op: &Operator, ctx: &EvalContext) -> EvalResult {
    use Operator::*;
    match op {
        Add(l, r) => arithmetic(l, r, ctx, |x, y| Some(x + y)),
        Subtract(l, r) => arithmetic(l, r, ctx, |x, y| Some(x - y)),
        Multiply(l, r) => arithmetic(l, r, ctx, |x, y| Some(x * y)),
        Divide(l, r) => arithmetic(l, r, ctx, |x, y| if y == 0.0 { None } else { Some(x / y) }),
        Remainder(l, r) => arithmetic(l, r, ctx, |x, y| if y == 0.0 { None } else { Some(x % y) }),
        Negate(e) => match e.evaluate(ctx)? {
            Value::Number(n) => Ok(Value::Number(-n)),
            Value::Null => Ok(Value::Null),
            _ => Ok(Value::Null),
        },

        Equal(l, r) => comparison(l, r, ctx, |ord| ord == Ordering::Equal, false),
        NotEqual(l, r) => comparison(l, r, ctx, |ord| ord != Ordering::Equal, true),
        LessThan(l, r) => comparison(l, r, ctx, |ord| ord == Ordering::Less, false),
        LessThanOrEqual(l, r) => comparison(l, r, ctx, |ord| ord != Ordering::Greater, false),
        GreaterThan(l, r) => comparison(l, r, ctx, |ord| ord == Ordering::Greater, false),
        GreaterThanOrEqual(l, r) => comparison(l, r, ctx, |ord| ord != Ordering::Less, false),

        Like {
            left,
            right,
            negated,
        } => evaluate_like(left, right, *negated, ctx),

        And(terms) => {
            let mut saw_null = false;
            for term in terms {
                match term.evaluate(ctx) {
                    Ok(Value::Bool(false)) => return Ok(Value::Bool(false)),
                    Ok(Value::Bool(true)) => {}
                    // MISSING and non-booleans count as NULL in logic
                    Ok(_) | Err(EvalError::Undefined(_)) => saw_null = true,
                    Err(fatal) => return Err(fatal),
                }
            }
            if saw_null {
                Ok(Value::Null)
            } else {
                Ok(Value::Bool(true))
            }
        }
        Or(terms) => {
            let mut saw_null = false;
            for term in terms {
                match term.evaluate(ctx) {
                    Ok(Value::Bool(true)) => return Ok(Value::Bool(true)),
                    Ok(Value::Bool(false)) => {}
                    Ok(_) | Err(EvalError::Undefined(_)) => saw_null = true,
                    Err(fatal) => return Err(fatal),
                }
            }
            if saw_null {
                Ok(Value::Null)
            } else {
                Ok(Value::Bool(false))
            }
        }
        Not(e) => match e.evaluate(ctx) {
            Ok(Value::Bool(b)) => Ok(Value::Bool(!b)),
            Ok(_) | Err(EvalError::Undefined(_)) => Ok(Value::Null),
            Err(fatal) => Err(fatal),
        },

        Is {
            expr,
            test,
            negated,
        } => {
            // The one place MISSING is trapped instead of propagated: the
            // result is always a definite boolean, NOT forms included.
            let outcome = match expr.evaluate(ctx) {
                Err(EvalError::Undefined(_)) => matches!(test, ExistenceTest::Missing),
                Err(fatal) => return Err(fatal),
                Ok(value) => match test {
                    ExistenceTest::Null => value.is_null(),
                    ExistenceTest::Missing => value.is_missing(),
                    ExistenceTest::Valued => value.is_valued(),
                },
            };
            Ok(Value::Bool(outcome != *negated))
        }
    }
}

/// Arithmetic is defined only for numbers: any valued non-number operand
/// produces NULL, as does division (and remainder) by zero.
fn arithmetic(
    l: &Expr,
    r: &Expr,
    ctx: &EvalContext,
    op: impl Fn(f64, f64) -> Option<f64>,
) -> EvalResult {
    let lv = l.evaluate(ctx)?;
    if lv.is_null() {
        return Ok(Value::Null);
    }
    let rv = r.evaluate(ctx)?;
    if rv.is_null() {
        return Ok(Value::Null);
    }
    match (lv.as_number(), rv.as_number()) {
        (Some(x), Some(y)) => Ok(op(x, y).map(Value::Number).unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

/// Comparison shares the preamble, then compares within the collation class.
/// A class mismatch is an internal type-mismatch signal that every operator
/// maps to `false` (never a user-visible error). Numbers compare by IEEE
/// semantics, so any comparison against NaN is false except `!=`.
fn comparison(
    l: &Expr,
    r: &Expr,
    ctx: &EvalContext,
    test: impl Fn(Ordering) -> bool,
    unordered_result: bool,
) -> EvalResult {
    let lv = l.evaluate(ctx)?;
    if lv.is_null() {
        return Ok(Value::Null);
    }
    let rv = r.evaluate(ctx)?;
    if rv.is_null() {
        return Ok(Value::Null);
    }
    if !same_class(&lv, &rv) {
        return Ok(Value::Bool(false));
    }
    if let (Value::Number(x), Value::Number(y)) = (&lv, &rv) {
        return Ok(Value::Bool(match x.partial_cmp(y) {
            Some(ord) => test(ord),
            None => unordered_result,
        }));
    }
    Ok(Value::Bool(test(collate(&lv, &rv))))
}

/// LIKE evaluates both operands before deciding: a MISSING operand
/// propagates, a non-string operand yields NULL, and only then is the
/// pattern applied.
fn evaluate_like(left: &Expr, right: &Expr, negated: bool, ctx: &EvalContext) -> EvalResult {
    let lv = left.evaluate(ctx)?;
    let rv = right.evaluate(ctx)?;
    let (Some(text), Some(pattern)) = (lv.as_str(), rv.as_str()) else {
        return Ok(Value::Null);
    };
    let matched = like_match(text, pattern).map_err(EvalError::Fatal)?;
    Ok(Value::Bool(matched != negated))
}

/// Match an SQL LIKE pattern: `%` matches any run, `_` one character, `\`
/// escapes the next character. The translated regex is anchored at both ends.
pub fn like_match(text: &str, pattern: &str) -> Result<bool, Error> {
    let regex = regex::Regex::new(&like_pattern_to_regex(pattern))
        .map_err(|e| Error::Semantic(format!("invalid LIKE pattern {:?}: {}", pattern, e)))?;
    Ok(regex.is_match(text))
}

fn like_pattern_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    let mut escaped = false;
    for ch in pattern.chars() {
        if escaped {
            push_literal(&mut regex, ch);
            escaped = false;
            continue;
        }
        match ch {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' => escaped = true,
            _ => push_literal(&mut regex, ch),
        }
    }
    regex.push('$');
    regex
}

fn push_literal(regex: &mut String, ch: char) {
    if matches!(
        ch,
        '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
    ) {
        regex.push('\\');
    }
    regex.push(ch);
}

/// Value equality as CASE matching uses it: same collation class and equal
/// under collation, except numbers which follow IEEE (NaN matches nothing).
pub(crate) fn values_match(a: &Value, b: &Value) -> bool {
    if let (Value::Number(x), Value::Number(y)) = (a, b) {
        return x == y;
    }
    same_class(a, b) && collate(a, b) == Ordering::Equal
}

fn evaluate_case(
    operand: &Option<Box<Expr>>,
    when_clauses: &[(Expr, Expr)],
    else_clause: &Option<Box<Expr>>,
    ctx: &EvalContext,
) -> EvalResult {
    match operand {
        // simple CASE: compare the operand against each WHEN value
        Some(operand) => {
            let target = match operand.evaluate(ctx) {
                Ok(value) => value,
                Err(EvalError::Undefined(_)) => Value::Missing,
                Err(fatal) => return Err(fatal),
            };
            for (when, then) in when_clauses {
                let when = match when.evaluate(ctx) {
                    Ok(value) => value,
                    Err(EvalError::Undefined(_)) => Value::Missing,
                    Err(fatal) => return Err(fatal),
                };
                if values_match(&target, &when) {
                    return then.evaluate(ctx);
                }
            }
            evaluate_else(else_clause, ctx)
        }
        // searched CASE: the first WHEN evaluating to true wins
        None => {
            for (when, then) in when_clauses {
                match when.evaluate(ctx) {
                    Ok(Value::Bool(true)) => return then.evaluate(ctx),
                    Ok(_) | Err(EvalError::Undefined(_)) => {}
                    Err(fatal) => return Err(fatal),
                }
            }
            evaluate_else(else_clause, ctx)
        }
    }
}

fn evaluate_else(else_clause: &Option<Box<Expr>>, ctx: &EvalContext) -> EvalResult {
    match else_clause {
        Some(else_clause) => else_clause.evaluate(ctx),
        None => Ok(Value::Null),
    }
}

fn evaluate_collection(collection: &Collection, ctx: &EvalContext) -> EvalResult {
    let over = collection.over.evaluate(ctx)?;
    let Some(elements) = over.as_array() else {
        return Ok(Value::Null);
    };

    let qualifies = |element: &Value| -> Result<bool, EvalError> {
        match &collection.when {
            None => Ok(true),
            Some(when) => match when.evaluate(&EvalContext::value(element)) {
                Ok(Value::Bool(true)) => Ok(true),
                Ok(_) | Err(EvalError::Undefined(_)) => Ok(false),
                Err(fatal) => Err(fatal),
            },
        }
    };

    match collection.quantifier {
        Quantifier::Any => {
            for element in elements {
                if !qualifies(element)? {
                    continue;
                }
                match collection.output.evaluate(&EvalContext::value(element)) {
                    Ok(Value::Bool(true)) => return Ok(Value::Bool(true)),
                    Ok(_) | Err(EvalError::Undefined(_)) => {}
                    Err(fatal) => return Err(fatal),
                }
            }
            Ok(Value::Bool(false))
        }
        Quantifier::All => {
            for element in elements {
                if !qualifies(element)? {
                    continue;
                }
                match collection.output.evaluate(&EvalContext::value(element)) {
                    Ok(Value::Bool(true)) => {}
                    Ok(_) | Err(EvalError::Undefined(_)) => return Ok(Value::Bool(false)),
                    Err(fatal) => return Err(fatal),
                }
            }
            Ok(Value::Bool(true))
        }
        Quantifier::First => {
            for element in elements {
                if !qualifies(element)? {
                    continue;
                }
                match collection.output.evaluate(&EvalContext::value(element)) {
                    Ok(value) => return Ok(value),
                    Err(EvalError::Undefined(_)) => {}
                    Err(fatal) => return Err(fatal),
                }
            }
            Err(EvalError::Undefined("FIRST matched no element".into()))
        }
        Quantifier::Array => {
            let mut out = Vec::new();
            for element in elements {
                if !qualifies(element)? {
                    continue;
                }
                match collection.output.evaluate(&EvalContext::value(element)) {
                    Ok(value) => out.push(value),
                    Err(EvalError::Undefined(_)) => {}
                    Err(fatal) => return Err(fatal),
                }
            }
            Ok(Value::Array(out))
        }
    }
}

fn evaluate_function(call: &FunctionCall, ctx: &EvalContext) -> EvalResult {
    // context-dependent functions are dispatched here, not via the registry
    match call.name.as_str() {
        "META" => {
            return match ctx.meta {
                Some(meta) => Ok(meta.to_value()),
                None => Err(EvalError::Undefined("META()".into())),
            };
        }
        "VALUE" => return Ok(ctx.value.clone()),
        _ => {}
    }

    if functions::is_aggregate(&call.name) {
        // the planner rewrites aggregates into group bindings before any
        // operator evaluates them
        return Err(EvalError::Fatal(Error::Internal(format!(
            "aggregate {} evaluated outside grouping",
            call.name
        ))));
    }

    let function = functions::lookup(&call.name).ok_or_else(|| {
        EvalError::Fatal(Error::Semantic(format!("unknown function {}", call.name)))
    })?;

    let mut args = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        match arg.evaluate(ctx) {
            Ok(value) => args.push(value),
            Err(EvalError::Undefined(_)) => args.push(Value::Missing),
            Err(fatal) => return Err(fatal),
        }
    }
    match function.execute(&args).map_err(EvalError::Fatal)? {
        Value::Missing => Err(EvalError::Undefined(format!("{}()", call.name))),
        value => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::Parser;
    use quill_value::Item;

    fn item(json: &str) -> Item {
        Item::new(Value::from(
            serde_json::from_str::<serde_json::Value>(json).unwrap(),
        ))
    }

    fn eval(expr: &str, json: &str) -> EvalResult {
        let parsed = Parser::parse_expression_text(expr).unwrap();
        let it = item(json);
        parsed.evaluate(&EvalContext::item(&it))
    }

    fn eval_value(expr: &str, json: &str) -> Value {
        eval(expr, json).unwrap()
    }

    fn is_missing(result: &EvalResult) -> bool {
        matches!(result, Err(EvalError::Undefined(_)))
    }

    #[test]
    fn arithmetic_semantics() {
        assert_eq!(eval_value("7 + 7", "{}"), Value::Number(14.0));
        assert_eq!(eval_value("7 - 7", "{}"), Value::Number(0.0));
        assert_eq!(eval_value("7 * 7", "{}"), Value::Number(49.0));
        assert_eq!(eval_value("7 / 7", "{}"), Value::Number(1.0));
        assert_eq!(eval_value("7 % 6", "{}"), Value::Number(1.0));
        // non-numbers yield NULL
        assert_eq!(eval_value(r#""a" + 1"#, "{}"), Value::Null);
        assert_eq!(eval_value(r#"1 - "a""#, "{}"), Value::Null);
        // MISSING propagates from either side
        assert!(is_missing(&eval("7 + foo", "{}")));
        assert!(is_missing(&eval("foo * 7", "{}")));
        // division and remainder by zero yield NULL
        assert_eq!(eval_value("7 / 0", "{}"), Value::Null);
        assert_eq!(eval_value("7 % 0", "{}"), Value::Null);
        // negation
        assert_eq!(eval_value("-n", r#"{"n": 7}"#), Value::Number(-7.0));
        assert_eq!(eval_value("-s", r#"{"s": "x"}"#), Value::Null);
    }

    #[test]
    fn commutativity_of_plus_and_times() {
        for (l, r) in [("2", "3"), ("0.5", "8"), ("-4", "9")] {
            assert_eq!(
                eval_value(&format!("{} + {}", l, r), "{}"),
                eval_value(&format!("{} + {}", r, l), "{}"),
            );
            assert_eq!(
                eval_value(&format!("{} * {}", l, r), "{}"),
                eval_value(&format!("{} * {}", r, l), "{}"),
            );
        }
        assert_eq!(eval_value("12345.5 * 0", "{}"), Value::Number(0.0));
    }

    #[test]
    fn comparison_semantics() {
        assert_eq!(eval_value("1 < 2", "{}"), Value::Bool(true));
        assert_eq!(eval_value("2 <= 2", "{}"), Value::Bool(true));
        assert_eq!(eval_value(r#""a" < "b""#, "{}"), Value::Bool(true));
        // cross-class comparisons are false, never errors
        assert_eq!(eval_value(r#"1 = "1""#, "{}"), Value::Bool(false));
        assert_eq!(eval_value(r#"1 != "1""#, "{}"), Value::Bool(false));
        assert_eq!(eval_value(r#"1 < "1""#, "{}"), Value::Bool(false));
        // NULL poisons
        assert_eq!(eval_value("null = 1", "{}"), Value::Null);
        // MISSING propagates
        assert!(is_missing(&eval("foo = 1", "{}")));
    }

    #[test]
    fn equality_negation_law() {
        // x = y ⇔ NOT (x != y) for same-class operands without NULL/MISSING
        for (l, r) in [("1", "1"), ("1", "2"), (r#""a""#, r#""a""#), ("[1]", "[1, 2]")] {
            let eq = eval_value(&format!("{} = {}", l, r), "{}");
            let neq = eval_value(&format!("NOT ({} != {})", l, r), "{}");
            assert_eq!(eq, neq, "{} vs {}", l, r);
        }
    }

    #[test]
    fn nan_never_equals_itself() {
        let nan = Expr::from(Operator::Divide(
            Box::new(Expr::Literal(Literal::Number(0.0))),
            Box::new(Expr::Literal(Literal::Number(0.0))),
        ));
        // 0/0 is NULL by the zero-divisor rule, so build NaN directly
        let _ = nan;
        let nan = Expr::Literal(Literal::Number(f64::NAN));
        let eq = Expr::from(Operator::Equal(
            Box::new(nan.clone()),
            Box::new(nan.clone()),
        ));
        let ne = Expr::from(Operator::NotEqual(Box::new(nan.clone()), Box::new(nan)));
        let empty = Value::object();
        let ctx = EvalContext::value(&empty);
        assert_eq!(eq.evaluate(&ctx).unwrap(), Value::Bool(false));
        assert_eq!(ne.evaluate(&ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn like_semantics() {
        assert_eq!(eval_value(r#""marty" LIKE "mar%""#, "{}"), Value::Bool(true));
        assert_eq!(eval_value(r#""marty" LIKE "m_rty""#, "{}"), Value::Bool(true));
        assert_eq!(eval_value(r#""marty" LIKE "arty""#, "{}"), Value::Bool(false));
        assert_eq!(
            eval_value(r#""marty" NOT LIKE "zz%""#, "{}"),
            Value::Bool(true)
        );
        // regex metacharacters in the pattern match literally
        assert_eq!(eval_value(r#""a.b" LIKE "a.b""#, "{}"), Value::Bool(true));
        assert_eq!(eval_value(r#""axb" LIKE "a.b""#, "{}"), Value::Bool(false));
        // non-string operands yield NULL
        assert_eq!(eval_value(r#"1 LIKE "1""#, "{}"), Value::Null);
        assert_eq!(eval_value(r#""a" LIKE 1"#, "{}"), Value::Null);
    }

    #[test]
    fn logic_is_kleene() {
        assert_eq!(eval_value("true AND false", "{}"), Value::Bool(false));
        assert_eq!(eval_value("true AND true", "{}"), Value::Bool(true));
        assert_eq!(eval_value("null AND true", "{}"), Value::Null);
        assert_eq!(eval_value("null AND false", "{}"), Value::Bool(false));
        assert_eq!(eval_value("null AND null", "{}"), Value::Null);
        assert_eq!(eval_value("null OR true", "{}"), Value::Bool(true));
        assert_eq!(eval_value("null OR false", "{}"), Value::Null);
        // MISSING is treated as NULL in logic
        assert_eq!(eval_value("foo AND false", "{}"), Value::Bool(false));
        assert_eq!(eval_value("foo OR true", "{}"), Value::Bool(true));
        assert_eq!(eval_value("foo AND true", "{}"), Value::Null);
        assert_eq!(eval_value("NOT foo", "{}"), Value::Null);
        assert_eq!(eval_value("NOT true", "{}"), Value::Bool(false));
    }

    #[test]
    fn existence_tests_trap_missing() {
        let doc = r#"{"present": 1, "nothing": null}"#;
        assert_eq!(eval_value("present IS NULL", doc), Value::Bool(false));
        assert_eq!(eval_value("nothing IS NULL", doc), Value::Bool(true));
        assert_eq!(eval_value("absent IS NULL", doc), Value::Bool(false));

        assert_eq!(eval_value("present IS MISSING", doc), Value::Bool(false));
        assert_eq!(eval_value("nothing IS MISSING", doc), Value::Bool(false));
        assert_eq!(eval_value("absent IS MISSING", doc), Value::Bool(true));

        assert_eq!(eval_value("present IS VALUED", doc), Value::Bool(true));
        assert_eq!(eval_value("nothing IS VALUED", doc), Value::Bool(false));
        assert_eq!(eval_value("absent IS VALUED", doc), Value::Bool(false));

        // the NOT forms negate, producing definite booleans even for MISSING
        assert_eq!(eval_value("absent IS NOT NULL", doc), Value::Bool(true));
        assert_eq!(eval_value("absent IS NOT MISSING", doc), Value::Bool(false));
        assert_eq!(eval_value("absent IS NOT VALUED", doc), Value::Bool(true));
    }

    #[test]
    fn exactly_one_existence_test_holds() {
        let doc = r#"{"present": 1, "nothing": null}"#;
        for path in ["present", "nothing", "absent"] {
            let hits = ["IS NULL", "IS MISSING", "IS VALUED"]
                .iter()
                .filter(|test| {
                    eval_value(&format!("{} {}", path, test), doc) == Value::Bool(true)
                })
                .count();
            assert_eq!(hits, 1, "{}", path);
        }
    }

    #[test]
    fn case_expressions() {
        let doc = r#"{"n": 2}"#;
        assert_eq!(
            eval_value(r#"CASE WHEN n = 2 THEN "two" ELSE "other" END"#, doc),
            Value::string("two")
        );
        assert_eq!(
            eval_value(r#"CASE WHEN n = 3 THEN "three" END"#, doc),
            Value::Null
        );
        assert_eq!(
            eval_value(r#"CASE n WHEN 1 THEN "one" WHEN 2 THEN "two" END"#, doc),
            Value::string("two")
        );
    }

    #[test]
    fn collection_quantifiers() {
        let doc = r#"{"scores": [1, 5, 9], "empty": []}"#;
        assert_eq!(
            eval_value("ANY VALUE() > 8 OVER scores", doc),
            Value::Bool(true)
        );
        assert_eq!(
            eval_value("ALL VALUE() > 0 OVER scores", doc),
            Value::Bool(true)
        );
        assert_eq!(
            eval_value("ALL VALUE() > 1 OVER scores", doc),
            Value::Bool(false)
        );
        // vacuous quantification
        assert_eq!(eval_value("ANY VALUE() > 0 OVER empty", doc), Value::Bool(false));
        assert_eq!(eval_value("ALL VALUE() > 0 OVER empty", doc), Value::Bool(true));
        // FIRST and ARRAY with WHEN filters
        assert_eq!(
            eval_value("FIRST VALUE() OVER scores WHEN VALUE() > 2", doc),
            Value::Number(5.0)
        );
        assert_eq!(
            eval_value("ARRAY VALUE() * 2 OVER scores WHEN VALUE() > 1", doc),
            Value::Array(vec![Value::Number(10.0), Value::Number(18.0)])
        );
        assert!(is_missing(&eval(
            "FIRST VALUE() OVER scores WHEN VALUE() > 100",
            doc
        )));
        // non-array OVER operand yields NULL; MISSING propagates
        assert_eq!(eval_value("ANY VALUE() OVER 5", r"{}"), Value::Null);
        assert!(is_missing(&eval("ANY VALUE() OVER nope", "{}")));
    }

    #[test]
    fn nested_paths_and_elements() {
        let doc = r#"{"a": {"b": [10, 20]}}"#;
        assert_eq!(eval_value("a.b[1]", doc), Value::Number(20.0));
        assert_eq!(eval_value("a.b[1 - 1]", doc), Value::Number(10.0));
        assert!(is_missing(&eval("a.b[7]", doc)));
        assert!(is_missing(&eval("a.z.q", doc)));
    }
}
