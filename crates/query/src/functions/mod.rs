//! Scalar function definitions and registry.
//!
//! Functions are registered once into a process-wide registry keyed by their
//! uppercase name. Aggregates are not functions in this sense: the planner
//! rewrites them into group bindings and the group operator runs their
//! accumulators, so only their names and arities are known here.

mod conditional;
mod numeric;
mod strings;

use crate::error::{Error, Result};
use quill_value::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Metadata about a function's signature.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    /// Function name (uppercase).
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>,
}

/// Trait for scalar functions. Arguments arrive already evaluated, with
/// MISSING represented as `Value::Missing`; returning `Value::Missing`
/// propagates MISSING to the caller.
pub trait Function: Send + Sync {
    fn signature(&self) -> &FunctionSignature;

    fn execute(&self, args: &[Value]) -> Result<Value>;
}

/// Registry of all available scalar functions.
pub struct FunctionRegistry {
    functions: HashMap<&'static str, Box<dyn Function>>,
}

impl FunctionRegistry {
    fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };
        strings::register(&mut registry);
        numeric::register(&mut registry);
        conditional::register(&mut registry);
        registry.register(Box::new(MetaFunction));
        registry.register(Box::new(ValueFunction));
        registry
    }

    pub fn register(&mut self, function: Box<dyn Function>) {
        self.functions.insert(function.signature().name, function);
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn Function> {
        self.functions.get(name).map(|f| f.as_ref())
    }
}

static REGISTRY: LazyLock<FunctionRegistry> = LazyLock::new(FunctionRegistry::new);

/// Look up a scalar function by its uppercase name.
pub fn lookup(name: &str) -> Option<&'static dyn Function> {
    REGISTRY.lookup(name)
}

/// The aggregate function names. Their accumulators live in the pipeline's
/// group operator.
pub fn is_aggregate(name: &str) -> bool {
    matches!(name, "COUNT" | "SUM" | "AVG" | "MIN" | "MAX" | "ARRAY_AGG")
}

// META() and VALUE() need the evaluation context (document metadata, the
// item itself), so the evaluator dispatches them before consulting the
// registry; these entries exist to give the validator their signatures.

struct MetaFunction;

impl Function for MetaFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "META",
            min_args: 0,
            max_args: Some(0),
        };
        &SIGNATURE
    }

    fn execute(&self, _args: &[Value]) -> Result<Value> {
        Err(Error::Internal("META() requires evaluation context".into()))
    }
}

struct ValueFunction;

impl Function for ValueFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "VALUE",
            min_args: 0,
            max_args: Some(0),
        };
        &SIGNATURE
    }

    fn execute(&self, _args: &[Value]) -> Result<Value> {
        Err(Error::Internal("VALUE() requires evaluation context".into()))
    }
}
