//! Conditional functions over MISSING and NULL.

use super::{Function, FunctionRegistry, FunctionSignature};
use crate::error::Result;
use crate::expr::eval::values_match;
use quill_value::Value;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Box::new(IfMissingFunction));
    registry.register(Box::new(IfNullFunction));
    registry.register(Box::new(MissingIfFunction));
    registry.register(Box::new(NullIfFunction));
}

/// IFMISSING(a, b, ...): the first argument that is not MISSING.
struct IfMissingFunction;

impl Function for IfMissingFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "IFMISSING",
            min_args: 2,
            max_args: None,
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        Ok(args
            .iter()
            .find(|a| !a.is_missing())
            .cloned()
            .unwrap_or(Value::Missing))
    }
}

/// IFNULL(a, b, ...): the first argument that is neither NULL nor MISSING.
struct IfNullFunction;

impl Function for IfNullFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "IFNULL",
            min_args: 2,
            max_args: None,
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        Ok(args
            .iter()
            .find(|a| a.is_valued())
            .cloned()
            .unwrap_or(Value::Null))
    }
}

/// MISSINGIF(a, b): MISSING when a equals b, else a.
struct MissingIfFunction;

impl Function for MissingIfFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "MISSINGIF",
            min_args: 2,
            max_args: Some(2),
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        if values_match(&args[0], &args[1]) {
            Ok(Value::Missing)
        } else {
            Ok(args[0].clone())
        }
    }
}

/// NULLIF(a, b): NULL when a equals b, else a.
struct NullIfFunction;

impl Function for NullIfFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "NULLIF",
            min_args: 2,
            max_args: Some(2),
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        if values_match(&args[0], &args[1]) {
            Ok(Value::Null)
        } else {
            Ok(args[0].clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ifmissing_and_ifnull() {
        let f = IfMissingFunction;
        assert_eq!(
            f.execute(&[Value::Missing, Value::Null, Value::Number(1.0)])
                .unwrap(),
            Value::Null
        );
        let f = IfNullFunction;
        assert_eq!(
            f.execute(&[Value::Missing, Value::Null, Value::Number(1.0)])
                .unwrap(),
            Value::Number(1.0)
        );
    }

    #[test]
    fn missingif_and_nullif() {
        let f = MissingIfFunction;
        assert_eq!(
            f.execute(&[Value::Number(1.0), Value::Number(1.0)]).unwrap(),
            Value::Missing
        );
        assert_eq!(
            f.execute(&[Value::Number(1.0), Value::Number(2.0)]).unwrap(),
            Value::Number(1.0)
        );
        let f = NullIfFunction;
        assert_eq!(
            f.execute(&[Value::string("a"), Value::string("a")]).unwrap(),
            Value::Null
        );
    }
}
