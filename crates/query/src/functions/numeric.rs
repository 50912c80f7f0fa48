//! Numeric functions.

use super::{Function, FunctionRegistry, FunctionSignature};
use crate::error::Result;
use quill_value::Value;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Box::new(RoundFunction));
    registry.register(Box::new(TruncFunction));
    registry.register(Box::new(CeilFunction));
    registry.register(Box::new(FloorFunction));
    registry.register(Box::new(AbsFunction));
}

/// Shared shape of the single-argument numeric functions: MISSING
/// propagates, a non-number yields NULL.
fn unary_numeric(args: &[Value], op: impl Fn(f64) -> f64) -> Value {
    match &args[0] {
        Value::Missing => Value::Missing,
        Value::Number(n) => Value::Number(op(*n)),
        _ => Value::Null,
    }
}

struct RoundFunction;

impl Function for RoundFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "ROUND",
            min_args: 1,
            max_args: Some(2),
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        let digits = match args.get(1) {
            None => 0.0,
            Some(Value::Number(d)) if d.fract() == 0.0 => *d,
            Some(Value::Missing) => return Ok(Value::Missing),
            Some(_) => return Ok(Value::Null),
        };
        let scale = 10f64.powf(digits);
        Ok(unary_numeric(args, |n| (n * scale).round() / scale))
    }
}

struct TruncFunction;

impl Function for TruncFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "TRUNC",
            min_args: 1,
            max_args: Some(2),
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        let digits = match args.get(1) {
            None => 0.0,
            Some(Value::Number(d)) if d.fract() == 0.0 => *d,
            Some(Value::Missing) => return Ok(Value::Missing),
            Some(_) => return Ok(Value::Null),
        };
        let scale = 10f64.powf(digits);
        Ok(unary_numeric(args, |n| (n * scale).trunc() / scale))
    }
}

struct CeilFunction;

impl Function for CeilFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "CEIL",
            min_args: 1,
            max_args: Some(1),
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        Ok(unary_numeric(args, f64::ceil))
    }
}

struct FloorFunction;

impl Function for FloorFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "FLOOR",
            min_args: 1,
            max_args: Some(1),
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        Ok(unary_numeric(args, f64::floor))
    }
}

struct AbsFunction;

impl Function for AbsFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "ABS",
            min_args: 1,
            max_args: Some(1),
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        Ok(unary_numeric(args, f64::abs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_and_trunc_take_digits() {
        let round = RoundFunction;
        assert_eq!(
            round.execute(&[Value::Number(2.567)]).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(
            round
                .execute(&[Value::Number(2.567), Value::Number(2.0)])
                .unwrap(),
            Value::Number(2.57)
        );
        let trunc = TruncFunction;
        assert_eq!(
            trunc
                .execute(&[Value::Number(2.567), Value::Number(2.0)])
                .unwrap(),
            Value::Number(2.56)
        );
    }

    #[test]
    fn non_numbers_yield_null_and_missing_propagates() {
        let abs = AbsFunction;
        assert_eq!(abs.execute(&[Value::string("x")]).unwrap(), Value::Null);
        assert_eq!(abs.execute(&[Value::Missing]).unwrap(), Value::Missing);
        assert_eq!(abs.execute(&[Value::Number(-3.0)]).unwrap(), Value::Number(3.0));
    }
}
