//! String functions.

use super::{Function, FunctionRegistry, FunctionSignature};
use crate::error::Result;
use quill_value::Value;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Box::new(LengthFunction));
    registry.register(Box::new(UpperFunction));
    registry.register(Box::new(LowerFunction));
    registry.register(Box::new(SubstrFunction));
}

struct LengthFunction;

impl Function for LengthFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "LENGTH",
            min_args: 1,
            max_args: Some(1),
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        Ok(match &args[0] {
            Value::Missing => Value::Missing,
            Value::Str(s) => Value::Number(s.chars().count() as f64),
            Value::Array(a) => Value::Number(a.len() as f64),
            Value::Object(o) => Value::Number(o.len() as f64),
            _ => Value::Null,
        })
    }
}

struct UpperFunction;

impl Function for UpperFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "UPPER",
            min_args: 1,
            max_args: Some(1),
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        Ok(match &args[0] {
            Value::Missing => Value::Missing,
            Value::Str(s) => Value::Str(s.to_uppercase()),
            _ => Value::Null,
        })
    }
}

struct LowerFunction;

impl Function for LowerFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "LOWER",
            min_args: 1,
            max_args: Some(1),
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        Ok(match &args[0] {
            Value::Missing => Value::Missing,
            Value::Str(s) => Value::Str(s.to_lowercase()),
            _ => Value::Null,
        })
    }
}

/// SUBSTR(s, start[, length]): zero-based start; a negative start counts
/// back from the end of the string.
struct SubstrFunction;

impl Function for SubstrFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "SUBSTR",
            min_args: 2,
            max_args: Some(3),
        };
        &SIGNATURE
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        if args.iter().any(|a| a.is_missing()) {
            return Ok(Value::Missing);
        }
        let (Value::Str(s), Value::Number(start)) = (&args[0], &args[1]) else {
            return Ok(Value::Null);
        };
        if start.fract() != 0.0 {
            return Ok(Value::Null);
        }
        let chars: Vec<char> = s.chars().collect();
        let start = if *start < 0.0 {
            let back = (-start) as usize;
            if back > chars.len() {
                return Ok(Value::Null);
            }
            chars.len() - back
        } else {
            *start as usize
        };
        if start > chars.len() {
            return Ok(Value::Null);
        }
        let length = match args.get(2) {
            None => chars.len() - start,
            Some(Value::Number(n)) if n.fract() == 0.0 && *n >= 0.0 => *n as usize,
            Some(_) => return Ok(Value::Null),
        };
        let end = (start + length).min(chars.len());
        Ok(Value::Str(chars[start..end].iter().collect()))
    }
}
