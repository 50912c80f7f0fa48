//! The core value type.
//!
//! A `Value` is a JSON value extended with a MISSING kind. MISSING means the
//! attribute did not exist at all; NULL means it existed with an explicit
//! absent value. The distinction drives most of the query semantics, so it is
//! represented in the data model rather than bolted on at the edges.

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// The six value kinds, in collation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Missing,
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Missing => "missing",
            Kind::Null => "null",
            Kind::Boolean => "boolean",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Object => "object",
        };
        write!(f, "{}", name)
    }
}

/// A JSON value plus MISSING. Objects iterate in key order, which keeps
/// canonical output and collation stable regardless of insertion order.
#[derive(Clone, PartialEq, Default)]
pub enum Value {
    Missing,
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

static MISSING: Value = Value::Missing;

impl Value {
    /// Create a string value.
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::Str(s.into())
    }

    /// Create a number value.
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    /// Create an empty object.
    pub fn object() -> Self {
        Value::Object(BTreeMap::new())
    }

    /// The kind tag of this value.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Missing => Kind::Missing,
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Boolean,
            Value::Number(_) => Kind::Number,
            Value::Str(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A value is "valued" when it is neither MISSING nor NULL.
    pub fn is_valued(&self) -> bool {
        !matches!(self, Value::Missing | Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Look up a field of an object. Anything unresolvable is MISSING: a
    /// non-object receiver, or an object without the key.
    pub fn field(&self, name: &str) -> &Value {
        match self {
            Value::Object(fields) => fields.get(name).unwrap_or(&MISSING),
            _ => &MISSING,
        }
    }

    /// Look up an element of an array; out-of-bounds or a non-array receiver
    /// is MISSING.
    pub fn index(&self, i: usize) -> &Value {
        match self {
            Value::Array(elements) => elements.get(i).unwrap_or(&MISSING),
            _ => &MISSING,
        }
    }

    /// Resolve a dotted/bracketed path string such as `a.b[0].c`. Path access
    /// never mutates and never errors; every dead end is MISSING.
    pub fn navigate(&self, path: &str) -> &Value {
        let mut current = self;
        for segment in path.split('.') {
            let mut rest = segment;
            // a segment may carry bracket suffixes: b[0][1]
            let name_end = rest.find('[').unwrap_or(rest.len());
            let (name, mut brackets) = rest.split_at(name_end);
            if !name.is_empty() {
                current = current.field(name);
            }
            while let Some(close) = brackets.find(']') {
                let idx: usize = match brackets[1..close].parse() {
                    Ok(i) => i,
                    Err(_) => return &MISSING,
                };
                current = current.index(idx);
                brackets = &brackets[close + 1..];
            }
            rest = brackets;
            if !rest.is_empty() {
                return &MISSING;
            }
        }
        current
    }

    /// Convert into a plain JSON value. MISSING has no JSON spelling and
    /// becomes null; callers that must omit it (projection) do so before
    /// converting.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Missing | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) if is_integral(n) => {
                serde_json::Value::Number(serde_json::Number::from(n as i64))
            }
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s),
            Value::Array(a) => {
                serde_json::Value::Array(a.into_iter().map(Value::into_json).collect())
            }
            Value::Object(o) => serde_json::Value::Object(
                o.into_iter().map(|(k, v)| (k, v.into_json())).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(a) => {
                Value::Array(a.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(o) => {
                Value::Object(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<V: Into<Value>> FromIterator<V> for Value {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Value::Array(iter.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> FromIterator<(String, V)> for Value {
    fn from_iter<T: IntoIterator<Item = (String, V)>>(iter: T) -> Self {
        Value::Object(iter.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Whether a double is exactly representable as a JSON integer.
fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15
}

/// Formats a number the way JSON does: integral doubles print without the
/// trailing `.0` so that `7 + 7` displays as `14`.
pub fn number_to_string(n: f64) -> String {
    if is_integral(n) {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => write!(f, "missing"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Object(o) => {
                write!(f, "{{")?;
                for (i, (k, v)) in o.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => write!(f, "Missing"),
            _ => write!(f, "{}", self),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Missing | Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if is_integral(*n) => serializer.serialize_i64(*n as i64),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Array(a) => {
                let mut seq = serializer.serialize_seq(Some(a.len()))?;
                for v in a {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Object(o) => {
                let mut map = serializer.serialize_map(Some(o.len()))?;
                for (k, v) in o {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON value")
            }

            fn visit_bool<E>(self, b: bool) -> Result<Value, E> {
                Ok(Value::Bool(b))
            }

            fn visit_i64<E>(self, n: i64) -> Result<Value, E> {
                Ok(Value::Number(n as f64))
            }

            fn visit_u64<E>(self, n: u64) -> Result<Value, E> {
                Ok(Value::Number(n as f64))
            }

            fn visit_f64<E>(self, n: f64) -> Result<Value, E> {
                Ok(Value::Number(n))
            }

            fn visit_str<E>(self, s: &str) -> Result<Value, E> {
                Ok(Value::Str(s.to_string()))
            }

            fn visit_string<E>(self, s: String) -> Result<Value, E> {
                Ok(Value::Str(s))
            }

            fn visit_none<E>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_unit<E>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
                Deserialize::deserialize(d)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
                let mut elements = Vec::new();
                while let Some(v) = seq.next_element()? {
                    elements.push(v);
                }
                Ok(Value::Array(elements))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
                let mut fields = BTreeMap::new();
                while let Some((k, v)) = map.next_entry::<String, Value>()? {
                    fields.insert(k, v);
                }
                Ok(Value::Object(fields))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> Value {
        Value::from(serde_json::from_str::<serde_json::Value>(json).unwrap())
    }

    #[test]
    fn missing_is_not_null() {
        let v = doc(r#"{"a": null}"#);
        assert!(v.field("a").is_null());
        assert!(v.field("b").is_missing());
        assert!(!v.field("a").is_missing());
        assert!(!v.field("b").is_null());
    }

    #[test]
    fn exactly_one_of_null_missing_valued() {
        for v in [
            Value::Missing,
            Value::Null,
            Value::Bool(false),
            Value::Number(0.0),
            Value::string(""),
            Value::Array(vec![]),
            Value::object(),
        ] {
            let flags = [v.is_null(), v.is_missing(), v.is_valued()];
            assert_eq!(flags.iter().filter(|b| **b).count(), 1, "{:?}", v);
        }
    }

    #[test]
    fn navigate_paths() {
        let v = doc(r#"{"a": {"b": [{"c": 1}, {"c": 2}]}}"#);
        assert_eq!(v.navigate("a.b[1].c"), &Value::Number(2.0));
        assert_eq!(v.navigate("a.b[0].c"), &Value::Number(1.0));
        assert!(v.navigate("a.x.y").is_missing());
        assert!(v.navigate("a.b[9].c").is_missing());
        assert!(v.navigate("a.b[zz]").is_missing());
    }

    #[test]
    fn display_is_json_like() {
        let v = doc(r#"{"n": 14, "f": 1.5, "s": "x"}"#);
        assert_eq!(v.to_string(), r#"{"f": 1.5, "n": 14, "s": "x"}"#);
    }

    #[test]
    fn json_round_trip() {
        let v = doc(r#"{"a": [1, null, "two"], "b": true}"#);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(doc(&json), v);
    }
}
