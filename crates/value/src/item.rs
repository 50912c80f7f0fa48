//! The pipeline item: a value plus its document metadata.
//!
//! Operators pass `Item`s through their channels. The value is normally an
//! object whose top-level keys are source aliases (bound by scan and
//! key-join) or planner-assigned bindings (bound by group). Metadata travels
//! by shared reference so duplicating an item for a join fan-out stays cheap.

use crate::types::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Document metadata carried alongside a value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Meta {
    pub id: Option<String>,
    pub cas: Option<u64>,
    pub expiry: Option<u64>,
}

impl Meta {
    pub fn with_id<S: Into<String>>(id: S) -> Self {
        Meta {
            id: Some(id.into()),
            ..Meta::default()
        }
    }

    /// Metadata as a value, for the META() function.
    pub fn to_value(&self) -> Value {
        let mut fields = BTreeMap::new();
        if let Some(id) = &self.id {
            fields.insert("id".to_string(), Value::string(id.clone()));
        }
        if let Some(cas) = self.cas {
            fields.insert("cas".to_string(), Value::Number(cas as f64));
        }
        if let Some(expiry) = self.expiry {
            fields.insert("expiry".to_string(), Value::Number(expiry as f64));
        }
        Value::Object(fields)
    }
}

/// A value traveling through the pipeline.
#[derive(Clone, Debug)]
pub struct Item {
    value: Value,
    meta: Arc<Meta>,
}

impl Item {
    /// An item with no metadata.
    pub fn new(value: Value) -> Self {
        Item {
            value,
            meta: Arc::new(Meta::default()),
        }
    }

    /// An item with an empty object value, the seed for FROM-less selects.
    pub fn empty() -> Self {
        Item::new(Value::object())
    }

    pub fn with_meta(value: Value, meta: Meta) -> Self {
        Item {
            value,
            meta: Arc::new(meta),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Copy this item so a new top-level binding can be overlaid without
    /// touching the original. Metadata is shared, not copied.
    pub fn duplicate(&self) -> Item {
        self.clone()
    }

    /// A new item carrying `value` but keeping this item's metadata.
    pub fn with_value(&self, value: Value) -> Item {
        Item {
            value,
            meta: self.meta.clone(),
        }
    }

    /// Overlay a top-level binding. A non-object value is replaced by a fresh
    /// object holding only the binding.
    pub fn set_field<S: Into<String>>(&mut self, key: S, value: Value) {
        match &mut self.value {
            Value::Object(fields) => {
                fields.insert(key.into(), value);
            }
            _ => {
                let mut fields = BTreeMap::new();
                fields.insert(key.into(), value);
                self.value = Value::Object(fields);
            }
        }
    }
}
