//! Quill Value - tagged JSON value type for the quill query engine
//!
//! This crate provides the value model the rest of the engine is built on:
//! - A six-kind `Value` (MISSING, NULL, boolean, number, string, array, object)
//!   where MISSING ("no such attribute") is distinct from NULL ("attribute
//!   present, explicitly absent")
//! - Path access that resolves unreachable paths to MISSING instead of erroring
//! - Cross-kind collation used by comparisons, ordering, and grouping
//! - A canonical byte encoding for hashing values by collation equality

pub mod collate;
pub mod encode;
pub mod item;
pub mod types;

pub use collate::{collate, rank, same_class};
pub use encode::{encode_key, encode_tuple, encoded};
pub use item::{Item, Meta};
pub use types::{number_to_string, Kind, Value};
