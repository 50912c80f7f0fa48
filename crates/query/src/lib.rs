//! Quill Query - a SQL-like query engine over JSON documents.
//!
//! The engine parses a SQL-like dialect into an expression/statement tree,
//! validates and formalizes it with rewriting passes, lowers it into a
//! linear chain of pipeline operators, and executes the chain as
//! channel-connected tasks streaming result rows. Values follow a
//! three-valued-plus-MISSING logic: see `quill-value` for the data model and
//! [`expr`] for the evaluation semantics.

pub mod engine;
pub mod error;
pub mod exec;
pub mod expr;
pub mod functions;
pub mod parsing;
pub mod pipeline;
pub mod plan;
pub mod planner;
pub mod request;
pub mod stmt;

pub use engine::Engine;
pub use error::{Error, Result};
pub use parsing::Parser;
pub use planner::{Capabilities, Planner};
pub use request::{BufferedSink, Request, RequestStatus, ResponseSink};
