//! The request/response contract between a network front-end and the engine.
//!
//! A `Request` carries the statement text, named arguments, and an optional
//! deadline. The engine publishes into a `ResponseSink`: result values as
//! they stream, warnings and errors out-of-band, and a final completion
//! status.

use crate::error::Error;
use async_trait::async_trait;
use quill_value::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Request {
    pub id: Uuid,
    pub statement: String,
    pub args: HashMap<String, Value>,
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn new<S: Into<String>>(statement: S) -> Self {
        Request {
            id: Uuid::new_v4(),
            statement: statement.into(),
            args: HashMap::new(),
            timeout: None,
        }
    }

    pub fn with_args(mut self, args: HashMap<String, Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Success,
    Errors,
    Timeout,
}

/// Where a request's output goes. The HTTP front-end streams these to the
/// client; tests collect them in a buffer.
#[async_trait]
pub trait ResponseSink: Send {
    async fn result(&mut self, value: Value);

    async fn warning(&mut self, error: Error);

    async fn error(&mut self, error: Error);

    async fn complete(&mut self, status: RequestStatus);
}

/// A sink that buffers everything; the test harness and one-shot callers.
#[derive(Debug, Default)]
pub struct BufferedSink {
    pub results: Vec<Value>,
    pub warnings: Vec<Error>,
    pub errors: Vec<Error>,
    pub status: Option<RequestStatus>,
}

#[async_trait]
impl ResponseSink for BufferedSink {
    async fn result(&mut self, value: Value) {
        self.results.push(value);
    }

    async fn warning(&mut self, error: Error) {
        self.warnings.push(error);
    }

    async fn error(&mut self, error: Error) {
        self.errors.push(error);
    }

    async fn complete(&mut self, status: RequestStatus) {
        self.status = Some(status);
    }
}
