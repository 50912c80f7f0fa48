//! Common test utilities for query integration tests.
#![allow(dead_code)]

use quill_catalog::memory::{MemoryBucket, MemorySite};
use quill_query::{BufferedSink, Engine, Error, Request, RequestStatus};
use quill_value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// An in-memory site plus an engine, with helpers to load documents and run
/// statements end-to-end.
pub struct TestContext {
    site: Arc<MemorySite>,
    engine: Engine,
}

impl TestContext {
    pub fn new() -> Self {
        let site = MemorySite::new("memory:");
        site.add_pool("default");
        let engine = Engine::new(site.clone(), "default");
        TestContext { site, engine }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let site = MemorySite::new("memory:");
        site.add_pool("default");
        let engine = Engine::new(site.clone(), "default").with_timeout(Some(timeout));
        TestContext { site, engine }
    }

    pub fn bucket(&self, name: &str) -> Arc<MemoryBucket> {
        self.site.add_pool("default").add_bucket(name)
    }

    pub fn pool(&self) -> Arc<dyn quill_catalog::Pool> {
        use quill_catalog::Site;
        self.site.pool("default").unwrap()
    }

    /// Load documents as (id, json) pairs into a bucket.
    pub fn load(&self, bucket: &str, documents: &[(&str, &str)]) {
        let bucket = self.bucket(bucket);
        for (id, json) in documents {
            bucket.put_json(id, json);
        }
    }

    pub async fn run(&self, statement: &str) -> BufferedSink {
        self.run_request(Request::new(statement)).await
    }

    pub async fn run_request(&self, request: Request) -> BufferedSink {
        let mut sink = BufferedSink::default();
        self.engine.execute(&request, &mut sink).await;
        sink
    }

    pub async fn run_with_args(&self, statement: &str, args: &[(&str, Value)]) -> BufferedSink {
        let args: HashMap<String, Value> = args
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        self.run_request(Request::new(statement).with_args(args)).await
    }

    /// Run a statement that must succeed; returns its rows.
    pub async fn rows(&self, statement: &str) -> Vec<Value> {
        let sink = self.run(statement).await;
        assert_eq!(
            sink.status,
            Some(RequestStatus::Success),
            "{} failed: {:?}",
            statement,
            sink.errors
        );
        sink.results
    }

    /// Run a statement that must fail before or during execution; returns
    /// the first error.
    pub async fn error(&self, statement: &str) -> Error {
        let sink = self.run(statement).await;
        assert!(
            !sink.errors.is_empty(),
            "{} unexpectedly succeeded with {:?}",
            statement,
            sink.results
        );
        sink.errors.into_iter().next().unwrap()
    }
}

/// A row as canonical JSON text, for order-insensitive comparisons.
pub fn json(value: &Value) -> String {
    serde_json::to_string(&value.clone().into_json()).unwrap()
}

/// Assert the rows equal the expected JSON objects, in order.
pub fn assert_rows(rows: &[Value], expected: &[&str]) {
    let actual: Vec<String> = rows.iter().map(json).collect();
    let expected: Vec<String> = expected
        .iter()
        .map(|text| {
            serde_json::to_string(&serde_json::from_str::<serde_json::Value>(text).unwrap())
                .unwrap()
        })
        .collect();
    assert_eq!(actual, expected);
}

/// Assert the rows equal the expected JSON objects, ignoring order.
pub fn assert_rows_unordered(rows: &[Value], expected: &[&str]) {
    let mut actual: Vec<String> = rows.iter().map(json).collect();
    let mut expected: Vec<String> = expected
        .iter()
        .map(|text| {
            serde_json::to_string(&serde_json::from_str::<serde_json::Value>(text).unwrap())
                .unwrap()
        })
        .collect();
    actual.sort();
    expected.sort();
    assert_eq!(actual, expected);
}
