//! Quill Catalog - the pluggable document store behind the query engine.
//!
//! A `Site` resolves pools, a `Pool` resolves buckets, and a `Bucket` serves
//! documents by key, scans, and holds secondary-index metadata. The engine
//! only ever talks to these traits; two backends ship here:
//!
//! - [`memory`]: process-local maps, used by tests and as the substrate the
//!   dir backend loads into.
//! - [`dir`]: a read-only catalog over a directory tree of `*.json` files,
//!   selected with `dir:PATH` URLs.
//!
//! Fetches distinguish "not found" (`Ok(None)`) from fetch failure (`Err`).

pub mod dir;
pub mod memory;

use async_trait::async_trait;
use quill_value::Item;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Index already exists: {0}")]
    DuplicateIndex(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Transient fetch failure: {0}")]
    Transient(String),

    #[error("Invalid catalog source: {0}")]
    InvalidSource(String),
}

/// Metadata for a secondary index. The catalog only records it; there is no
/// index-backed access path in the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexMeta {
    pub name: String,
    pub method: String,
    pub expressions: Vec<String>,
}

/// A site is the root of a catalog: a named collection of pools.
#[async_trait]
pub trait Site: Send + Sync {
    /// The URL this site was opened from.
    fn url(&self) -> &str;

    fn pool_names(&self) -> Vec<String>;

    fn pool(&self, name: &str) -> Result<Arc<dyn Pool>>;
}

/// A pool is a namespace of buckets.
#[async_trait]
pub trait Pool: Send + Sync {
    fn name(&self) -> &str;

    fn bucket_names(&self) -> Vec<String>;

    fn bucket(&self, name: &str) -> Result<Arc<dyn Bucket>>;
}

/// A bucket serves documents. All methods must be safe to call from
/// concurrent requests.
#[async_trait]
pub trait Bucket: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch one document. `Ok(None)` means the key does not exist.
    async fn fetch(&self, id: &str) -> Result<Option<Item>>;

    /// Fetch a batch of documents. Missing ids are simply absent from the
    /// returned map.
    async fn bulk_fetch(&self, ids: &[String]) -> Result<HashMap<String, Item>>;

    /// Number of documents currently in the bucket.
    async fn count(&self) -> Result<u64>;

    /// A scanner over the current contents.
    fn scanner(&self) -> Result<Box<dyn Scanner>>;

    async fn create_index(&self, name: &str, method: &str, expressions: Vec<String>)
        -> Result<()>;

    fn indexes(&self) -> Vec<IndexMeta>;
}

/// What a scan should materialize per document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ScanShape {
    /// Full document payloads.
    #[default]
    Full,
    /// Only document ids; the emitted items carry empty values plus metadata.
    KeysOnly,
}

/// A lazy, finite scan. Entries are pushed through the channel; a dropped
/// receiver is the cancellation signal and must stop the scan promptly.
#[async_trait]
pub trait Scanner: Send {
    async fn scan(&mut self, shape: ScanShape, output: mpsc::Sender<Item>) -> Result<()>;
}
