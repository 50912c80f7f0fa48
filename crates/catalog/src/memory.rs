//! In-memory catalog backend.
//!
//! Buckets are `parking_lot`-guarded maps from document id to value. Scans
//! snapshot the bucket under the read lock and stream the snapshot, so a
//! long-running scan never holds the lock while the pipeline applies
//! backpressure.

use crate::{Bucket, Error, IndexMeta, Pool, Result, ScanShape, Scanner, Site};
use async_trait::async_trait;
use parking_lot::RwLock;
use quill_value::{Item, Meta, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct MemorySite {
    url: String,
    pools: RwLock<BTreeMap<String, Arc<MemoryPool>>>,
}

impl MemorySite {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        Arc::new(MemorySite {
            url: url.into(),
            pools: RwLock::new(BTreeMap::new()),
        })
    }

    /// Get or create a pool.
    pub fn add_pool(&self, name: &str) -> Arc<MemoryPool> {
        self.pools
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryPool::new(name)))
            .clone()
    }
}

#[async_trait]
impl Site for MemorySite {
    fn url(&self) -> &str {
        &self.url
    }

    fn pool_names(&self) -> Vec<String> {
        self.pools.read().keys().cloned().collect()
    }

    fn pool(&self, name: &str) -> Result<Arc<dyn Pool>> {
        self.pools
            .read()
            .get(name)
            .cloned()
            .map(|p| p as Arc<dyn Pool>)
            .ok_or_else(|| Error::PoolNotFound(name.to_string()))
    }
}

pub struct MemoryPool {
    name: String,
    buckets: RwLock<BTreeMap<String, Arc<MemoryBucket>>>,
}

impl MemoryPool {
    fn new(name: &str) -> Self {
        MemoryPool {
            name: name.to_string(),
            buckets: RwLock::new(BTreeMap::new()),
        }
    }

    /// Get or create a bucket.
    pub fn add_bucket(&self, name: &str) -> Arc<MemoryBucket> {
        self.buckets
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryBucket::new(name)))
            .clone()
    }
}

#[async_trait]
impl Pool for MemoryPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn bucket_names(&self) -> Vec<String> {
        self.buckets.read().keys().cloned().collect()
    }

    fn bucket(&self, name: &str) -> Result<Arc<dyn Bucket>> {
        self.buckets
            .read()
            .get(name)
            .cloned()
            .map(|b| b as Arc<dyn Bucket>)
            .ok_or_else(|| Error::BucketNotFound(name.to_string()))
    }
}

pub struct MemoryBucket {
    name: String,
    documents: RwLock<BTreeMap<String, Value>>,
    indexes: RwLock<Vec<IndexMeta>>,
}

impl MemoryBucket {
    fn new(name: &str) -> Self {
        MemoryBucket {
            name: name.to_string(),
            documents: RwLock::new(BTreeMap::new()),
            indexes: RwLock::new(Vec::new()),
        }
    }

    pub fn put(&self, id: &str, value: Value) {
        self.documents.write().insert(id.to_string(), value);
    }

    pub fn put_json(&self, id: &str, json: &str) {
        let value = serde_json::from_str::<Value>(json).expect("invalid test document");
        self.put(id, value);
    }

    fn item(&self, id: &str, value: Value) -> Item {
        Item::with_meta(value, Meta::with_id(id))
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, id: &str) -> Result<Option<Item>> {
        Ok(self
            .documents
            .read()
            .get(id)
            .cloned()
            .map(|value| self.item(id, value)))
    }

    async fn bulk_fetch(&self, ids: &[String]) -> Result<HashMap<String, Item>> {
        let documents = self.documents.read();
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(value) = documents.get(id) {
                found.insert(id.clone(), self.item(id, value.clone()));
            }
        }
        Ok(found)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.documents.read().len() as u64)
    }

    fn scanner(&self) -> Result<Box<dyn Scanner>> {
        let snapshot: Vec<(String, Value)> = self
            .documents
            .read()
            .iter()
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect();
        Ok(Box::new(MemoryScanner { snapshot }))
    }

    async fn create_index(
        &self,
        name: &str,
        method: &str,
        expressions: Vec<String>,
    ) -> Result<()> {
        let mut indexes = self.indexes.write();
        if indexes.iter().any(|ix| ix.name == name) {
            return Err(Error::DuplicateIndex(name.to_string()));
        }
        indexes.push(IndexMeta {
            name: name.to_string(),
            method: method.to_string(),
            expressions,
        });
        Ok(())
    }

    fn indexes(&self) -> Vec<IndexMeta> {
        self.indexes.read().clone()
    }
}

struct MemoryScanner {
    snapshot: Vec<(String, Value)>,
}

#[async_trait]
impl Scanner for MemoryScanner {
    async fn scan(&mut self, shape: ScanShape, output: mpsc::Sender<Item>) -> Result<()> {
        for (id, value) in self.snapshot.drain(..) {
            let item = match shape {
                ScanShape::Full => Item::with_meta(value, Meta::with_id(id)),
                ScanShape::KeysOnly => Item::with_meta(Value::object(), Meta::with_id(id)),
            };
            if output.send(item).await.is_err() {
                // Receiver gone: the pipeline was cancelled or torn down.
                break;
            }
        }
        Ok(())
    }
}
