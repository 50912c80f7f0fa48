//! Directory-tree catalog backend.
//!
//! `dir:PATH` points at a site directory. Each subdirectory is a pool, each
//! subdirectory of a pool is a bucket, and each `<id>.json` file inside a
//! bucket is one document whose id is the file stem. The tree is loaded once
//! at open time into the memory backend and served read-only; index metadata
//! created against it lives in memory only.

use crate::memory::MemorySite;
use crate::{Error, Result, Site};
use quill_value::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

/// Open a catalog from a `dir:PATH` URL.
pub async fn open(url: &str) -> Result<Arc<dyn Site>> {
    let path = url
        .strip_prefix("dir:")
        .ok_or_else(|| Error::InvalidSource(format!("expected dir:PATH, got {}", url)))?;
    let site = MemorySite::new(url);
    load_site(&site, Path::new(path)).await?;
    Ok(site)
}

async fn load_site(site: &MemorySite, root: &Path) -> Result<()> {
    let mut pools = read_dir(root).await?;
    while let Some(pool_entry) = next_entry(&mut pools, root).await? {
        let pool_path = pool_entry.path();
        if !pool_path.is_dir() {
            continue;
        }
        let pool_name = file_name(&pool_path);
        let pool = site.add_pool(&pool_name);

        let mut buckets = read_dir(&pool_path).await?;
        while let Some(bucket_entry) = next_entry(&mut buckets, &pool_path).await? {
            let bucket_path = bucket_entry.path();
            if !bucket_path.is_dir() {
                continue;
            }
            let bucket_name = file_name(&bucket_path);
            let bucket = pool.add_bucket(&bucket_name);

            let mut loaded = 0usize;
            let mut documents = read_dir(&bucket_path).await?;
            while let Some(doc_entry) = next_entry(&mut documents, &bucket_path).await? {
                let doc_path = doc_entry.path();
                if doc_path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let id = doc_path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                let raw = fs::read_to_string(&doc_path)
                    .await
                    .map_err(|e| Error::Unavailable(format!("{}: {}", doc_path.display(), e)))?;
                match serde_json::from_str::<Value>(&raw) {
                    Ok(value) => {
                        bucket.put(&id, value);
                        loaded += 1;
                    }
                    Err(e) => {
                        // A malformed document disables itself, not the bucket.
                        warn!(path = %doc_path.display(), error = %e, "skipping unparseable document");
                    }
                }
            }
            debug!(pool = %pool_name, bucket = %bucket_name, documents = loaded, "loaded bucket");
        }
    }
    Ok(())
}

async fn read_dir(path: &Path) -> Result<fs::ReadDir> {
    fs::read_dir(path)
        .await
        .map_err(|e| Error::Unavailable(format!("{}: {}", path.display(), e)))
}

async fn next_entry(dir: &mut fs::ReadDir, path: &Path) -> Result<Option<fs::DirEntry>> {
    dir.next_entry()
        .await
        .map_err(|e| Error::Unavailable(format!("{}: {}", path.display(), e)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScanShape;
    use tokio::sync::mpsc;

    async fn site_dir() -> std::path::PathBuf {
        let root = std::env::temp_dir().join(format!("quill-dir-catalog-{}", std::process::id()));
        let bucket = root.join("default").join("contacts");
        fs::create_dir_all(&bucket).await.unwrap();
        fs::write(bucket.join("c1.json"), r#"{"name": "dave", "age": 42}"#)
            .await
            .unwrap();
        fs::write(bucket.join("c2.json"), r#"{"name": "earl"}"#)
            .await
            .unwrap();
        fs::write(bucket.join("notes.txt"), "not a document")
            .await
            .unwrap();
        root
    }

    #[tokio::test]
    async fn open_and_scan_dir_site() {
        let root = site_dir().await;
        let site = open(&format!("dir:{}", root.display())).await.unwrap();
        let bucket = site.pool("default").unwrap().bucket("contacts").unwrap();
        assert_eq!(bucket.count().await.unwrap(), 2);

        let fetched = bucket.fetch("c1").await.unwrap().unwrap();
        assert_eq!(fetched.value().field("age"), &Value::Number(42.0));
        assert_eq!(fetched.meta().id.as_deref(), Some("c1"));

        let (tx, mut rx) = mpsc::channel(4);
        bucket
            .scanner()
            .unwrap()
            .scan(ScanShape::Full, tx)
            .await
            .unwrap();
        let mut ids = Vec::new();
        while let Some(item) = rx.recv().await {
            ids.push(item.meta().id.clone().unwrap());
        }
        ids.sort();
        assert_eq!(ids, vec!["c1", "c2"]);

        fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn open_rejects_non_dir_urls() {
        assert!(open("http://example.test").await.is_err());
    }
}
