//! File-based prompt store
//!
//! Keeps the whole `prompts` collection in one JSON document keyed by record
//! id. The document is rewritten after every write, so records survive
//! restarts. A write only reaches the cache once the document on disk holds it.

use async_trait::async_trait;
use chrono::Utc;
use genflow_core::{
    visible_in_order, GenflowError, GenflowResult, PromptPatch, PromptRecord, PromptStore,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// JSON-document prompt store
///
/// ```rust,no_run
/// use genflow_store::FileStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FileStore::open("./prompts.json").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    cache: Arc<RwLock<HashMap<String, PromptRecord>>>,
    /// Serializes writers; readers only ever take `cache`
    writer: Arc<Mutex<()>>,
}

impl FileStore {
    /// Open the document at `path`, creating parent directories as needed
    ///
    /// A missing or blank file starts an empty collection.
    pub async fn open(path: impl Into<PathBuf>) -> GenflowResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    GenflowError::store(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let cache = Self::read_document(&path).await?;
        debug!("Loaded {} prompts from {}", cache.len(), path.display());

        Ok(Self {
            path,
            cache: Arc::new(RwLock::new(cache)),
            writer: Arc::new(Mutex::new(())),
        })
    }

    async fn read_document(path: &Path) -> GenflowResult<HashMap<String, PromptRecord>> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(HashMap::new());
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GenflowError::store(format!("Failed to read prompt file {}: {}", path.display(), e))
        })?;

        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            GenflowError::store(format!("Failed to parse prompt file {}: {}", path.display(), e))
        })
    }

    /// Write `records` to disk, then make them the cache
    ///
    /// The cache guard is never held across the file write. On failure the
    /// cache keeps its previous contents.
    async fn commit(&self, records: HashMap<String, PromptRecord>) -> GenflowResult<()> {
        self.persist(&records).await?;
        *self.cache.write().await = records;
        Ok(())
    }

    async fn persist(&self, records: &HashMap<String, PromptRecord>) -> GenflowResult<()> {
        let content = serde_json::to_string_pretty(records)
            .map_err(|e| GenflowError::store(format!("Failed to serialize prompts: {}", e)))?;

        tokio::fs::write(&self.path, content).await.map_err(|e| {
            GenflowError::store(format!(
                "Failed to write prompt file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total records, archived ones included
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[async_trait]
impl PromptStore for FileStore {
    async fn list(&self) -> GenflowResult<Vec<PromptRecord>> {
        let cache = self.cache.read().await;
        Ok(visible_in_order(cache.values().cloned()))
    }

    async fn save(&self, patch: PromptPatch) -> GenflowResult<String> {
        let _writer = self.writer.lock().await;
        let now = Utc::now();
        let mut next = self.cache.read().await.clone();

        let id = match patch.id.clone() {
            Some(id) => {
                let record = next
                    .get_mut(&id)
                    .ok_or_else(|| GenflowError::not_found(id.clone()))?;
                record.apply(patch, now);
                id
            }
            None => {
                let record = PromptRecord::create(patch, now);
                let id = record.id.clone();
                next.insert(id.clone(), record);
                id
            }
        };

        self.commit(next).await?;
        debug!("Saved prompt {} to {}", id, self.path.display());
        Ok(id)
    }

    async fn archive(&self, id: &str) -> GenflowResult<()> {
        let _writer = self.writer.lock().await;
        let mut next = self.cache.read().await.clone();
        let record = next.get_mut(id).ok_or_else(|| GenflowError::not_found(id))?;
        record.archive(Utc::now());
        self.commit(next).await
    }

    async fn ping(&self) -> GenflowResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::metadata(&dir)
            .await
            .map(|_| ())
            .map_err(|e| GenflowError::store(format!("{} is not reachable: {}", dir.display(), e)))
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
