//! String key-value persistence used to keep rates across restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use zakat_core::ZakatError;

#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String) -> Result<(), ZakatError>;
    async fn remove(&self, key: &str) -> Result<(), ZakatError>;
    async fn clear(&self) -> Result<(), ZakatError>;
}

/// Process-local cache. Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.inner.lock().await;
        let value = entries.get(key).cloned();
        if value.is_some() {
            debug!(key, "Cache HIT");
        } else {
            debug!(key, "Cache MISS");
        }
        value
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ZakatError> {
        self.inner.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ZakatError> {
        self.inner.lock().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), ZakatError> {
        self.inner.lock().await.clear();
        Ok(())
    }
}

/// Keeps all entries in one JSON object on disk.
///
/// Writes go through a temporary file and a rename so a crash mid-write
/// leaves the previous contents intact. An unreadable file reads as empty.
#[derive(Debug, Clone)]
pub struct FileSystemCache {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

const CACHE_FILE_NAME: &str = "metal-rates.json";

impl FileSystemCache {
    /// Cache stored as `metal-rates.json` inside `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CACHE_FILE_NAME),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// `<user cache dir>/zakat/metal-rates.json`.
    pub fn default_location() -> Result<Self, ZakatError> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| ZakatError::CacheError("Could not determine cache directory".to_string()))?;
        Ok(Self::new(dir.join("zakat")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> HashMap<String, String> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read cache file");
                return HashMap::new();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Ignoring corrupt cache file");
            HashMap::new()
        })
    }

    async fn write_entries(&self, entries: &HashMap<String, String>) -> Result<(), ZakatError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ZakatError::CacheError(format!("Failed to create cache directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| ZakatError::CacheError(format!("Failed to serialize cache: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| ZakatError::CacheError(format!("Failed to write cache file: {}", e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ZakatError::CacheError(format!("Failed to replace cache file: {}", e)))
    }
}

#[async_trait]
impl KeyValueCache for FileSystemCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.read_entries().await.remove(key)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ZakatError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await;
        entries.insert(key.to_string(), value);
        self.write_entries(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), ZakatError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await;
        if entries.remove(key).is_some() {
            self.write_entries(&entries).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), ZakatError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ZakatError::CacheError(format!("Failed to remove cache file: {}", e))),
        }
    }
}
