//! Pattern store implementations
//!
//! Provides an in-memory store and a file-backed store with atomic writes.

use super::types::{CachedPattern, PatternCache};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Where discovered patterns are kept between runs
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Entry for a domain
    async fn get(&self, domain: &str) -> Result<Option<CachedPattern>>;

    /// Store an entry, replacing any existing one
    async fn put(&self, domain: &str, entry: CachedPattern) -> Result<()>;

    /// Every entry, ordered by domain
    async fn entries(&self) -> Result<Vec<(String, CachedPattern)>>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Store that lives as long as the process
#[derive(Debug, Clone, Default)]
pub struct InMemoryPatternStore {
    cache: Arc<RwLock<PatternCache>>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with entries
    pub fn with_cache(cache: PatternCache) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
        }
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn get(&self, domain: &str) -> Result<Option<CachedPattern>> {
        Ok(self.cache.read().await.get(domain).cloned())
    }

    async fn put(&self, domain: &str, entry: CachedPattern) -> Result<()> {
        self.cache.write().await.insert(domain, entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, CachedPattern)>> {
        let cache = self.cache.read().await;
        Ok(cache
            .domains
            .iter()
            .map(|(domain, entry)| (domain.clone(), entry.clone()))
            .collect())
    }
}

// ============================================================================
// File Store
// ============================================================================

/// Store persisted as a JSON file, rewritten on every put
#[derive(Debug, Clone)]
pub struct FilePatternStore {
    /// Path to the cache file
    path: PathBuf,
    /// Loaded entries
    cache: Arc<RwLock<PatternCache>>,
}

impl FilePatternStore {
    /// Open a cache file, loading existing entries if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::cache(format!("Failed to read cache file: {e}")))?;
            serde_json::from_str(&contents)
                .map_err(|e| Error::cache(format!("Failed to parse cache file: {e}")))?
        } else {
            PatternCache::new()
        };

        Ok(Self {
            path,
            cache: Arc::new(RwLock::new(cache)),
        })
    }

    /// Reload entries from disk, replacing what is in memory
    pub async fn load(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::cache(format!("Failed to read cache file: {e}")))?;
        let loaded: PatternCache = serde_json::from_str(&contents)
            .map_err(|e| Error::cache(format!("Failed to parse cache file: {e}")))?;

        *self.cache.write().await = loaded;
        Ok(())
    }

    /// Write entries to disk
    pub async fn save(&self) -> Result<()> {
        let contents = {
            let cache = self.cache.read().await;
            serde_json::to_string_pretty(&*cache)
                .map_err(|e| Error::cache(format!("Failed to serialize cache: {e}")))?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::cache(format!("Failed to create cache directory: {e}")))?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::cache(format!("Failed to write cache file: {e}")))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::cache(format!("Failed to rename cache file: {e}")))?;

        debug!("Saved pattern cache to {}", self.path.display());
        Ok(())
    }

    /// Path to the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PatternStore for FilePatternStore {
    async fn get(&self, domain: &str) -> Result<Option<CachedPattern>> {
        Ok(self.cache.read().await.get(domain).cloned())
    }

    async fn put(&self, domain: &str, entry: CachedPattern) -> Result<()> {
        self.cache.write().await.insert(domain, entry);
        self.save().await
    }

    async fn entries(&self) -> Result<Vec<(String, CachedPattern)>> {
        let cache = self.cache.read().await;
        Ok(cache
            .domains
            .iter()
            .map(|(domain, entry)| (domain.clone(), entry.clone()))
            .collect())
    }
}
