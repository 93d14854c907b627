//! Cache store for fetched chunk payloads
//!
//! The fetcher only needs keyed get/exists/set. Two stores are provided:
//! an in-memory map for a single process and a directory of JSON files
//! that survives restarts.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::{CacheBackend, CacheConfig};
use crate::error::ChunkError;

/// Cache key for a chunk payload.
///
/// Derived from the project, branch and chunk identifier. Each component is
/// escaped before joining so distinct triples can never produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for a `(project, branch, identifier)` triple
    ///
    /// An empty branch is the same as no branch.
    pub fn new(project_id: &str, branch_id: Option<&str>, identifier: &str) -> Self {
        let branch = branch_id.unwrap_or("");
        Self(format!(
            "chunk_{}|{}|{}",
            escape_component(project_id),
            escape_component(branch),
            escape_component(identifier)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn escape_component(s: &str) -> String {
    s.replace('\\', "\\\\").replace('|', "\\|")
}

/// Keyed payload store shared by concurrent resolutions
pub trait ChunkCache: Send + Sync {
    /// Cached payload for `key`, if any
    fn get(&self, key: &CacheKey) -> Result<Option<Value>, ChunkError>;

    /// Whether a payload is cached for `key`
    fn exists(&self, key: &CacheKey) -> Result<bool, ChunkError>;

    /// Store `payload` under `key`; last write wins
    fn set(&self, key: &CacheKey, payload: Value) -> Result<(), ChunkError>;
}

/// In-memory cache store
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached payloads
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChunkCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Value>, ChunkError> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn exists(&self, key: &CacheKey) -> Result<bool, ChunkError> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.contains_key(key))
    }

    fn set(&self, key: &CacheKey, payload: Value) -> Result<(), ChunkError> {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.clone(), payload);
        debug!(%key, "MemoryCache::set: stored payload");
        Ok(())
    }
}

/// File-backed cache store
///
/// ```text
/// {cache_dir}/
/// ├── 6368756e6b5f....json
/// └── ...
/// ```
#[derive(Debug)]
pub struct FileCache {
    base_path: PathBuf,
}

impl FileCache {
    /// Open or create a file cache at the given directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChunkError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        debug!(?base_path, "Opened file cache");
        Ok(Self { base_path })
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let name: String = key.as_str().bytes().map(|b| format!("{:02x}", b)).collect();
        self.base_path.join(format!("{}.json", name))
    }
}

impl ChunkCache for FileCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Value>, ChunkError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn exists(&self, key: &CacheKey) -> Result<bool, ChunkError> {
        Ok(self.entry_path(key).exists())
    }

    fn set(&self, key: &CacheKey, payload: Value) -> Result<(), ChunkError> {
        let path = self.entry_path(key);
        // Each writer gets its own temp file so concurrent sets never share one
        let mut tmp = NamedTempFile::new_in(&self.base_path)?;
        tmp.write_all(serde_json::to_string(&payload)?.as_bytes())?;
        tmp.persist(&path).map_err(|e| ChunkError::Io(e.error))?;
        debug!(%key, ?path, "FileCache::set: stored payload");
        Ok(())
    }
}

/// Create the cache store selected by configuration
pub fn build_cache(config: &CacheConfig) -> Result<Arc<dyn ChunkCache>, ChunkError> {
    debug!(backend = ?config.backend, "build_cache: called");
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::new())),
        CacheBackend::File => Ok(Arc::new(FileCache::open(&config.path)?)),
    }
}
