//! Persistence gateway: keyed JSON blobs, loaded and saved asynchronously

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

/// Storage key for the timer collection
pub const TIMERS_KEY: &str = "timer-tracker.timers.v3";
/// Storage key for the completion history
pub const TIMER_LOGS_KEY: &str = "timer-tracker.timer-logs.v3";
/// Storage key for the user's category list
pub const CATEGORIES_KEY: &str = "timer-tracker.categories.v3";

/// Every key the store writes, in hydration order
pub const ALL_KEYS: [&str; 3] = [TIMERS_KEY, TIMER_LOGS_KEY, CATEGORIES_KEY];

/// Errors raised by a storage gateway
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode value for key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Stored data for key '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Generic key-value persistence over serialized JSON
///
/// Implementations must be safe to share between the store, its background
/// writer and the HTTP layer.
pub trait Storage: Send + Sync + 'static {
    /// Load the value stored under `key`, `Ok(None)` if nothing was stored
    fn load<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>, StorageError>>;

    /// Replace the value stored under `key`
    fn save<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), StorageError>>;

    /// Remove `key`; removing a missing key succeeds
    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StorageError>>;

    /// Remove every key this application owns
    fn clear(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        Box::pin(async move {
            for key in ALL_KEYS {
                self.remove(key).await?;
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for dyn Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Storage")
    }
}

/// File-backed gateway storing one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create a gateway rooted at `dir`; the directory is created lazily on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn load<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>, StorageError>> {
        Box::pin(async move {
            let path = self.path_for(key);
            let raw = match fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("No stored data for key {}", key);
                    return Ok(None);
                }
                Err(source) => return Err(StorageError::Io { key: key.to_string(), source }),
            };

            let value = serde_json::from_str(&raw)
                .map_err(|source| StorageError::Corrupt { key: key.to_string(), source })?;
            debug!("Loaded key {} ({} bytes)", key, raw.len());
            Ok(Some(value))
        })
    }

    fn save<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let io_err = |source| StorageError::Io { key: key.to_string(), source };

            let encoded = serde_json::to_vec(&value)
                .map_err(|source| StorageError::Encode { key: key.to_string(), source })?;

            fs::create_dir_all(&self.dir).await.map_err(io_err)?;

            // Write next to the target and rename so a crash never leaves half a file
            let path = self.path_for(key);
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, &encoded).await.map_err(io_err)?;
            fs::rename(&tmp, &path).await.map_err(io_err)?;

            debug!("Saved key {} ({} bytes)", key, encoded.len());
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            match fs::remove_file(self.path_for(key)).await {
                Ok(()) => {
                    info!("Removed stored key {}", key);
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(source) => Err(StorageError::Io { key: key.to_string(), source }),
            }
        })
    }
}

/// In-process gateway, handy for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key before the store hydrates
    pub fn with_entry(self, key: &str, value: Value) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
        self
    }

    /// Synchronous peek at a stored value
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().ok().and_then(|entries| entries.get(key).cloned())
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Value>) -> T,
    ) -> Result<T, StorageError> {
        let mut entries = self.entries.lock()
            .map_err(|e| StorageError::Unavailable(format!("memory storage lock poisoned: {}", e)))?;
        Ok(f(&mut entries))
    }
}

impl Storage for MemoryStorage {
    fn load<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>, StorageError>> {
        Box::pin(async move { self.with_entries(|entries| entries.get(key).cloned()) })
    }

    fn save<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.with_entries(|entries| {
                entries.insert(key.to_string(), value);
            })
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.with_entries(|entries| {
                if entries.remove(key).is_none() {
                    debug!("Nothing stored under key {}", key);
                }
            })
        })
    }
}
