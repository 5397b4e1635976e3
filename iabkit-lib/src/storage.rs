//! Durable key-value storage.
//!
//! The session persists its ownership caches and the history-restored flag
//! through [`KeyValueStore`], a string map that the host backs with whatever
//! durable preferences mechanism it has. Two implementations ship with the
//! crate:
//!
//! - [`InMemoryStore`] for tests and short-lived processes
//! - [`FileStore`], a JSON file rewritten atomically on every mutation
//!
//! Every mutating call must be durable when it returns; callers never batch.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Storage error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Reading or writing the backing medium failed.
    Io,
    /// Stored data could not be encoded or decoded.
    Serialization,
    /// An internal lock was poisoned.
    Lock,
}

/// Error type for storage operations.
#[derive(Debug, Clone)]
pub struct StorageError {
    pub code: StorageErrorCode,
    pub message: String,
}

impl StorageError {
    pub fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::new(StorageErrorCode::Io, e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(StorageErrorCode::Serialization, e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

fn lock_error(context: &str) -> StorageError {
    StorageError::new(
        StorageErrorCode::Lock,
        format!("lock poisoned during {}", context),
    )
}

/// Durable string map.
///
/// Implementations must be write-through: once `put` or `remove` returns
/// `Ok`, the change survives a process restart.
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// All keys currently stored.
    fn keys(&self) -> StorageResult<Vec<String>>;

    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Typed helpers on top of [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
    fn get_bool(&self, key: &str, default: bool) -> StorageResult<bool> {
        Ok(match self.get(key)?.as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        })
    }

    fn put_bool(&self, key: &str, value: bool) -> StorageResult<()> {
        self.put(key, if value { "true" } else { "false" })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: serde::Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let json = serde_json::to_string(value)?;
        self.put(key, &json)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStoreExt for T {}

/// In-memory store. Contents are lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys; 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for InMemoryStore {
    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.write().map_err(|_| lock_error("put"))?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.read().map_err(|_| lock_error("get"))?;
        Ok(data.get(key).cloned())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut data = self.data.write().map_err(|_| lock_error("remove"))?;
        data.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let data = self.data.read().map_err(|_| lock_error("keys"))?;
        Ok(data.keys().cloned().collect())
    }
}

/// Store backed by a single JSON file.
///
/// Each mutation takes an exclusive `fs2` lock on a `.lock` sibling, re-reads
/// the file, applies the change and rewrites it through a synced temporary
/// sibling and a rename. Several handles on one path therefore never drop each
/// other's keys. Reads serve the map as of this handle's last open or write.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let entries = read_entries(&path)?;
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(
        &self,
        context: &str,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> StorageResult<()> {
        use fs2::FileExt;

        let mut entries = self.entries.write().map_err(|_| lock_error(context))?;
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path.with_extension("lock"))?;
        FileExt::lock_exclusive(&lock_file)?;

        let updated = read_entries(&self.path).and_then(|mut current| {
            apply(&mut current);
            let json = serde_json::to_vec_pretty(&current)?;
            write_atomically(&self.path, &json)?;
            Ok(current)
        });

        FileExt::unlock(&lock_file)?;
        *entries = updated?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> StorageResult<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let json = fs::read_to_string(path)?;
    if json.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&json)?)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl KeyValueStore for FileStore {
    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        self.mutate("put", |entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| lock_error("get"))?;
        Ok(entries.get(key).cloned())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.mutate("remove", |entries| {
            entries.remove(key);
        })
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| lock_error("keys"))?;
        Ok(entries.keys().cloned().collect())
    }
}
