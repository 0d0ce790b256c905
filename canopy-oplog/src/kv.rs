//! The durable key-value collaborator.
//!
//! The log treats local storage as an opaque byte store keyed by queue
//! identifier. [`MemoryStore`] backs ephemeral sessions and tests;
//! [`FileStore`] persists one JSON document per key under a directory.

use crate::OplogResult;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// A blocking key-value byte store.
///
/// Calls are expected to be fast (local memory or disk); the sync layer's
/// suspension points are network round trips, not these.
pub trait QueueStore: Send + Sync {
    /// Reads the value for `key`, or `None` if absent.
    fn get(&self, key: &str) -> OplogResult<Option<Vec<u8>>>;

    /// Writes the value for `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> OplogResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> OplogResult<()>;
}

/// In-memory store. Contents die with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStore for MemoryStore {
    fn get(&self, key: &str) -> OplogResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().expect("store lock").get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> OplogResult<()> {
        self.entries
            .lock()
            .expect("store lock")
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> OplogResult<()> {
        self.entries.lock().expect("store lock").remove(key);
        Ok(())
    }
}

/// File-backed store: one file per key under a root directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous value intact rather than a torn file.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> OplogResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys look like "oplog/<workspace>"; flatten to a single file name.
        let name: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.root.join(format!("{name}.json"))
    }
}

impl QueueStore for FileStore {
    fn get(&self, key: &str) -> OplogResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> OplogResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> OplogResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
