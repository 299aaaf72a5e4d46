//! Durable key-value backends for the credential store

use crate::error::{StorageError, StorageResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// String key-value storage with local-storage semantics
///
/// Implementations must be internally synchronized; all calls are
/// synchronous and return quickly.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Read a value, `None` when absent or unreadable
    fn get_item(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be made durable.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a value; deleting an absent key succeeds
    ///
    /// # Errors
    ///
    /// Returns an error if the change could not be made durable.
    fn remove_item(&self, key: &str) -> StorageResult<()>;
}

/// Process-local backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: DashMap<String, String>,
}

impl MemoryBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).map(|v| v.value().clone())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.items.remove(key);
        Ok(())
    }
}

/// JSON-object file backend
///
/// Reads go to disk every time so a session written by another process is
/// picked up. Writes are read-modify-write under a process-wide lock and
/// replace the file atomically.
pub struct FileBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileBackend {
    /// Use `path` as the backing file; it is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> BTreeMap<String, String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session file");
                return BTreeMap::new();
            }
        };

        if content.trim().is_empty() {
            return BTreeMap::new();
        }

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Session file is not a JSON object, treating as empty"
            );
            BTreeMap::new()
        })
    }

    fn write_document(&self, document: &BTreeMap<String, String>) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut file, document)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .map_err(|e| StorageError::persist(&self.path, e.error.to_string()))?;

        debug!(path = %self.path.display(), keys = document.len(), "Session file written");
        Ok(())
    }

    fn update<F>(&self, mutate: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self.write_lock.lock();
        let mut document = self.read_document();
        if mutate(&mut document) {
            self.write_document(&document)?;
        }
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Option<String> {
        self.read_document().remove(key)
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|doc| {
            doc.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.update(|doc| doc.remove(key).is_some())
    }
}
