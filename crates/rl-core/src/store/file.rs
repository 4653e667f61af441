//! File-backed storage backend
//!
//! All entries live in one JSON object. Reads always go to disk so that
//! writes from another process sharing the file are observed; writes are
//! read-modify-write through a temp file and an atomic rename.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::traits::KeyValueBackend;

type Entries = BTreeMap<String, String>;

/// Backend persisting entries to a JSON file
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Create a backend for the given file; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, action: &str, err: impl std::fmt::Display) -> StoreError {
        StoreError::Unavailable(format!(
            "failed to {} {}: {}",
            action,
            self.path.display(),
            err
        ))
    }

    /// Load all entries; a missing or empty file is an empty store
    fn load(&self) -> Result<Entries, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(self.unavailable("read", e)),
        };

        if content.trim().is_empty() {
            return Ok(Entries::new());
        }

        serde_json::from_str(&content).map_err(|e| self.unavailable("parse", e))
    }

    fn persist(&self, entries: &Entries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.unavailable("create directory for", e))?;
            }
        }

        let content =
            serde_json::to_string_pretty(entries).map_err(|e| self.unavailable("encode", e))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content).map_err(|e| self.unavailable("write", e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.unavailable("replace", e))?;
        Ok(())
    }

    fn modify(&self, apply: impl FnOnce(&mut Entries) -> bool) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;

        let mut entries = self.load()?;
        if apply(&mut entries) {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.modify(|entries| entries.remove(key).is_some())
    }
}
