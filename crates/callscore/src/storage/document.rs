//! Whole-document JSON persistence.
//!
//! Every persisted value (settings, the job table) is a single JSON document
//! addressed by a key. Reads never fail: an absent or corrupt document reads
//! as the type's default. Writes replace the whole document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

/// Raw key → document storage medium.
pub trait DocumentBackend: Send + Sync {
    /// Returns the raw document for `key`, or `None` if it does not exist or
    /// cannot be read.
    fn read(&self, key: &str) -> Option<String>;

    /// Replaces the document stored under `key`.
    fn write(&self, key: &str, contents: &str) -> Result<(), StorageError>;
}

/// Stores each document as `<key>.json` inside a data directory.
pub struct FileBackend {
    directory: PathBuf,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", key))
    }

    fn ensure_directory(&self) -> Result<(), StorageError> {
        if !self.directory.exists() {
            std::fs::create_dir_all(&self.directory).map_err(|e| {
                StorageError::CreateDirectory {
                    path: self.directory.clone(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }
}

impl DocumentBackend for FileBackend {
    fn read(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), StorageError> {
        self.ensure_directory()?;

        let path = self.path_for(key);
        let temp_path = self.directory.join(format!(".{}.json.tmp", key));

        // Write next to the target, then rename over it
        std::fs::write(&temp_path, contents).map_err(|e| StorageError::WriteFile {
            path: temp_path.clone(),
            source: e,
        })?;
        std::fs::rename(&temp_path, &path).map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        Ok(())
    }
}

/// Process-local storage, used for ephemeral runs and tests.
#[derive(Default)]
pub struct MemoryBackend {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentBackend for MemoryBackend {
    fn read(&self, key: &str) -> Option<String> {
        let documents = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        documents.get(key).cloned()
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), StorageError> {
        let mut documents = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        documents.insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

/// Reads and decodes the document under `key`, falling back to
/// `T::default()` when it is absent or does not parse.
pub fn read_document<T>(backend: &dyn DocumentBackend, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = backend.read(key) else {
        return T::default();
    };

    if raw.trim().is_empty() {
        return T::default();
    }

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Document '{}' is corrupt, using defaults: {}", key, e);
            T::default()
        }
    }
}

/// Serializes `value` and replaces the document under `key`.
pub fn write_document<T>(
    backend: &dyn DocumentBackend,
    key: &str,
    value: &T,
) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
{
    let contents = serde_json::to_string(value).map_err(|e| StorageError::Serialize {
        key: key.to_string(),
        source: e,
    })?;
    backend.write(key, &contents)
}
