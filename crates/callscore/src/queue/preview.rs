//! Transient playback handles for audio jobs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

/// Reference to a local audio file, valid until released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHandle {
    pub id: String,
    pub path: PathBuf,
}

impl PreviewHandle {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// Hands out and takes back preview handles.
pub trait PreviewProvider: Send + Sync {
    fn create(&self, path: &Path) -> Option<PreviewHandle>;
    fn release(&self, handle: &PreviewHandle);
}

/// Keeps a table of live handles pointing at files on local disk.
#[derive(Debug, Default)]
pub struct LocalPreviews {
    live: Mutex<HashMap<String, PathBuf>>,
    released: Mutex<u64>,
}

impl LocalPreviews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles created and not yet released.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Total successful releases.
    pub fn released_count(&self) -> u64 {
        *self.released.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PreviewProvider for LocalPreviews {
    fn create(&self, path: &Path) -> Option<PreviewHandle> {
        let handle = PreviewHandle::new(Uuid::new_v4().to_string(), path);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.id.clone(), handle.path.clone());
        Some(handle)
    }

    fn release(&self, handle: &PreviewHandle) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id);

        match removed {
            Some(_) => {
                *self.released.lock().unwrap_or_else(PoisonError::into_inner) += 1;
            }
            None => log::debug!("Preview handle {} was already released", handle.id),
        }
    }
}
