use std::sync::Arc;

use crate::config::schema::Settings;
use crate::error::StorageError;
use crate::storage::{read_document, write_document, DocumentBackend};

pub const SETTINGS_KEY: &str = "callscore.settings";

/// Reads and writes the persisted [`Settings`] document.
#[derive(Clone)]
pub struct SettingsStore {
    backend: Arc<dyn DocumentBackend>,
}

impl SettingsStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }

    /// Current settings with defaults applied. Never fails.
    pub fn get(&self) -> Settings {
        read_document::<Settings>(self.backend.as_ref(), SETTINGS_KEY).normalize()
    }

    /// Overwrites the whole settings document.
    pub fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        write_document(self.backend.as_ref(), SETTINGS_KEY, settings)?;
        log::info!("Settings saved");
        Ok(())
    }
}
