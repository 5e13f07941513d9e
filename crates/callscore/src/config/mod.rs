pub mod schema;
pub mod store;

pub use schema::{normalize_extension, EngineSelection, GatewaySettings, Settings, Thresholds};
pub use store::{SettingsStore, SETTINGS_KEY};
