use serde::{Deserialize, Serialize};

use crate::analysis::Intention;
use crate::messages::Locale;

/// Process-wide configuration, re-read by every ingestion and tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_file_mb")]
    pub max_file_mb: u64,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub analysis_engine: EngineSelection,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub locale: Locale,
}

fn default_allowed_extensions() -> Vec<String> {
    [".mp3", ".wav", ".m4a", ".txt", ".pdf", ".docx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_file_mb() -> u64 {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_file_mb: default_max_file_mb(),
            thresholds: Thresholds::default(),
            analysis_engine: EngineSelection::default(),
            gateway: GatewaySettings::default(),
            locale: Locale::default(),
        }
    }
}

impl Settings {
    /// Lower-cases the allowlist and makes sure every entry carries its
    /// leading dot.
    pub fn normalize(mut self) -> Self {
        self.allowed_extensions = self
            .allowed_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| ext.len() > 1)
            .collect();
        self
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        let extension = normalize_extension(extension);
        self.allowed_extensions.iter().any(|e| *e == extension)
    }

    /// Size cap in bytes, compared against a file's size in MiB.
    pub fn exceeds_size_cap(&self, size_bytes: u64) -> bool {
        let size_mb = size_bytes as f64 / 1024.0 / 1024.0;
        size_mb > self.max_file_mb as f64
    }

    /// True when analysis should go to the external gateway.
    pub fn uses_gateway(&self) -> bool {
        self.analysis_engine == EngineSelection::Delegated && self.gateway.is_configured()
    }
}

pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().to_lowercase();
    if trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{}", trimmed)
    }
}

/// Score cut-offs for the intention buckets. `high > medium` is assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_high")]
    pub high: u8,
    #[serde(default = "default_medium")]
    pub medium: u8,
}

fn default_high() -> u8 {
    80
}

fn default_medium() -> u8 {
    60
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: default_high(),
            medium: default_medium(),
        }
    }
}

impl Thresholds {
    pub fn intention_for(&self, score: u8) -> Intention {
        if score >= self.high {
            Intention::High
        } else if score >= self.medium {
            Intention::Medium
        } else {
            Intention::Low
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineSelection {
    #[default]
    Heuristic,
    Delegated,
}

impl std::fmt::Display for EngineSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineSelection::Heuristic => write!(f, "heuristic"),
            EngineSelection::Delegated => write!(f, "delegated"),
        }
    }
}

/// Connection details for the delegated analysis gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySettings {
    #[serde(default)]
    pub url: String,
    /// Sent verbatim as the `Authorization` header when non-empty.
    #[serde(default)]
    pub auth_header: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_header: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GatewaySettings {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}
