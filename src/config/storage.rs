//! Session storage configuration

use serde::Deserialize;
use std::path::PathBuf;

use super::error::ValidationError;

/// Session storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Which store to use
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the file store
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
}

/// Session store backend
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

fn default_base_path() -> PathBuf {
    PathBuf::from("./data/sessions")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            base_path: default_base_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.backend == StorageBackend::File && self.base_path.as_os_str().is_empty() {
            return Err(ValidationError::MissingRequired("storage.base_path"));
        }
        Ok(())
    }
}
