//! File-based Session Store Adapter
//!
//! Stores each session as a YAML file on disk, one directory per session id
//! for easy inspection of archived conversations.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::foundation::SessionId;
use crate::domain::sales::SessionState;
use crate::ports::{SessionStore, SessionStoreError};

/// File-based storage for session state
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    base_path: PathBuf,
}

impl FileSessionStore {
    /// Create a new file store rooted at `base_path`
    ///
    /// # Example
    /// ```ignore
    /// let store = FileSessionStore::new("./data/sessions");
    /// ```
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn session_dir(&self, session_id: SessionId) -> PathBuf {
        self.base_path.join(session_id.to_string())
    }

    fn state_file_path(&self, session_id: SessionId) -> PathBuf {
        self.session_dir(session_id).join("state.yaml")
    }
}

fn io_error(e: std::io::Error) -> SessionStoreError {
    SessionStoreError::IoError(e.to_string())
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, state: &SessionState) -> Result<(), SessionStoreError> {
        fs::create_dir_all(self.session_dir(state.session_id))
            .await
            .map_err(io_error)?;

        let yaml = serde_yaml::to_string(state)
            .map_err(|e| SessionStoreError::SerializationFailed(e.to_string()))?;

        fs::write(self.state_file_path(state.session_id), yaml)
            .await
            .map_err(io_error)
    }

    async fn load(&self, session_id: SessionId) -> Result<SessionState, SessionStoreError> {
        let yaml = match fs::read_to_string(self.state_file_path(session_id)).await {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionStoreError::NotFound(session_id))
            }
            Err(e) => return Err(io_error(e)),
        };

        serde_yaml::from_str(&yaml).map_err(|e| SessionStoreError::DeserializationFailed(e.to_string()))
    }

    async fn exists(&self, session_id: SessionId) -> Result<bool, SessionStoreError> {
        fs::try_exists(self.state_file_path(session_id))
            .await
            .map_err(io_error)
    }

    async fn delete(&self, session_id: SessionId) -> Result<(), SessionStoreError> {
        match fs::remove_dir_all(self.session_dir(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}
