//! Session Store Port - Interface for persisting session state between turns.
//!
//! The engine itself never touches storage; the application layer loads a
//! session before a turn and saves the returned state after it.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, SessionId};
use crate::domain::sales::SessionState;

/// Errors that can occur during session store operations
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Failed to serialize session: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize session: {0}")]
    DeserializationFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<SessionStoreError> for DomainError {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::NotFound(id) => {
                DomainError::new(ErrorCode::SessionNotFound, format!("Session not found: {}", id))
                    .with_detail("session_id", id.to_string())
            }
            other => DomainError::new(ErrorCode::StorageError, other.to_string()),
        }
    }
}

/// Port for persisting and loading session state
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Save session state, replacing any previous version
    ///
    /// # Errors
    /// Returns `SessionStoreError` if save fails
    async fn save(&self, state: &SessionState) -> Result<(), SessionStoreError>;

    /// Load session state
    ///
    /// # Errors
    /// Returns `SessionStoreError::NotFound` if no state exists
    async fn load(&self, session_id: SessionId) -> Result<SessionState, SessionStoreError>;

    /// Check if state exists for a session
    async fn exists(&self, session_id: SessionId) -> Result<bool, SessionStoreError>;

    /// Delete the state for a session. Deleting a missing session is not an error.
    async fn delete(&self, session_id: SessionId) -> Result<(), SessionStoreError>;
}
