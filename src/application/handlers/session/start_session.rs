//! StartSessionHandler - Command handler for opening a new sales conversation.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode, SessionId, Timestamp};
use crate::domain::sales::SessionState;
use crate::ports::SessionStore;

/// Command to start a new session.
#[derive(Debug, Clone)]
pub struct StartSessionCommand {
    pub session_id: SessionId,
    pub started_at: Timestamp,
}

impl StartSessionCommand {
    /// A fresh session starting now.
    pub fn now() -> Self {
        Self {
            session_id: SessionId::new(),
            started_at: Timestamp::now(),
        }
    }
}

/// Result of successful session start.
#[derive(Debug, Clone)]
pub struct StartSessionResult {
    pub state: SessionState,
}

/// Handler for starting sessions.
pub struct StartSessionHandler {
    store: Arc<dyn SessionStore>,
}

impl StartSessionHandler {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, cmd: StartSessionCommand) -> Result<StartSessionResult, DomainError> {
        if self.store.exists(cmd.session_id).await? {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Session already exists: {}", cmd.session_id),
            ));
        }

        let state = SessionState::new(cmd.session_id, cmd.started_at);
        self.store.save(&state).await?;

        tracing::info!(session_id = %state.session_id, stage = %state.stage, "Session started");
        Ok(StartSessionResult { state })
    }
}
