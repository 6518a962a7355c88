//! EndSessionHandler - Command handler for abandoning a conversation early.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode, SessionId};
use crate::domain::sales::SessionState;
use crate::ports::SessionStore;

use super::SessionLocks;

/// Command to end (abandon) a session.
#[derive(Debug, Clone)]
pub struct EndSessionCommand {
    pub session_id: SessionId,
}

/// Result of ending a session.
#[derive(Debug, Clone)]
pub struct EndSessionResult {
    pub state: SessionState,
}

/// Handler for ending sessions.
///
/// Shares [`SessionLocks`] with the turn handler so an abandonment never
/// interleaves with a turn of the same session.
pub struct EndSessionHandler {
    store: Arc<dyn SessionStore>,
    locks: Arc<SessionLocks>,
}

impl EndSessionHandler {
    pub fn new(store: Arc<dyn SessionStore>, locks: Arc<SessionLocks>) -> Self {
        Self { store, locks }
    }

    pub async fn handle(&self, cmd: EndSessionCommand) -> Result<EndSessionResult, DomainError> {
        let lock = self.locks.lock_for(cmd.session_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.abandon(cmd.session_id).await
        };
        self.locks.release(cmd.session_id).await;
        result
    }

    async fn abandon(&self, session_id: SessionId) -> Result<EndSessionResult, DomainError> {
        let mut state = self.store.load(session_id).await?;

        state.abandon().map_err(|_| {
            DomainError::new(
                ErrorCode::SessionClosed,
                format!("Session {} is already closed", session_id),
            )
        })?;
        self.store.save(&state).await?;

        tracing::info!(
            session_id = %state.session_id,
            stage = %state.stage,
            turns = state.turn_number,
            "Session abandoned"
        );
        Ok(EndSessionResult { state })
    }
}
