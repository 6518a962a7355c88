//! ProcessTurn command handler.
//!
//! Loads the session, runs one comprehension signal through the turn
//! pipeline and persists the resulting state. Turns for the same session are
//! serialized through [`SessionLocks`]; different sessions run in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode, SessionId, Timestamp};
use crate::domain::sales::{ComprehensionSignal, Decision, SessionState, Stage, TurnPipeline};
use crate::ports::{SessionStore, SessionStoreError};

/// Command to process one turn of a conversation.
#[derive(Debug, Clone)]
pub struct ProcessTurnCommand {
    pub session_id: SessionId,
    pub signal: ComprehensionSignal,
    /// When the turn happened. Defaults to now.
    pub at: Option<Timestamp>,
}

impl ProcessTurnCommand {
    pub fn new(session_id: SessionId, signal: ComprehensionSignal) -> Self {
        Self {
            session_id,
            signal,
            at: None,
        }
    }

    /// Pins the turn's clock, for replay and tests.
    pub fn at(mut self, at: Timestamp) -> Self {
        self.at = Some(at);
        self
    }
}

/// Errors that can occur when processing a turn.
#[derive(Debug, Clone, Error)]
pub enum ProcessTurnError {
    /// No state stored for this session.
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Session is completed or abandoned and accepts no more turns.
    #[error("Session {0} is closed and cannot accept new turns")]
    SessionClosed(SessionId),

    /// Store failure while loading or saving.
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<SessionStoreError> for ProcessTurnError {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::NotFound(id) => ProcessTurnError::SessionNotFound(id),
            other => ProcessTurnError::StorageError(other.to_string()),
        }
    }
}

impl From<ProcessTurnError> for DomainError {
    fn from(err: ProcessTurnError) -> Self {
        let code = match &err {
            ProcessTurnError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            ProcessTurnError::SessionClosed(_) => ErrorCode::SessionClosed,
            ProcessTurnError::StorageError(_) => ErrorCode::StorageError,
        };
        DomainError::new(code, err.to_string())
    }
}

/// Result of processing a turn.
#[derive(Debug, Clone)]
pub struct ProcessTurnResult {
    /// The decision for the response layer.
    pub decision: Decision,
    /// Session state after the turn, already persisted.
    pub state: SessionState,
    /// `(from, to)` when the turn moved the conversation.
    pub stage_changed: Option<(Stage, Stage)>,
    /// Whether the turn ended the session.
    pub ended: bool,
}

/// Registry of per-session turn locks.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock guarding turns of `session_id`.
    pub async fn lock_for(&self, session_id: SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(session_id).or_default().clone()
    }

    /// Drops the lock entry for a finished session.
    pub async fn release(&self, session_id: SessionId) {
        self.locks.lock().await.remove(&session_id);
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

/// Handler for processing conversation turns.
pub struct ProcessTurnHandler {
    store: Arc<dyn SessionStore>,
    pipeline: Arc<TurnPipeline>,
    locks: Arc<SessionLocks>,
}

impl ProcessTurnHandler {
    pub fn new(store: Arc<dyn SessionStore>, pipeline: Arc<TurnPipeline>) -> Self {
        Self::with_locks(store, pipeline, Arc::new(SessionLocks::new()))
    }

    /// Shares a lock registry with other handlers touching the same sessions.
    pub fn with_locks(
        store: Arc<dyn SessionStore>,
        pipeline: Arc<TurnPipeline>,
        locks: Arc<SessionLocks>,
    ) -> Self {
        Self {
            store,
            pipeline,
            locks,
        }
    }

    pub async fn handle(&self, cmd: ProcessTurnCommand) -> Result<ProcessTurnResult, ProcessTurnError> {
        let lock = self.locks.lock_for(cmd.session_id).await;
        let _guard = lock.lock().await;

        // 1. Load state
        let state = self.store.load(cmd.session_id).await?;
        if state.is_closed() {
            return Err(ProcessTurnError::SessionClosed(cmd.session_id));
        }

        // 2. Run the turn
        let now = cmd.at.unwrap_or_else(Timestamp::now);
        let outcome = self.pipeline.run_turn(&state, &cmd.signal, now);

        // 3. Persist before answering
        self.store.save(&outcome.state).await?;

        if outcome.applied.ended {
            self.locks.release(cmd.session_id).await;
        }

        Ok(ProcessTurnResult {
            decision: outcome.decision,
            state: outcome.state,
            stage_changed: outcome.applied.stage_changed,
            ended: outcome.applied.ended,
        })
    }
}
