//! GetSessionStateHandler - Query handler for reading a session's state.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, SessionId};
use crate::domain::sales::SessionState;
use crate::ports::SessionStore;

/// Query to retrieve a session's state.
#[derive(Debug, Clone)]
pub struct GetSessionStateQuery {
    pub session_id: SessionId,
}

/// Handler for retrieving session state.
pub struct GetSessionStateHandler {
    store: Arc<dyn SessionStore>,
}

impl GetSessionStateHandler {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, query: GetSessionStateQuery) -> Result<SessionState, DomainError> {
        Ok(self.store.load(query.session_id).await?)
    }
}
