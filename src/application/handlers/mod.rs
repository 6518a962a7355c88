//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod session;

pub use session::{
    EndSessionCommand, EndSessionHandler, EndSessionResult, GetSessionStateHandler,
    GetSessionStateQuery, ProcessTurnCommand, ProcessTurnError, ProcessTurnHandler,
    ProcessTurnResult, SessionLocks, StartSessionCommand, StartSessionHandler, StartSessionResult,
};
