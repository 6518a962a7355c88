//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers (start, process turn, end) write session state; the
//! query handler reads it.

pub mod handlers;

pub use handlers::{
    EndSessionCommand, EndSessionHandler, EndSessionResult, GetSessionStateHandler,
    GetSessionStateQuery, ProcessTurnCommand, ProcessTurnError, ProcessTurnHandler,
    ProcessTurnResult, SessionLocks, StartSessionCommand, StartSessionHandler, StartSessionResult,
};
