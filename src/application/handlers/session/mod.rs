//! Session command and query handlers.

mod end_session;
mod get_session_state;
mod process_turn;
mod start_session;

pub use end_session::{EndSessionCommand, EndSessionHandler, EndSessionResult};
pub use get_session_state::{GetSessionStateHandler, GetSessionStateQuery};
pub use process_turn::{
    ProcessTurnCommand, ProcessTurnError, ProcessTurnHandler, ProcessTurnResult, SessionLocks,
};
pub use start_session::{StartSessionCommand, StartSessionHandler, StartSessionResult};
