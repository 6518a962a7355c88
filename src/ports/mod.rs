//! Ports - Interfaces between the application layer and infrastructure.
//!
//! Ports are defined as async traits; adapters in `crate::adapters`
//! implement them.

mod session_store;

pub use session_store::{SessionStore, SessionStoreError};
