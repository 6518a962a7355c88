//! Adapters - Implementations of port interfaces.
//!
//! - `storage` - In-memory and YAML-file session stores

pub mod storage;

pub use storage::{FileSessionStore, InMemorySessionStore};
