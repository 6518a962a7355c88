//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, enums, errors)
//! - `sales` - Stage catalog, comprehension signals, session state and the decision engine

pub mod foundation;
pub mod sales;
