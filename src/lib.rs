//! Sally Sells - Decision engine for guided sales conversations
//!
//! This crate decides, turn by turn, how a guided NEPQ sales conversation
//! moves through its stages. Given the session state and one comprehension
//! signal per turn, it returns exactly one decision and the updated state.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
