//! Deterministic, pure logic shared by the loop handlers.
//!
//! Core modules must be free of I/O side effects. Time and identifiers are
//! passed in by the caller so every function is reproducible in tests.

pub mod coerce;
pub mod config;
pub mod envelope;
pub mod events;
pub mod journal;
pub mod selection;
pub mod state_machine;
pub mod types;
pub mod validator;
