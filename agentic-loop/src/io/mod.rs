//! Host-side effects: clock, config file, request I/O, state file, workspace journal.

pub mod config;
pub mod environment;
pub mod request;
pub mod state_store;
pub mod workspace;
