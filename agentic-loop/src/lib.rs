//! Resumable agentic orchestration loop.
//!
//! Each invocation receives the full prior state, one event and configuration,
//! and returns the next state delta plus outgoing events. Nothing is held in
//! memory between invocations, so a run can resume on any process after any
//! delay. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (tool selection, result
//!   validation, the run state machine). No I/O.
//! - **[`io`]**: Side effects (clock, config file, request/response streams,
//!   state file, workspace journal).
//!
//! Orchestration modules ([`dispatch`], [`start`], [`resume`], [`invoke`]) combine the two
//! to answer one request.

pub mod core;
pub mod dispatch;
pub mod error;
pub mod exit_codes;
pub mod invoke;
pub mod io;
pub mod logging;
pub mod resume;
pub mod start;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
