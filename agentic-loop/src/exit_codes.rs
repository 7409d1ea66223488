//! Stable exit codes for the `agentic-loop` binary.

/// A response was written (including error envelopes, unless `--fail-on-error`).
pub const OK: i32 = 0;
/// Host-side failure: unreadable input, invalid config file, state file I/O.
pub const INVALID: i32 = 1;
/// `invoke --fail-on-error` wrote an error envelope.
pub const REJECTED: i32 = 2;
