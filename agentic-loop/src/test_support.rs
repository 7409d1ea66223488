//! Test-only helpers for building deterministic requests, runs, and hosts.

use std::cell::Cell;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::core::config::{DEFAULT_MAX_REFRAMES, DEFAULT_MAX_STEPS};
use crate::core::envelope::Request;
use crate::core::types::{RunRecord, RunTable};
use crate::io::environment::Environment;

/// The instant every test clock reports: 2026-01-02T03:04:05Z.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5)
        .single()
        .expect("valid fixed timestamp")
}

/// Pinned clock with sequential run ids `run-1`, `run-2`, ...
#[derive(Debug, Default)]
pub struct FixedEnvironment {
    issued: Cell<u32>,
}

impl FixedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Environment for FixedEnvironment {
    fn now(&self) -> DateTime<Utc> {
        fixed_now()
    }

    fn new_run_id(&self) -> String {
        let next = self.issued.get() + 1;
        self.issued.set(next);
        format!("run-{next}")
    }
}

/// A running record waiting on `tool` at `step`.
pub fn running_record(goal: &str, step: u32, tool: &str) -> RunRecord {
    let mut record = RunRecord::start(
        goal,
        tool,
        "handle",
        DEFAULT_MAX_STEPS,
        DEFAULT_MAX_REFRAMES,
        fixed_now(),
    );
    record.step = step;
    record.pending_step = Some(step);
    record
}

pub fn table_with(run_id: &str, record: RunRecord) -> RunTable {
    let mut table = RunTable::default();
    table.insert(run_id, record);
    table
}

/// `handle` request carrying an `agentic.start` event.
pub fn start_request(payload: Value) -> Request {
    Request {
        command: "handle".to_string(),
        event: json!({"type": "agentic.start", "payload": payload}),
        ..Request::default()
    }
}

/// `handle` request carrying an `agentic.tool_result` event against `state`.
pub fn tool_result_request(state: Value, payload: Value) -> Request {
    Request {
        command: "handle".to_string(),
        state,
        event: json!({"type": "agentic.tool_result", "payload": payload}),
        ..Request::default()
    }
}

/// Fresh scratch directory for workspace and state-file tests.
pub fn scratch_dir() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}
