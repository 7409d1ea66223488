//! One full host-side invocation: parse, dispatch, journal, persist.
//!
//! This is what `agentic-loop invoke` runs. Everything above [`dispatch`] is a
//! local stand-in for the gateway: it optionally supplies the state snapshot
//! from a file, renders the workspace journal, and merges the state delta back.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::core::config::LoopConfig;
use crate::core::envelope::Response;
use crate::dispatch::{Handled, dispatch, parse_request};
use crate::io::environment::Environment;
use crate::io::state_store::{apply_updates, load_snapshot};
use crate::io::workspace::apply_journal;

#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// JSON file supplying the snapshot when the request has no `state`
    /// object, and receiving the merged `state_updates` afterwards.
    pub state_file: Option<PathBuf>,
}

/// Answer the raw request bytes.
///
/// Protocol failures come back as an error [`Response`]; `Err` is reserved for
/// host-side failures such as an unreadable or unwritable state file.
pub fn invoke<E: Environment>(
    raw: &[u8],
    base: &LoopConfig,
    options: &InvokeOptions,
    env: &E,
) -> Result<Response> {
    let mut request = match parse_request(raw) {
        Ok(request) => request,
        Err(err) => return Ok(Handled::from(err).response),
    };

    let needs_snapshot = !request.state.is_object();
    if let Some(path) = options.state_file.as_deref().filter(|_| needs_snapshot) {
        debug!(path = %path.display(), "loading state snapshot from file");
        request.state = Value::Object(load_snapshot(path)?);
    }

    let Handled {
        mut response,
        journal,
    } = dispatch(&request, base, env);

    if let Some(dir) = request.workspace_dir() {
        let warnings = apply_journal(Path::new(dir), &journal, env.now());
        response.logs.extend(warnings);
    }

    if let Some(path) = options.state_file.as_deref() {
        apply_updates(path, &response.state_updates)?;
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::envelope::ResponseStatus;
    use crate::core::types::{RunStatus, RunTable};
    use crate::test_support::{FixedEnvironment, scratch_dir};
    use serde_json::json;
    use std::fs;

    fn handle(event: Value) -> Vec<u8> {
        json!({"command": "handle", "event": event}).to_string().into_bytes()
    }

    /// Two invocations against the same state file carry a run from start to
    /// its follow-up request.
    #[test]
    fn state_file_threads_runs_across_invocations() {
        let temp = scratch_dir();
        let options = InvokeOptions {
            state_file: Some(temp.path().join("state.json")),
        };
        let env = FixedEnvironment::new();

        let started = invoke(
            &handle(json!({"type": "agentic.start", "payload": {"goal": "read https://example.com"}})),
            &LoopConfig::default(),
            &options,
            &env,
        )
        .expect("start");
        assert!(started.is_ok());

        let resumed = invoke(
            &handle(json!({
                "type": "agentic.tool_result",
                "payload": {"run_id": "run-1", "tool": "jina-reader", "step": 1, "status": "ok", "result": {"text": "body"}}
            })),
            &LoopConfig::default(),
            &options,
            &env,
        )
        .expect("resume");
        assert_eq!(resumed.events[0].payload["step"], json!(2));

        let snapshot = load_snapshot(temp.path().join("state.json").as_path()).expect("load");
        assert_eq!(snapshot.get("last_run_id"), Some(&json!("run-1")));
        let runs = RunTable::from_value(snapshot.get("runs"));
        let record = runs.get("run-1").expect("run-1");
        assert_eq!(record.step, 2);
        assert_eq!(record.status, RunStatus::Running);
    }

    #[test]
    fn rejected_requests_leave_state_file_alone() {
        let temp = scratch_dir();
        let path = temp.path().join("state.json");
        let options = InvokeOptions {
            state_file: Some(path.clone()),
        };
        let response = invoke(
            &handle(json!({"type": "agentic.start", "payload": {}})),
            &LoopConfig::default(),
            &options,
            &FixedEnvironment::new(),
        )
        .expect("invoke");
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(!path.exists());
    }

    #[test]
    fn malformed_input_is_an_error_envelope() {
        let response = invoke(
            b"not json",
            &LoopConfig::default(),
            &InvokeOptions::default(),
            &FixedEnvironment::new(),
        )
        .expect("invoke");
        assert_eq!(response.retry, Some(false));
    }

    #[test]
    fn workspace_journal_is_rendered_when_requested() {
        let temp = scratch_dir();
        let dir = temp.path().join("ws");
        let raw = json!({
            "command": "handle",
            "workspace_dir": dir.to_string_lossy(),
            "event": {"type": "agentic.start", "payload": {"goal": "write a poem"}}
        })
        .to_string();
        let response = invoke(
            raw.as_bytes(),
            &LoopConfig::default(),
            &InvokeOptions::default(),
            &FixedEnvironment::new(),
        )
        .expect("invoke");
        assert_eq!(response.logs.len(), 2);
        let plan = fs::read_to_string(dir.join("plan.md")).expect("plan");
        assert!(plan.contains("- tool: `fabric`"));
        let decisions = fs::read_to_string(dir.join("decisions.md")).expect("decisions");
        assert!(decisions.contains("(frame)\n- Initialized run, definition of done, and first action.\n"));
    }
}
