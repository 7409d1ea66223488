//! Starting a new run from `agentic.start` / `api.trigger`.
//!
//! A start validates the payload, picks the first tool, records a run waiting
//! on step 1 and emits exactly one tool request. Nothing is recorded when any
//! check fails.

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::core::coerce::{non_blank_str, object, positive_int};
use crate::core::config::LoopConfig;
use crate::core::envelope::{LogEntry, Response};
use crate::core::events::ToolRequest;
use crate::core::journal::{JournalEntry, Phase};
use crate::core::selection::select_first_tool;
use crate::core::types::{LoopState, RunRecord};
use crate::dispatch::{EventKind, Handled};
use crate::error::LoopError;
use crate::io::environment::Environment;

/// Validated start payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub goal: String,
    pub run_id: Option<String>,
    pub context: Map<String, Value>,
}

impl StartRequest {
    /// Payload must be an object, then `goal` must be a non-empty string.
    pub fn parse(kind: EventKind, payload: &Value) -> Result<Self, LoopError> {
        let Value::Object(payload) = payload else {
            return Err(LoopError::PayloadNotObject {
                event_type: kind.as_str().to_string(),
            });
        };
        let goal = non_blank_str(payload.get("goal"))
            .ok_or_else(|| LoopError::MissingGoal {
                event_type: kind.as_str().to_string(),
            })?;

        Ok(Self {
            goal: goal.to_string(),
            run_id: non_blank_str(payload.get("run_id")).map(str::to_string),
            context: object(payload.get("context")).cloned().unwrap_or_default(),
        })
    }
}

/// Create a run and request its first tool.
pub fn handle_start<E: Environment>(
    kind: EventKind,
    payload: &Value,
    state: &LoopState,
    config: &LoopConfig,
    env: &E,
) -> Result<Handled, LoopError> {
    let start = StartRequest::parse(kind, payload)?;
    let run_id = start.run_id.clone().unwrap_or_else(|| env.new_run_id());
    let max_steps = positive_int(start.context.get("max_steps")).unwrap_or(config.max_steps);

    let choice = select_first_tool(&start.goal, &start.context, config);
    if !config.allows(&choice.tool) {
        return Err(LoopError::ToolNotAllowed {
            tool: choice.tool,
            allowed: config.allowed_plugins.clone(),
        });
    }
    debug!(run_id = %run_id, tool = %choice.tool, max_steps, "first tool selected");

    let now = env.now();
    let record = RunRecord::start(
        &start.goal,
        &choice.tool,
        &choice.command,
        max_steps,
        config.max_reframes,
        now,
    );
    let mut runs = state.runs.clone();
    runs.insert(run_id.clone(), record);

    let request = ToolRequest {
        run_id: run_id.clone(),
        step: 1,
        tool: choice.tool.clone(),
        tool_command: choice.command,
        tool_payload: choice.payload.clone(),
        requested_at: now,
    };

    let response = Response::ok()
        .with_event(request.into_event()?)
        .with_update("runs", runs.to_value()?)
        .with_update("last_run_id", run_id.clone())
        .with_log(LogEntry::info(format!("started run {run_id}")))
        .with_log(LogEntry::info(format!("step=1 pending_tool={}", choice.tool)));

    let journal = vec![
        JournalEntry::Initialized {
            run_id: run_id.clone(),
            goal: start.goal,
            context: start.context,
        },
        JournalEntry::Decision {
            phase: Phase::Frame,
            note: "Initialized run, definition of done, and first action.".to_string(),
        },
        JournalEntry::Planned {
            step: 1,
            tool: choice.tool,
            payload: choice.payload,
            rationale: "Start with highest-signal tool.",
        },
    ];

    info!(run_id = %run_id, "run started");
    Ok(Handled::with_journal(response, journal))
}
