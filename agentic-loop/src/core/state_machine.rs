//! Run transitions driven by accepted tool results.
//!
//! ```text
//! running ──▶ running      (fetch result → follow-up request, bounded by max_steps)
//!    │
//!    ├──────▶ done         (any other tool result)
//!    └──────▶ escalated    (tool error, budget exhausted, disallowed follow-up, tool mismatch)
//! ```
//!
//! `done` and `escalated` have no outgoing edges.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::config::LoopConfig;
use crate::core::events::{Completion, EscalationReason, ToolRequest};
use crate::core::selection::{FETCH_TOOL, TEXT_TOOL};
use crate::core::types::RunRecord;
use crate::core::validator::ToolResult;

/// Instruction sent to the text tool after a page has been fetched.
pub const CRITIQUE_PROMPT: &str =
    "Write a constructive two-paragraph critique of the supplied webpage content.";

const UNKNOWN_TOOL_ERROR: &str = "unknown tool error";

/// What an accepted result did to its run.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Advance(ToolRequest),
    Complete(Completion),
    Escalate(EscalationReason),
}

/// Apply an accepted `result` to `record`.
///
/// The caller must have correlated the result first: the run is `running`,
/// and `result.step` / `result.tool` match what the run is waiting on.
pub fn advance(
    run_id: &str,
    record: &mut RunRecord,
    result: &ToolResult,
    config: &LoopConfig,
    now: DateTime<Utc>,
) -> Transition {
    if !result.succeeded() {
        let error = result
            .error
            .clone()
            .unwrap_or_else(|| Value::String(UNKNOWN_TOOL_ERROR.to_string()));
        return escalate(
            record,
            EscalationReason::ToolError {
                step: result.step,
                tool: result.tool.clone(),
                error,
            },
            now,
        );
    }

    if result.step >= record.max_steps {
        return escalate(
            record,
            EscalationReason::MaxStepsExceeded {
                step: result.step,
                max_steps: record.max_steps,
            },
            now,
        );
    }

    if result.tool == FETCH_TOOL {
        return follow_up(run_id, record, result, config, now);
    }

    record.finish(now);
    let outcome = result
        .output
        .outcome()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Run {run_id} completed at step {}", result.step));
    debug!(run_id, step = result.step, "run completed");
    Transition::Complete(Completion {
        run_id: run_id.to_string(),
        goal: record.goal.clone(),
        outcome,
        steps_taken: result.step,
        artifacts: result.output.artifacts(),
    })
}

/// Move `record` to `escalated` for `reason`.
pub fn escalate(record: &mut RunRecord, reason: EscalationReason, now: DateTime<Utc>) -> Transition {
    debug!(reason = reason.code(), step = record.step, "run escalated");
    record.escalate(now);
    Transition::Escalate(reason)
}

fn follow_up(
    run_id: &str,
    record: &mut RunRecord,
    result: &ToolResult,
    config: &LoopConfig,
    now: DateTime<Utc>,
) -> Transition {
    if !config.allows(TEXT_TOOL) {
        return escalate(
            record,
            EscalationReason::FollowupToolNotAllowed {
                tool: TEXT_TOOL.to_string(),
            },
            now,
        );
    }

    let mut tool_payload = Map::new();
    tool_payload.insert("prompt".to_string(), Value::String(CRITIQUE_PROMPT.to_string()));
    if let Some(text) = result.output.source_text() {
        tool_payload.insert("text".to_string(), Value::String(text.to_string()));
    }

    let next_step = result.step + 1;
    record.advance_to(next_step, TEXT_TOOL, &config.default_tool_command, now);
    debug!(run_id, step = next_step, tool = TEXT_TOOL, "run advanced");
    Transition::Advance(ToolRequest {
        run_id: run_id.to_string(),
        step: next_step,
        tool: TEXT_TOOL.to_string(),
        tool_command: config.default_tool_command.clone(),
        tool_payload,
        requested_at: now,
    })
}
