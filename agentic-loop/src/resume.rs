//! Continuing a run from an `agentic.tool_result` event.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::config::LoopConfig;
use crate::core::envelope::{LogEntry, Response};
use crate::core::events::{Escalation, EscalationReason};
use crate::core::journal::{JournalEntry, Phase};
use crate::core::state_machine::{self, Transition};
use crate::core::types::{LoopState, RunTable};
use crate::core::validator::{Correlation, ToolResult, correlate};
use crate::dispatch::Handled;
use crate::error::LoopError;
use crate::io::environment::Environment;

/// Longest summary or fact copied into the journal, in characters.
const JOURNAL_EXCERPT_CHARS: usize = 500;

const FOLLOW_UP_RATIONALE: &str = "Continue based on tool result.";

/// Validate, correlate, and apply one tool result.
pub fn handle_tool_result<E: Environment>(
    payload: &Value,
    state: &LoopState,
    config: &LoopConfig,
    env: &E,
) -> Result<Handled, LoopError> {
    let result = ToolResult::parse(payload)?;
    let run_id = result.run_id.as_str();
    debug!(run_id, step = result.step, tool = %result.tool, "tool result received");

    let mut runs = state.runs.clone();
    let Some(record) = runs.get_mut(run_id) else {
        warn!(run_id, "result for unknown run");
        return Ok(Handled::new(Response::ok().with_log(LogEntry::warn(format!(
            "unknown run_id={run_id}; ignoring result event"
        )))));
    };

    let transition = match correlate(record, &result)? {
        Correlation::Terminal(status) => {
            return Ok(Handled::new(Response::ok().with_log(LogEntry::info(format!(
                "run_id={run_id} already terminal ({}); ignoring",
                status.as_str()
            )))));
        }
        Correlation::Stale { pending_step } => {
            return Ok(Handled::new(Response::ok().with_log(LogEntry::info(format!(
                "stale result for run_id={run_id}, step={}; pending={pending_step}",
                result.step
            )))));
        }
        Correlation::ToolMismatch { expected, actual } => {
            let reason = EscalationReason::PendingToolMismatch {
                expected_tool: expected,
                actual_tool: actual,
            };
            state_machine::escalate(record, reason, env.now())
        }
        Correlation::Accepted => state_machine::advance(run_id, record, &result, config, env.now()),
    };

    let journal = match transition {
        Transition::Escalate(_) => Vec::new(),
        Transition::Advance(_) | Transition::Complete(_) => vec![observed(&result)],
    };
    respond(&result, runs, transition, journal)
}

fn respond(
    result: &ToolResult,
    runs: RunTable,
    transition: Transition,
    mut journal: Vec<JournalEntry>,
) -> Result<Handled, LoopError> {
    let run_id = result.run_id.clone();
    let response = Response::ok().with_update("runs", runs.to_value()?);

    let response = match transition {
        Transition::Advance(request) => {
            let message = format!(
                "run {run_id} advanced to step={} tool={}",
                request.step, request.tool
            );
            journal.push(JournalEntry::Planned {
                step: request.step,
                tool: request.tool.clone(),
                payload: request.tool_payload.clone(),
                rationale: FOLLOW_UP_RATIONALE,
            });
            journal.push(JournalEntry::Decision {
                phase: Phase::Plan,
                note: format!("Planned next action: {}", request.tool),
            });
            info!(run_id = %run_id, step = request.step, "run advanced");
            response
                .with_event(request.into_event()?)
                .with_log(LogEntry::info(message))
        }
        Transition::Complete(completion) => {
            let message = format!("run {run_id} completed in {} step(s)", completion.steps_taken);
            journal.push(JournalEntry::Completed {
                step: completion.steps_taken,
            });
            journal.push(JournalEntry::Decision {
                phase: Phase::Reflect,
                note: "Goal appears complete; emitting agent.completed.".to_string(),
            });
            info!(run_id = %run_id, steps = completion.steps_taken, "run completed");
            response
                .with_event(completion.into_event()?)
                .with_update("last_run_id", run_id)
                .with_log(LogEntry::info(message))
        }
        Transition::Escalate(reason) => {
            let message = reason.describe(&run_id);
            journal.push(JournalEntry::Decision {
                phase: Phase::Reflect,
                note: format!("Escalated: {}", reason.code()),
            });
            warn!(run_id = %run_id, reason = reason.code(), "run escalated");
            response
                .with_event(Escalation { run_id, reason }.into_event()?)
                .with_log(LogEntry::error(message))
        }
    };
    Ok(Handled::with_journal(response, journal))
}

fn observed(result: &ToolResult) -> JournalEntry {
    let summary = result.output.outcome().unwrap_or("Run completed.");
    let fact = result.output.source_text().unwrap_or(summary);
    JournalEntry::Observed {
        step: result.step,
        tool: result.tool.clone(),
        summary: shorten(summary, JOURNAL_EXCERPT_CHARS),
        fact: shorten(fact, JOURNAL_EXCERPT_CHARS),
    }
}

fn shorten(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
