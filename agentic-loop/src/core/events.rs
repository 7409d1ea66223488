//! Outbound events emitted by the loop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::envelope::Event;
use crate::error::LoopError;

pub const TOOL_REQUEST: &str = "agentic.tool_request";
pub const AGENT_COMPLETED: &str = "agent.completed";
pub const AGENT_ESCALATED: &str = "agent.escalated";

/// Ask the host to invoke `tool` for `step` of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolRequest {
    pub run_id: String,
    pub step: u32,
    pub tool: String,
    pub tool_command: String,
    pub tool_payload: Map<String, Value>,
    pub requested_at: DateTime<Utc>,
}

impl ToolRequest {
    /// Stable per (run, step), so at-least-once delivery can drop duplicates.
    pub fn dedupe_key(&self) -> String {
        format!("agentic:run:{}:step:{}:request", self.run_id, self.step)
    }

    pub fn into_event(self) -> Result<Event, LoopError> {
        let dedupe_key = self.dedupe_key();
        Ok(Event {
            event_type: TOOL_REQUEST.to_string(),
            payload: serde_json::to_value(&self).map_err(LoopError::encode("tool request"))?,
            dedupe_key: Some(dedupe_key),
        })
    }
}

/// Final report for a run that reached `done`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub run_id: String,
    pub goal: String,
    pub outcome: String,
    pub steps_taken: u32,
    pub artifacts: Vec<String>,
}

impl Completion {
    pub fn into_event(self) -> Result<Event, LoopError> {
        Ok(Event {
            event_type: AGENT_COMPLETED.to_string(),
            payload: serde_json::to_value(&self).map_err(LoopError::encode("completion"))?,
            dedupe_key: None,
        })
    }
}

/// Why a run was escalated, with the detail each reason carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EscalationReason {
    /// Result came from a different tool than the one the run waits on.
    PendingToolMismatch {
        expected_tool: String,
        actual_tool: String,
    },
    /// Tool reported a non-`ok` status. `error` is the tool's own detail, of
    /// any JSON type.
    ToolError {
        step: u32,
        tool: String,
        error: Value,
    },
    MaxStepsExceeded { step: u32, max_steps: u32 },
    /// The default flow picked a follow-up tool outside `allowed_plugins`.
    FollowupToolNotAllowed { tool: String },
}

impl EscalationReason {
    pub fn code(&self) -> &'static str {
        match self {
            EscalationReason::PendingToolMismatch { .. } => "pending_tool_mismatch",
            EscalationReason::ToolError { .. } => "tool_error",
            EscalationReason::MaxStepsExceeded { .. } => "max_steps_exceeded",
            EscalationReason::FollowupToolNotAllowed { .. } => "followup_tool_not_allowed",
        }
    }

    /// Human-readable log line for the escalation of `run_id`.
    pub fn describe(&self, run_id: &str) -> String {
        match self {
            EscalationReason::PendingToolMismatch {
                expected_tool,
                actual_tool,
            } => format!(
                "run {run_id} escalated: expected_tool={expected_tool} actual_tool={actual_tool}"
            ),
            EscalationReason::ToolError { step, .. } => {
                format!("run {run_id} escalated from tool error at step={step}")
            }
            EscalationReason::MaxStepsExceeded { step, max_steps } => {
                format!("run {run_id} escalated: max_steps exceeded (step={step} max_steps={max_steps})")
            }
            EscalationReason::FollowupToolNotAllowed { tool } => {
                format!("run {run_id} escalated: follow-up tool '{tool}' not allowed")
            }
        }
    }
}

/// `agent.escalated` payload: the run id plus the flattened reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Escalation {
    pub run_id: String,
    #[serde(flatten)]
    pub reason: EscalationReason,
}

impl Escalation {
    pub fn into_event(self) -> Result<Event, LoopError> {
        Ok(Event {
            event_type: AGENT_ESCALATED.to_string(),
            payload: serde_json::to_value(&self).map_err(LoopError::encode("escalation"))?,
            dedupe_key: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixed_now;
    use serde_json::json;

    #[test]
    fn tool_request_event_carries_dedupe_key() {
        let mut tool_payload = Map::new();
        tool_payload.insert("url".to_string(), json!("https://example.com"));
        let event = ToolRequest {
            run_id: "run-1".to_string(),
            step: 3,
            tool: "jina-reader".to_string(),
            tool_command: "handle".to_string(),
            tool_payload,
            requested_at: fixed_now(),
        }
        .into_event()
        .expect("event");

        assert_eq!(event.event_type, TOOL_REQUEST);
        assert_eq!(event.dedupe_key.as_deref(), Some("agentic:run:run-1:step:3:request"));
        assert_eq!(event.payload["step"], json!(3));
        assert_eq!(event.payload["tool_payload"], json!({"url": "https://example.com"}));
        assert_eq!(event.payload["requested_at"], json!("2026-01-02T03:04:05Z"));
    }

    #[test]
    fn escalation_payload_flattens_reason_detail() {
        let event = Escalation {
            run_id: "run-1".to_string(),
            reason: EscalationReason::PendingToolMismatch {
                expected_tool: "fabric".to_string(),
                actual_tool: "jina-reader".to_string(),
            },
        }
        .into_event()
        .expect("event");

        assert_eq!(event.event_type, AGENT_ESCALATED);
        assert_eq!(event.dedupe_key, None);
        assert_eq!(
            event.payload,
            json!({
                "run_id": "run-1",
                "reason": "pending_tool_mismatch",
                "expected_tool": "fabric",
                "actual_tool": "jina-reader"
            })
        );
    }

    #[test]
    fn reason_codes_match_serialized_tags() {
        let reasons = [
            EscalationReason::ToolError {
                step: 1,
                tool: "fabric".to_string(),
                error: json!("boom"),
            },
            EscalationReason::MaxStepsExceeded {
                step: 5,
                max_steps: 5,
            },
            EscalationReason::FollowupToolNotAllowed {
                tool: "fabric".to_string(),
            },
        ];
        for reason in reasons {
            let encoded = serde_json::to_value(&reason).expect("encode");
            assert_eq!(encoded["reason"], json!(reason.code()));
        }
    }
}
