//! Request-level failures.
//!
//! A `LoopError` always means the request was rejected before any run was
//! touched. Run-level failures (tool errors, exhausted budgets) are not errors:
//! they are escalations and travel as normal `agent.escalated` events.

use thiserror::Error;

use crate::core::envelope::Response;

#[derive(Debug, Error)]
pub enum LoopError {
    /// Top-level request was not valid JSON or not an envelope object.
    #[error("invalid request JSON: {0}")]
    InvalidRequest(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error(
        "unsupported event type '{0}'; expected agentic.start, api.trigger, or agentic.tool_result"
    )]
    UnsupportedEvent(String),

    #[error("{event_type} payload must be an object")]
    PayloadNotObject { event_type: String },

    #[error("{event_type} requires non-empty payload.goal")]
    MissingGoal { event_type: String },

    /// A required tool result field is absent or blank.
    #[error("agentic.tool_result missing payload.{field}")]
    MissingField { field: &'static str },

    #[error("agentic.tool_result missing or invalid payload.step")]
    InvalidStep,

    /// The first tool of a new run is outside `allowed_plugins`.
    #[error("tool '{tool}' is not allowed; allowed_plugins={allowed:?}")]
    ToolNotAllowed { tool: String, allowed: Vec<String> },

    /// Result for a step ahead of the one the run is waiting on.
    #[error(
        "protocol violation: step mismatch run_id={run_id} pending_step={pending_step} got={got}"
    )]
    StepMismatch {
        run_id: String,
        pending_step: u32,
        got: u32,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl LoopError {
    /// Whether the host should redeliver the same request later.
    ///
    /// Every rejection is deterministic for a given snapshot, so retrying the
    /// identical request can never succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LoopError::InvalidRequest(_)
            | LoopError::UnknownCommand(_)
            | LoopError::UnsupportedEvent(_)
            | LoopError::PayloadNotObject { .. }
            | LoopError::MissingGoal { .. }
            | LoopError::MissingField { .. }
            | LoopError::InvalidStep
            | LoopError::ToolNotAllowed { .. }
            | LoopError::StepMismatch { .. }
            | LoopError::Encode { .. } => false,
        }
    }

    pub(crate) fn encode(what: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| LoopError::Encode { what, source }
    }
}

impl From<LoopError> for Response {
    fn from(err: LoopError) -> Self {
        Response::error(err.to_string(), err.is_retryable())
    }
}
