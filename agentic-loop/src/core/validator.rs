//! Structural and correlation checks for `agentic.tool_result` events.
//!
//! Parsing turns the loose payload into a [`ToolResult`] once; correlation then
//! classifies the result against the run it names. Only a
//! [`Correlation::Accepted`] result may drive the state machine.
//!
//! Correlation fields are compared exactly. Output text is forwarded as the
//! tool produced it; whitespace only decides whether a field counts as blank.

use serde_json::{Map, Value};

use crate::core::coerce::{exact_str, non_blank_str, positive_int};
use crate::core::types::{RunRecord, RunStatus};
use crate::error::LoopError;

/// The `result` field of a tool result, by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Structured(Map<String, Value>),
    Text(String),
    /// Absent, null, or a JSON type no extraction applies to.
    Other(Value),
}

impl ToolOutput {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(map)) => ToolOutput::Structured(map.clone()),
            Some(Value::String(s)) => ToolOutput::Text(s.clone()),
            Some(other) => ToolOutput::Other(other.clone()),
            None => ToolOutput::Other(Value::Null),
        }
    }

    /// Content to hand to a follow-up tool: `text`, then `excerpt`.
    pub fn source_text(&self) -> Option<&str> {
        self.pick(&["text", "excerpt"])
    }

    /// Final answer of a run: `result`, then `summary`.
    pub fn outcome(&self) -> Option<&str> {
        self.pick(&["result", "summary"])
    }

    /// Paths of files the tool produced.
    pub fn artifacts(&self) -> Vec<String> {
        let ToolOutput::Structured(map) = self else {
            return Vec::new();
        };
        let mut paths: Vec<String> = Vec::new();
        for key in ["artifact_path", "output_path"] {
            match non_blank_str(map.get(key)) {
                Some(path) if !paths.iter().any(|p| p == path) => paths.push(path.to_string()),
                _ => {}
            }
        }
        paths
    }

    fn pick(&self, keys: &[&str]) -> Option<&str> {
        match self {
            ToolOutput::Structured(map) => keys.iter().find_map(|key| non_blank_str(map.get(*key))),
            ToolOutput::Text(text) => Some(text.as_str()).filter(|t| !t.trim().is_empty()),
            ToolOutput::Other(_) => None,
        }
    }
}

/// A well-formed tool result.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub run_id: String,
    pub tool: String,
    pub step: u32,
    pub status: String,
    pub output: ToolOutput,
    /// Error detail exactly as the tool sent it; `null` and `""` are absent.
    pub error: Option<Value>,
}

impl ToolResult {
    /// Validate required fields in order: `run_id`, `tool`, `step`, `status`.
    pub fn parse(payload: &Value) -> Result<Self, LoopError> {
        let Value::Object(payload) = payload else {
            return Err(LoopError::PayloadNotObject {
                event_type: "agentic.tool_result".to_string(),
            });
        };
        let run_id =
            exact_str(payload.get("run_id")).ok_or(LoopError::MissingField { field: "run_id" })?;
        let tool = exact_str(payload.get("tool")).ok_or(LoopError::MissingField { field: "tool" })?;
        let step = positive_int(payload.get("step")).ok_or(LoopError::InvalidStep)?;
        let status =
            exact_str(payload.get("status")).ok_or(LoopError::MissingField { field: "status" })?;

        Ok(Self {
            run_id: run_id.to_string(),
            tool: tool.to_string(),
            step,
            status: status.to_string(),
            output: ToolOutput::from_value(payload.get("result")),
            error: payload
                .get("error")
                .filter(|error| !error.is_null() && error.as_str() != Some(""))
                .cloned(),
        })
    }

    pub fn succeeded(&self) -> bool {
        self.status == "ok"
    }
}

/// How a parsed result relates to the run it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    /// Run already finished; nothing left to do.
    Terminal(RunStatus),
    /// Result for a step the run has already moved past.
    Stale { pending_step: u32 },
    /// Right step, wrong tool.
    ToolMismatch { expected: String, actual: String },
    /// Right step and tool; the state machine may proceed.
    Accepted,
}

/// Classify `result` against `run`, the record stored under its `run_id`.
///
/// A result for a step ahead of the pending one is a protocol violation and
/// returns an error; every other outcome is a [`Correlation`].
pub fn correlate(run: &RunRecord, result: &ToolResult) -> Result<Correlation, LoopError> {
    if run.status.is_terminal() {
        return Ok(Correlation::Terminal(run.status));
    }

    let pending_step = run.awaited_step();
    if result.step < pending_step {
        return Ok(Correlation::Stale { pending_step });
    }
    if result.step != pending_step {
        return Err(LoopError::StepMismatch {
            run_id: result.run_id.clone(),
            pending_step,
            got: result.step,
        });
    }

    if result.tool != run.awaited_tool() {
        return Ok(Correlation::ToolMismatch {
            expected: run.awaited_tool().to_string(),
            actual: result.tool.clone(),
        });
    }
    Ok(Correlation::Accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::running_record;
    use serde_json::json;

    fn result(run_id: &str, tool: &str, step: u32) -> ToolResult {
        ToolResult {
            run_id: run_id.to_string(),
            tool: tool.to_string(),
            step,
            status: "ok".to_string(),
            output: ToolOutput::Other(Value::Null),
            error: None,
        }
    }

    #[test]
    fn parse_reads_all_fields() {
        let parsed = ToolResult::parse(&json!({
            "run_id": "r1",
            "tool": "jina-reader",
            "step": "1",
            "status": "ok",
            "result": {"text": "hello"},
            "error": ""
        }))
        .expect("parse");
        assert_eq!(parsed.run_id, "r1");
        assert_eq!(parsed.step, 1);
        assert!(parsed.succeeded());
        assert_eq!(parsed.output.source_text(), Some("hello"));
        assert_eq!(parsed.error, None);
    }

    /// Validation order: the first missing field is the one reported.
    #[test]
    fn parse_reports_first_missing_field() {
        let err = ToolResult::parse(&json!({"step": 0})).expect_err("invalid");
        assert!(matches!(err, LoopError::MissingField { field: "run_id" }));

        let err = ToolResult::parse(&json!({"run_id": "r", "step": 1})).expect_err("invalid");
        assert!(matches!(err, LoopError::MissingField { field: "tool" }));

        let err =
            ToolResult::parse(&json!({"run_id": "r", "tool": "t", "step": 0})).expect_err("invalid");
        assert!(matches!(err, LoopError::InvalidStep));

        let err = ToolResult::parse(&json!({"run_id": "r", "tool": "t", "step": 1}))
            .expect_err("invalid");
        assert!(matches!(err, LoopError::MissingField { field: "status" }));
    }

    #[test]
    fn parse_rejects_non_object_payload() {
        let err = ToolResult::parse(&json!("text")).expect_err("invalid");
        assert_eq!(err.to_string(), "agentic.tool_result payload must be an object");
    }

    #[test]
    fn output_extraction_prefers_documented_keys() {
        let output = ToolOutput::from_value(Some(&json!({
            "excerpt": "short",
            "summary": "sum",
            "artifact_path": "/tmp/a.md",
            "output_path": "/tmp/b.md"
        })));
        assert_eq!(output.source_text(), Some("short"));
        assert_eq!(output.outcome(), Some("sum"));
        assert_eq!(output.artifacts(), vec!["/tmp/a.md", "/tmp/b.md"]);

        let text = ToolOutput::from_value(Some(&json!("done text")));
        assert_eq!(text.outcome(), Some("done text"));
        assert_eq!(text.source_text(), Some("done text"));
        assert!(text.artifacts().is_empty());

        assert_eq!(ToolOutput::from_value(Some(&json!(42))).outcome(), None);
        assert_eq!(ToolOutput::from_value(None).source_text(), None);
    }

    #[test]
    fn terminal_run_is_benign() {
        let mut record = running_record("g", 2, "fabric");
        record.finish(crate::test_support::fixed_now());
        assert_eq!(
            correlate(&record, &result("r1", "fabric", 2)).expect("correlate"),
            Correlation::Terminal(RunStatus::Done)
        );
    }

    #[test]
    fn earlier_step_is_stale() {
        let run = running_record("g", 2, "fabric");
        assert_eq!(
            correlate(&run, &result("r1", "jina-reader", 1)).expect("correlate"),
            Correlation::Stale { pending_step: 2 }
        );
    }

    #[test]
    fn later_step_is_protocol_violation() {
        let run = running_record("g", 2, "fabric");
        let err = correlate(&run, &result("r1", "fabric", 3)).expect_err("violation");
        assert!(matches!(
            err,
            LoopError::StepMismatch {
                pending_step: 2,
                got: 3,
                ..
            }
        ));
    }

    #[test]
    fn wrong_tool_on_current_step_is_mismatch() {
        let run = running_record("g", 1, "jina-reader");
        assert_eq!(
            correlate(&run, &result("r1", "fabric", 1)).expect("correlate"),
            Correlation::ToolMismatch {
                expected: "jina-reader".to_string(),
                actual: "fabric".to_string(),
            }
        );
    }

    #[test]
    fn matching_step_and_tool_is_accepted() {
        let run = running_record("g", 1, "jina-reader");
        assert_eq!(
            correlate(&run, &result("r1", "jina-reader", 1)).expect("correlate"),
            Correlation::Accepted
        );
    }

    /// Padding is part of the value: `" jina-reader "` is a different tool.
    #[test]
    fn padded_tool_is_mismatch() {
        let payload = json!({"run_id": "r1", "tool": " jina-reader ", "step": 1, "status": "ok"});
        let parsed = ToolResult::parse(&payload).expect("parse");
        assert_eq!(parsed.tool, " jina-reader ");
        let run = running_record("g", 1, "jina-reader");
        assert_eq!(
            correlate(&run, &parsed).expect("correlate"),
            Correlation::ToolMismatch {
                expected: "jina-reader".to_string(),
                actual: " jina-reader ".to_string(),
            }
        );
    }

    #[test]
    fn padded_status_is_not_success() {
        let payload = json!({"run_id": "r1", "tool": "fabric", "step": 1, "status": " ok "});
        let parsed = ToolResult::parse(&payload).expect("parse");
        assert_eq!(parsed.status, " ok ");
        assert!(!parsed.succeeded());

        let payload = json!({"run_id": "r1", "tool": "fabric", "step": 1, "status": " "});
        let blank = ToolResult::parse(&payload).expect("whitespace is a value");
        assert!(!blank.succeeded());
    }

    #[test]
    fn output_text_is_not_trimmed() {
        let output = ToolOutput::from_value(Some(&json!({"text": "  indented\n\n", "result": " r "})));
        assert_eq!(output.source_text(), Some("  indented\n\n"));
        assert_eq!(output.outcome(), Some(" r "));

        let blank = ToolOutput::from_value(Some(&json!({"text": " \n", "excerpt": "fallback"})));
        assert_eq!(blank.source_text(), Some("fallback"));
        assert_eq!(ToolOutput::from_value(Some(&json!("\n\t"))).outcome(), None);
    }

    #[test]
    fn structured_error_detail_is_kept() {
        let parsed = ToolResult::parse(&json!({
            "run_id": "r1", "tool": "fabric", "step": 1, "status": "error",
            "error": {"code": 503, "message": "upstream unavailable"}
        }))
        .expect("parse");
        assert_eq!(
            parsed.error,
            Some(json!({"code": 503, "message": "upstream unavailable"}))
        );

        let payload = json!({"run_id": "r1", "tool": "fabric", "step": 1, "status": "error", "error": null});
        let null = ToolResult::parse(&payload).expect("parse");
        assert_eq!(null.error, None);
    }
}
