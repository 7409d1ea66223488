//! Request and response envelopes exchanged with the host.
//!
//! The request side is deliberately loose (`config`, `state` and `event` are
//! raw JSON) because the host may send anything; typed views are produced once
//! at the boundary by the dispatcher. The response side is strict.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One invocation as delivered by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// `poll`, `handle` or `health`.
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub config: Value,
    /// Full state snapshot; `runs` holds the run collection.
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub event: Value,
    /// Host job identifier, used only for tracing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Directory for the operator-facing run journal, if the host provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<String>,
}

impl Request {
    pub fn config_map(&self) -> Map<String, Value> {
        as_map(&self.config)
    }

    pub fn state_map(&self) -> Map<String, Value> {
        as_map(&self.state)
    }

    /// Event `type`, or an empty string when absent or not a string.
    pub fn event_type(&self) -> &str {
        self.event
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Event `payload` as sent (may be any JSON value).
    pub fn event_payload(&self) -> Value {
        self.event.get("payload").cloned().unwrap_or(Value::Null)
    }

    pub fn workspace_dir(&self) -> Option<&str> {
        self.workspace_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
    }
}

/// Non-object values are treated as empty mappings.
fn as_map(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A product log line returned to the host (distinct from `tracing` output).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Warn,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            message: message.into(),
        }
    }
}

/// An outgoing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
    #[serde(default)]
    pub events: Vec<Event>,
    /// Keys to merge into the persisted state.
    #[serde(default)]
    pub state_updates: Map<String, Value>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            status: ResponseStatus::Ok,
            error: None,
            retry: None,
            events: Vec::new(),
            state_updates: Map::new(),
            logs: Vec::new(),
        }
    }

    /// Error response; the message is also echoed as an `error` log line.
    pub fn error(message: impl Into<String>, retry: bool) -> Self {
        let message = message.into();
        Self {
            status: ResponseStatus::Error,
            error: Some(message.clone()),
            retry: Some(retry),
            events: Vec::new(),
            state_updates: Map::new(),
            logs: vec![LogEntry::error(message)],
        }
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_update(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.state_updates.insert(key.to_string(), value.into());
        self
    }

    pub fn with_log(mut self, entry: LogEntry) -> Self {
        self.logs.push(entry);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}
