//! First-tool selection for new runs.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::coerce::{non_empty_str, object};
use crate::core::config::LoopConfig;

/// Tool that fetches a URL and returns its readable content.
pub const FETCH_TOOL: &str = "jina-reader";
/// General-purpose text-processing tool.
pub const TEXT_TOOL: &str = "fabric";

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s)]+").expect("url pattern is valid"));

/// Tool, sub-command and payload for one tool request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolChoice {
    pub tool: String,
    pub command: String,
    pub payload: Map<String, Value>,
}

/// Choose the first tool for `goal`.
///
/// Precedence: `context.tool` / `context.initial_tool`, then
/// `config.default_tool`, then a heuristic (a URL in the goal selects
/// [`FETCH_TOOL`], anything else [`TEXT_TOOL`]). Never fails.
pub fn select_first_tool(
    goal: &str,
    context: &Map<String, Value>,
    config: &LoopConfig,
) -> ToolChoice {
    let command = non_empty_str(context.get("tool_command"))
        .unwrap_or(&config.default_tool_command)
        .to_string();
    let mut payload = object(context.get("tool_payload"))
        .cloned()
        .unwrap_or_default();

    let explicit = non_empty_str(context.get("tool"))
        .or_else(|| non_empty_str(context.get("initial_tool")))
        .or_else(|| config.default_tool.as_deref().map(str::trim).filter(|t| !t.is_empty()));

    let tool = match explicit {
        Some(tool) => tool.to_string(),
        None if extract_first_url(goal).is_some() => FETCH_TOOL.to_string(),
        None => TEXT_TOOL.to_string(),
    };

    if tool == FETCH_TOOL && lacks(&payload, "url") {
        if let Some(url) = extract_first_url(goal) {
            payload.insert("url".to_string(), Value::String(url.to_string()));
        }
    }
    if tool == TEXT_TOOL && lacks(&payload, "text") && lacks(&payload, "prompt") {
        payload.insert("prompt".to_string(), Value::String(goal.to_string()));
    }

    ToolChoice {
        tool,
        command,
        payload,
    }
}

/// First `http://` or `https://` URL in `text`, ending at whitespace or `)`.
///
/// Later URLs are ignored.
pub fn extract_first_url(text: &str) -> Option<&str> {
    URL_RE.find(text).map(|m| m.as_str())
}

fn lacks(payload: &Map<String, Value>, key: &str) -> bool {
    payload.get(key).is_none_or(Value::is_null)
}
