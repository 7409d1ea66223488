//! Loop configuration and its lenient overlay from the request envelope.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::coerce::{non_empty_str, positive_int, string_list};

pub const DEFAULT_MAX_STEPS: u32 = 20;
pub const DEFAULT_MAX_REFRAMES: u32 = 2;
pub const DEFAULT_TOOL_COMMAND: &str = "handle";

/// Static configuration for the loop.
///
/// Missing fields default to the built-in values, so an empty TOML file or an
/// empty envelope `config` mapping is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Step cap for new runs (a start event's `context.max_steps` wins).
    #[serde(alias = "max_loops")]
    pub max_steps: u32,

    /// Reframe budget recorded on new runs; not enforced by the default flow.
    pub max_reframes: u32,

    /// First tool when the start event does not name one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_tool: Option<String>,

    /// Sub-command sent with every tool request unless the event overrides it.
    pub default_tool_command: String,

    /// Tools the loop may request. Empty allows every tool.
    pub allowed_plugins: Vec<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_reframes: DEFAULT_MAX_REFRAMES,
            default_tool: None,
            default_tool_command: DEFAULT_TOOL_COMMAND.to_string(),
            allowed_plugins: Vec::new(),
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        if self.max_reframes == 0 {
            return Err(anyhow!("max_reframes must be > 0"));
        }
        if self.default_tool_command.trim().is_empty() {
            return Err(anyhow!("default_tool_command must not be empty"));
        }
        if self
            .default_tool
            .as_deref()
            .is_some_and(|tool| tool.trim().is_empty())
        {
            return Err(anyhow!("default_tool must not be blank when set"));
        }
        if self.allowed_plugins.iter().any(|p| p.trim().is_empty()) {
            return Err(anyhow!("allowed_plugins must not contain blank entries"));
        }
        Ok(())
    }

    /// Apply the envelope's `config` mapping on top of `self`.
    ///
    /// Never fails: values of the wrong type or out of range are ignored and
    /// the current setting is kept.
    pub fn overlay(&self, raw: &Map<String, Value>) -> Self {
        let mut cfg = self.clone();
        if let Some(v) = positive_int(raw.get("max_steps")).or(positive_int(raw.get("max_loops"))) {
            cfg.max_steps = v;
        }
        if let Some(v) = positive_int(raw.get("max_reframes")) {
            cfg.max_reframes = v;
        }
        if let Some(v) = non_empty_str(raw.get("default_tool")) {
            cfg.default_tool = Some(v.to_string());
        }
        if let Some(v) = non_empty_str(raw.get("default_tool_command")) {
            cfg.default_tool_command = v.to_string();
        }
        if let Some(list) = string_list(raw.get("allowed_plugins")) {
            cfg.allowed_plugins = list;
        }
        cfg
    }

    pub fn allows(&self, tool: &str) -> bool {
        self.allowed_plugins.is_empty() || self.allowed_plugins.iter().any(|p| p.trim() == tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn overlay_on_empty_mapping_keeps_defaults() {
        let cfg = LoopConfig::default().overlay(&Map::new());
        assert_eq!(cfg, LoopConfig::default());
    }

    #[test]
    fn overlay_reads_known_keys() {
        let cfg = LoopConfig::default().overlay(&raw(json!({
            "max_steps": "5",
            "max_reframes": 4,
            "default_tool": " fabric ",
            "default_tool_command": "run",
            "allowed_plugins": ["fabric", "jina-reader"]
        })));
        assert_eq!(cfg.max_steps, 5);
        assert_eq!(cfg.max_reframes, 4);
        assert_eq!(cfg.default_tool.as_deref(), Some("fabric"));
        assert_eq!(cfg.default_tool_command, "run");
        assert_eq!(cfg.allowed_plugins, vec!["fabric", "jina-reader"]);
    }

    #[test]
    fn overlay_accepts_max_loops_alias() {
        let cfg = LoopConfig::default().overlay(&raw(json!({"max_loops": 3})));
        assert_eq!(cfg.max_steps, 3);
    }

    #[test]
    fn overlay_ignores_invalid_values() {
        let base = LoopConfig {
            max_steps: 7,
            ..LoopConfig::default()
        };
        let cfg = base.overlay(&raw(json!({
            "max_steps": 0,
            "max_reframes": "many",
            "default_tool": "",
            "allowed_plugins": "fabric"
        })));
        assert_eq!(cfg, base);
    }

    #[test]
    fn empty_allow_list_allows_everything() {
        let cfg = LoopConfig::default();
        assert!(cfg.allows("anything"));

        let restricted = LoopConfig {
            allowed_plugins: vec!["fabric".to_string()],
            ..LoopConfig::default()
        };
        assert!(restricted.allows("fabric"));
        assert!(!restricted.allows("jina-reader"));
    }

    #[test]
    fn validate_rejects_zero_budget() {
        let cfg = LoopConfig {
            max_steps: 0,
            ..LoopConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(LoopConfig::default().validate().is_ok());
    }
}
