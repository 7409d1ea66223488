//! Run records and the run collection.
//!
//! These types are the persisted shape of the loop's state. They must stay
//! deterministic: the same snapshot always serializes to the same JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::config::{DEFAULT_MAX_REFRAMES, DEFAULT_MAX_STEPS};
use crate::error::LoopError;

/// Lifecycle status of a run. `Done` and `Escalated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Done,
    Escalated,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Done => "done",
            RunStatus::Escalated => "escalated",
        }
    }
}

/// Persisted state of one goal moving through the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub status: RunStatus,
    pub goal: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Current step (1-indexed, advances by exactly one).
    #[serde(default = "first_step")]
    pub step: u32,
    #[serde(default = "default_max_steps", alias = "max_loops")]
    pub max_steps: u32,
    #[serde(default)]
    pub reframes: u32,
    #[serde(default = "default_max_reframes")]
    pub max_reframes: u32,
    /// Step whose result is awaited; `None` once terminal.
    #[serde(default)]
    pub pending_step: Option<u32>,
    /// Tool whose result is awaited; `None` once terminal.
    #[serde(default)]
    pub pending_tool: Option<String>,
    #[serde(default)]
    pub pending_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_tool_command: Option<String>,
    /// Fields written by other collaborators, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn first_step() -> u32 {
    1
}

fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}

fn default_max_reframes() -> u32 {
    DEFAULT_MAX_REFRAMES
}

impl RunRecord {
    /// A freshly started run waiting on the result of step 1.
    pub fn start(
        goal: &str,
        tool: &str,
        tool_command: &str,
        max_steps: u32,
        max_reframes: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status: RunStatus::Running,
            goal: goal.to_string(),
            created_at: Some(now),
            updated_at: Some(now),
            step: 1,
            max_steps,
            reframes: 0,
            max_reframes,
            pending_step: Some(1),
            pending_tool: Some(tool.to_string()),
            pending_since: Some(now),
            last_tool_command: Some(tool_command.to_string()),
            extra: Map::new(),
        }
    }

    /// Step the run is blocked on. Falls back to `step` for records written
    /// without `pending_step`.
    pub fn awaited_step(&self) -> u32 {
        self.pending_step.unwrap_or(self.step)
    }

    pub fn awaited_tool(&self) -> &str {
        self.pending_tool.as_deref().unwrap_or_default()
    }

    /// Move to `next_step`, now waiting on `tool`.
    pub fn advance_to(&mut self, next_step: u32, tool: &str, tool_command: &str, now: DateTime<Utc>) {
        debug_assert_eq!(next_step, self.step + 1, "steps advance by exactly one");
        self.step = next_step;
        self.pending_step = Some(next_step);
        self.pending_tool = Some(tool.to_string());
        self.pending_since = Some(now);
        self.last_tool_command = Some(tool_command.to_string());
        self.updated_at = Some(now);
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.terminate(RunStatus::Done, now);
    }

    pub fn escalate(&mut self, now: DateTime<Utc>) {
        self.terminate(RunStatus::Escalated, now);
    }

    fn terminate(&mut self, status: RunStatus, now: DateTime<Utc>) {
        self.status = status;
        self.pending_step = None;
        self.pending_tool = None;
        self.updated_at = Some(now);
    }

    fn normalize(&mut self) {
        if self.max_steps == 0 {
            self.max_steps = DEFAULT_MAX_STEPS;
        }
        if self.max_reframes == 0 {
            self.max_reframes = DEFAULT_MAX_REFRAMES;
        }
    }
}

/// A slot in the run collection.
///
/// Entries that do not parse as a [`RunRecord`] are kept verbatim so that a
/// write-back never destroys data this crate does not understand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunEntry {
    Record(RunRecord),
    Opaque(Value),
}

/// The run collection: `run_id` → record, ordered by id for stable output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunTable(BTreeMap<String, RunEntry>);

impl RunTable {
    /// Parse the `runs` value of a state snapshot. Non-objects yield an empty table.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(raw)) = value else {
            return Self::default();
        };
        let entries = raw
            .iter()
            .map(|(id, entry)| {
                let parsed = match serde_json::from_value::<RunRecord>(entry.clone()) {
                    Ok(mut record) => {
                        record.normalize();
                        RunEntry::Record(record)
                    }
                    Err(_) => RunEntry::Opaque(entry.clone()),
                };
                (id.clone(), parsed)
            })
            .collect();
        Self(entries)
    }

    pub fn get(&self, run_id: &str) -> Option<&RunRecord> {
        match self.0.get(run_id)? {
            RunEntry::Record(record) => Some(record),
            RunEntry::Opaque(_) => None,
        }
    }

    pub fn get_mut(&mut self, run_id: &str) -> Option<&mut RunRecord> {
        match self.0.get_mut(run_id)? {
            RunEntry::Record(record) => Some(record),
            RunEntry::Opaque(_) => None,
        }
    }

    pub fn insert(&mut self, run_id: impl Into<String>, record: RunRecord) {
        self.0.insert(run_id.into(), RunEntry::Record(record));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.records()
            .filter(|(_, record)| record.status == RunStatus::Running)
            .count()
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &RunRecord)> {
        self.0.iter().filter_map(|(id, entry)| match entry {
            RunEntry::Record(record) => Some((id.as_str(), record)),
            RunEntry::Opaque(_) => None,
        })
    }

    pub fn to_value(&self) -> Result<Value, LoopError> {
        serde_json::to_value(self).map_err(LoopError::encode("runs"))
    }
}

/// Typed view of the state snapshot handed to one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopState {
    pub runs: RunTable,
    pub last_run_id: Option<String>,
}

impl LoopState {
    pub fn from_snapshot(snapshot: &Map<String, Value>) -> Self {
        Self {
            runs: RunTable::from_value(snapshot.get("runs")),
            last_run_id: snapshot
                .get("last_run_id")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixed_now, running_record};
    use serde_json::json;

    #[test]
    fn start_record_waits_on_step_one() {
        let record = RunRecord::start("goal", "fabric", "handle", 20, 2, fixed_now());
        assert_eq!(record.status, RunStatus::Running);
        assert_eq!(record.step, 1);
        assert_eq!(record.pending_step, Some(1));
        assert_eq!(record.pending_tool.as_deref(), Some("fabric"));
        assert_eq!(record.reframes, 0);
    }

    #[test]
    fn terminal_transitions_clear_pending_fields() {
        let mut record = running_record("goal", 2, "fabric");
        record.finish(fixed_now());
        assert_eq!(record.status, RunStatus::Done);
        assert_eq!(record.pending_step, None);
        assert_eq!(record.pending_tool, None);
        assert_eq!(record.step, 2);

        let mut record = running_record("goal", 1, "jina-reader");
        record.escalate(fixed_now());
        assert_eq!(record.status, RunStatus::Escalated);
        assert!(record.status.is_terminal());
        assert_eq!(record.pending_step, None);
    }

    #[test]
    fn records_without_optional_fields_get_defaults() {
        let table = RunTable::from_value(Some(&json!({
            "r1": {"status": "running", "goal": "g", "pending_step": 1, "pending_tool": "fabric"},
            "r2": {"status": "running", "goal": "g", "max_loops": 0}
        })));
        let r1 = table.get("r1").expect("r1");
        assert_eq!(r1.step, 1);
        assert_eq!(r1.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(r1.max_reframes, DEFAULT_MAX_REFRAMES);
        assert_eq!(table.get("r2").expect("r2").max_steps, DEFAULT_MAX_STEPS);
    }

    /// Unparseable entries are invisible to lookups but survive a write-back.
    #[test]
    fn opaque_entries_round_trip_untouched() {
        let raw = json!({
            "weird": {"status": "paused", "goal": "g"},
            "scalar": 5
        });
        let table = RunTable::from_value(Some(&raw));
        assert_eq!(table.len(), 2);
        assert!(table.get("weird").is_none());
        assert_eq!(table.running_count(), 0);
        assert_eq!(table.to_value().expect("encode"), raw);
    }

    #[test]
    fn unknown_record_fields_are_preserved() {
        let raw = json!({
            "r1": {
                "status": "done",
                "goal": "g",
                "step": 2,
                "max_steps": 20,
                "reframes": 0,
                "max_reframes": 2,
                "pending_step": null,
                "pending_tool": null,
                "created_at": null,
                "updated_at": null,
                "pending_since": null,
                "last_tool_command": "handle",
                "owner": "ops"
            }
        });
        let table = RunTable::from_value(Some(&raw));
        let record = table.get("r1").expect("r1");
        assert_eq!(record.extra.get("owner"), Some(&json!("ops")));
        assert_eq!(table.to_value().expect("encode"), raw);
    }

    #[test]
    fn snapshot_without_runs_is_empty() {
        let state = LoopState::from_snapshot(&Map::new());
        assert!(state.runs.is_empty());
        assert_eq!(state.last_run_id, None);

        let mut snapshot = Map::new();
        snapshot.insert("runs".to_string(), json!("corrupt"));
        assert!(LoopState::from_snapshot(&snapshot).runs.is_empty());
    }
}
