//! Journal entries describing what an invocation decided.
//!
//! The core never touches the filesystem. It records intent here and the host
//! layer (`io::workspace`) renders entries into the run's workspace directory.

use serde_json::{Map, Value};

/// Phase label attached to a decision-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Frame,
    Plan,
    Reflect,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Frame => "frame",
            Phase::Plan => "plan",
            Phase::Reflect => "reflect",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JournalEntry {
    /// A run was created; seed the workspace.
    Initialized {
        run_id: String,
        goal: String,
        context: Map<String, Value>,
    },
    /// An accepted tool result was observed.
    Observed {
        step: u32,
        tool: String,
        summary: String,
        fact: String,
    },
    /// The next action was chosen.
    Planned {
        step: u32,
        tool: String,
        payload: Map<String, Value>,
        rationale: &'static str,
    },
    /// The goal is complete through `step`.
    Completed { step: u32 },
    Decision { phase: Phase, note: String },
}
