//! Operator-facing run journal kept in the request's `workspace_dir`.
//!
//! Layout:
//!
//! ```text
//! <workspace_dir>/
//!   context.md     goal and start context (written once)
//!   memory.md      definition of done, learned facts, status (appended)
//!   plan.md        next action, or completion (overwritten)
//!   decisions.md   append-only decision log
//!   artifacts/
//! ```
//!
//! Journal failures never fail the invocation; they come back as `warn` logs.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use minijinja::{Environment, context};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::envelope::LogEntry;
use crate::core::journal::JournalEntry;

const CONTEXT_TEMPLATE: &str = include_str!("templates/context.md");
const MEMORY_TEMPLATE: &str = include_str!("templates/memory.md");
const PLAN_TEMPLATE: &str = include_str!("templates/plan.md");
const PLAN_DONE_TEMPLATE: &str = include_str!("templates/plan_done.md");
const DECISIONS_TEMPLATE: &str = include_str!("templates/decisions.md");

const CONTEXT_FILE: &str = "context.md";
const MEMORY_FILE: &str = "memory.md";
const PLAN_FILE: &str = "plan.md";
const DECISIONS_FILE: &str = "decisions.md";
const ARTIFACTS_DIR: &str = "artifacts";

/// Write `entries` into `dir`, returning one `warn` log per failed entry.
pub fn apply_journal(dir: &Path, entries: &[JournalEntry], now: DateTime<Utc>) -> Vec<LogEntry> {
    if entries.is_empty() {
        return Vec::new();
    }
    let workspace = match Workspace::new(dir, now) {
        Ok(workspace) => workspace,
        Err(err) => return vec![LogEntry::warn(format!("workspace journal: {err:#}"))],
    };
    entries
        .iter()
        .filter_map(|entry| match workspace.apply(entry) {
            Ok(()) => None,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "journal write failed");
                Some(LogEntry::warn(format!("workspace journal: {err:#}")))
            }
        })
        .collect()
}

struct Workspace {
    dir: PathBuf,
    env: Environment<'static>,
    timestamp: String,
}

impl Workspace {
    fn new(dir: &Path, now: DateTime<Utc>) -> Result<Self> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_template(CONTEXT_FILE, CONTEXT_TEMPLATE)
            .context("load context template")?;
        env.add_template(MEMORY_FILE, MEMORY_TEMPLATE)
            .context("load memory template")?;
        env.add_template(PLAN_FILE, PLAN_TEMPLATE)
            .context("load plan template")?;
        env.add_template("plan_done.md", PLAN_DONE_TEMPLATE)
            .context("load completed plan template")?;
        env.add_template(DECISIONS_FILE, DECISIONS_TEMPLATE)
            .context("load decisions template")?;
        Ok(Self {
            dir: dir.to_path_buf(),
            env,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    fn apply(&self, entry: &JournalEntry) -> Result<()> {
        match entry {
            JournalEntry::Initialized {
                run_id,
                goal,
                context,
            } => self.initialize(run_id, goal, context),
            JournalEntry::Observed {
                step,
                tool,
                summary,
                fact,
            } => {
                self.append(
                    DECISIONS_FILE,
                    &format!(
                        "\n## {}\n- tool: {tool}\n- step: {step}\n- summary: {summary}\n",
                        self.timestamp
                    ),
                )?;
                self.append(
                    MEMORY_FILE,
                    &format!("\n## Learned Fact ({})\n- {fact}\n", self.timestamp),
                )
            }
            JournalEntry::Planned {
                step,
                tool,
                payload,
                rationale,
            } => {
                let payload_json =
                    serde_json::to_string(payload).context("serialize planned payload")?;
                let rendered = self.render(
                    PLAN_FILE,
                    context! { step, tool, payload_json, rationale },
                )?;
                self.write(PLAN_FILE, &rendered)
            }
            JournalEntry::Completed { step } => {
                self.append(MEMORY_FILE, "\n## Status\n- [x] Goal completed.\n")?;
                let rendered = self.render("plan_done.md", context! { step })?;
                self.write(PLAN_FILE, &rendered)
            }
            JournalEntry::Decision { phase, note } => self.append(
                DECISIONS_FILE,
                &format!("\n## {} ({})\n- {note}\n", self.timestamp, phase.as_str()),
            ),
        }
    }

    fn initialize(&self, run_id: &str, goal: &str, start_context: &Map<String, Value>) -> Result<()> {
        debug!(dir = %self.dir.display(), run_id, "initializing workspace");
        let artifacts = self.dir.join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts)
            .with_context(|| format!("create directory {}", artifacts.display()))?;

        let context_json =
            serde_json::to_string_pretty(start_context).context("serialize start context")?;
        let rendered = self.render(CONTEXT_FILE, context! { goal, context_json })?;
        self.write(CONTEXT_FILE, &rendered)?;

        let rendered = self.render(MEMORY_FILE, context! { run_id })?;
        self.write(MEMORY_FILE, &rendered)?;

        let rendered = self.render(
            DECISIONS_FILE,
            context! { run_id, timestamp => self.timestamp.as_str() },
        )?;
        self.write(DECISIONS_FILE, &rendered)
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        template
            .render(ctx)
            .with_context(|| format!("render {name}"))
    }

    fn write(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.dir.join(name);
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create directory {}", self.dir.display()))?;
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    fn append(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.dir.join(name);
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create directory {}", self.dir.display()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("append {}", path.display()))
    }
}
