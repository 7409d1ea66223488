//! JSON state file used by the local `invoke --state-file` driver.
//!
//! The file holds the host's state snapshot. After each invocation the
//! response's `state_updates` are merged key by key (top level only) and the
//! file is replaced atomically.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};
use tracing::debug;

/// Load the snapshot from `path`. A missing file is an empty snapshot.
pub fn load_snapshot(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        debug!(path = %path.display(), "state file missing; starting empty");
        return Ok(Map::new());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read state {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse state {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("state {} must hold a JSON object", path.display())),
    }
}

/// Overwrite top-level keys of `snapshot` with `updates`.
pub fn merge_updates(snapshot: &mut Map<String, Value>, updates: &Map<String, Value>) {
    for (key, value) in updates {
        snapshot.insert(key.clone(), value.clone());
    }
}

/// Atomically write the snapshot (temp file + rename).
pub fn write_snapshot(path: &Path, snapshot: &Map<String, Value>) -> Result<()> {
    debug!(path = %path.display(), keys = snapshot.len(), "writing state");
    let mut buf = serde_json::to_string_pretty(snapshot).context("serialize state json")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Merge `updates` into the file at `path`. No-op when `updates` is empty.
pub fn apply_updates(path: &Path, updates: &Map<String, Value>) -> Result<()> {
    if updates.is_empty() {
        return Ok(());
    }
    let mut snapshot = load_snapshot(path)?;
    merge_updates(&mut snapshot, updates);
    write_snapshot(path, &snapshot)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace state {}", path.display()))?;
    Ok(())
}
