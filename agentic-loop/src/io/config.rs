//! Loading the optional TOML configuration file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::config::LoopConfig;

/// Load config from a TOML file.
///
/// If the file is missing, returns `LoopConfig::default()`.
pub fn load_config(path: &Path) -> Result<LoopConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing; using defaults");
        let cfg = LoopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LoopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    debug!(path = %path.display(), max_steps = cfg.max_steps, "config loaded");
    Ok(cfg)
}

/// Resolve the base configuration for an invocation.
pub fn resolve_config(path: Option<&Path>) -> Result<LoopConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(LoopConfig::default()),
    }
}

/// Render `cfg` as TOML with a trailing newline.
pub fn render_config(cfg: &LoopConfig) -> Result<String> {
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    Ok(buf)
}
