//! Routing of one request envelope to its handler.
//!
//! `dispatch` is the single entry point the binary (or any embedding host)
//! calls. It never panics and never returns `Err`: every rejection is folded
//! into an error [`Response`].

use chrono::SecondsFormat;
use tracing::{debug, info_span, warn};

use crate::core::config::LoopConfig;
use crate::core::envelope::{LogEntry, Request, Response};
use crate::core::journal::JournalEntry;
use crate::core::types::LoopState;
use crate::error::LoopError;
use crate::io::environment::Environment;
use crate::resume::handle_tool_result;
use crate::start::handle_start;

/// Top-level `command` of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Poll,
    Handle,
    Health,
}

impl Command {
    pub fn parse(raw: &str) -> Result<Self, LoopError> {
        match raw.trim() {
            "poll" => Ok(Command::Poll),
            "handle" => Ok(Command::Handle),
            "health" => Ok(Command::Health),
            other => Err(LoopError::UnknownCommand(other.to_string())),
        }
    }
}

/// Inbound event `type` accepted by `handle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    ApiTrigger,
    ToolResult,
}

impl EventKind {
    pub fn parse(raw: &str) -> Result<Self, LoopError> {
        match raw {
            "agentic.start" => Ok(EventKind::Start),
            "api.trigger" => Ok(EventKind::ApiTrigger),
            "agentic.tool_result" => Ok(EventKind::ToolResult),
            other => Err(LoopError::UnsupportedEvent(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Start => "agentic.start",
            EventKind::ApiTrigger => "api.trigger",
            EventKind::ToolResult => "agentic.tool_result",
        }
    }
}

/// Response for the host plus the journal entries the invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Handled {
    pub response: Response,
    pub journal: Vec<JournalEntry>,
}

impl Handled {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            journal: Vec::new(),
        }
    }

    pub fn with_journal(response: Response, journal: Vec<JournalEntry>) -> Self {
        Self { response, journal }
    }
}

impl From<LoopError> for Handled {
    fn from(err: LoopError) -> Self {
        Self::new(Response::from(err))
    }
}

/// Parse raw request bytes into an envelope.
///
/// Bytes that are not valid UTF-8 JSON are an [`LoopError::InvalidRequest`]
/// like any other syntax error.
pub fn parse_request(raw: &[u8]) -> Result<Request, LoopError> {
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|err| LoopError::InvalidRequest(err.to_string()))?;
    if !value.is_object() {
        return Err(LoopError::InvalidRequest(
            "expected a JSON object at the top level".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|err| LoopError::InvalidRequest(err.to_string()))
}

/// Handle one request against `base` configuration.
///
/// The envelope's `config` mapping is overlaid on `base` before routing.
pub fn dispatch<E: Environment>(request: &Request, base: &LoopConfig, env: &E) -> Handled {
    let span = info_span!(
        "dispatch",
        command = %request.command,
        job_id = request.job_id.as_deref().unwrap_or_default()
    );
    let _guard = span.enter();

    let config = base.overlay(&request.config_map());
    let state = LoopState::from_snapshot(&request.state_map());

    let outcome = Command::parse(&request.command).and_then(|command| match command {
        Command::Poll => Ok(Handled::new(poll(&state, env))),
        Command::Health => Ok(Handled::new(health(&state, &config, env))),
        Command::Handle => handle(request, &state, &config, env),
    });

    match outcome {
        Ok(handled) => handled,
        Err(err) => {
            warn!(error = %err, "request rejected");
            Handled::from(err)
        }
    }
}

/// Parse `raw` and dispatch it. Unparseable input becomes an error response.
pub fn handle_raw<E: Environment>(raw: &[u8], base: &LoopConfig, env: &E) -> Handled {
    match parse_request(raw) {
        Ok(request) => dispatch(&request, base, env),
        Err(err) => Handled::from(err),
    }
}

fn handle<E: Environment>(
    request: &Request,
    state: &LoopState,
    config: &LoopConfig,
    env: &E,
) -> Result<Handled, LoopError> {
    let kind = EventKind::parse(request.event_type())?;
    debug!(event = kind.as_str(), "routing event");
    let payload = request.event_payload();
    match kind {
        EventKind::Start | EventKind::ApiTrigger => handle_start(kind, &payload, state, config, env),
        EventKind::ToolResult => handle_tool_result(&payload, state, config, env),
    }
}

fn poll<E: Environment>(state: &LoopState, env: &E) -> Response {
    let running = state.runs.running_count();
    Response::ok()
        .with_update("last_poll", timestamp(env))
        .with_log(LogEntry::info(format!(
            "agentic-loop poll noop; running_runs={running}"
        )))
}

fn health<E: Environment>(state: &LoopState, config: &LoopConfig, env: &E) -> Response {
    Response::ok()
        .with_update("last_health_check", timestamp(env))
        .with_update("configured_max_steps", config.max_steps)
        .with_log(LogEntry::info(format!(
            "healthy; tracked_runs={} running_runs={} max_steps={}",
            state.runs.len(),
            state.runs.running_count(),
            config.max_steps
        )))
}

fn timestamp<E: Environment>(env: &E) -> String {
    env.now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
