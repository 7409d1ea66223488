//! Resumable agentic loop.
//!
//! Reads one request envelope (stdin or `--input`), writes one response
//! envelope to stdout. With `--state-file` the binary also acts as a minimal
//! host, threading state between invocations through a JSON file.

use std::path::PathBuf;

use agentic_loop::exit_codes;
use agentic_loop::invoke::{InvokeOptions, invoke};
use agentic_loop::io::config::{load_config, render_config, resolve_config};
use agentic_loop::io::environment::SystemEnvironment;
use agentic_loop::io::request::{read_input, write_response};
use agentic_loop::logging;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "agentic-loop",
    version,
    about = "Resumable goal -> tool call -> tool result orchestration loop"
)]
struct Cli {
    /// TOML file with base configuration (missing file = defaults).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one request envelope.
    Invoke {
        /// Read the request from this file instead of stdin (`-` = stdin).
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Supply state from, and merge `state_updates` into, this JSON file.
        #[arg(long, value_name = "PATH")]
        state_file: Option<PathBuf>,

        /// Exit with a non-zero code when the response status is `error`.
        #[arg(long)]
        fail_on_error: bool,
    },
    /// Validate a TOML config file and print the resolved configuration.
    CheckConfig {
        path: PathBuf,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Invoke {
            input,
            state_file,
            fail_on_error,
        } => cmd_invoke(cli.config, input, state_file, fail_on_error),
        Command::CheckConfig { path } => cmd_check_config(path),
    }
}

fn cmd_invoke(
    config: Option<PathBuf>,
    input: Option<PathBuf>,
    state_file: Option<PathBuf>,
    fail_on_error: bool,
) -> Result<i32> {
    let base = resolve_config(config.as_deref())?;
    let raw = read_input(input.as_deref())?;
    let options = InvokeOptions { state_file };
    let response = invoke(&raw, &base, &options, &SystemEnvironment)?;
    write_response(std::io::stdout().lock(), &response)?;

    if fail_on_error && !response.is_ok() {
        return Ok(exit_codes::REJECTED);
    }
    Ok(exit_codes::OK)
}

fn cmd_check_config(path: PathBuf) -> Result<i32> {
    let cfg = load_config(&path)?;
    print!("{}", render_config(&cfg)?);
    Ok(exit_codes::OK)
}
