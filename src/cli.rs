//! CLI surface and request validation.
//!
//! clap handles the raw parse (unknown commands, unknown flags, missing
//! values and non-integer options all exit 2); [`parse_run_request`] layers
//! the semantic checks on top and produces a validated [`RunRequest`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::error::{AgentError, Result};
use crate::core::types::RunRequest;

/// Bounds for `--max-steps`.
const MAX_STEPS_RANGE: std::ops::RangeInclusive<u32> = 1..=1000;

#[derive(Debug, Parser)]
#[command(name = "agent", version, about = "Sandboxed deterministic agent-run harness")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute one deterministic run against a workspace.
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Free-form task description (mutually exclusive with --plan-file).
    #[arg(long)]
    pub task: Option<String>,

    /// Plan file to load, relative to the workspace (mutually exclusive with --task).
    #[arg(long)]
    pub plan_file: Option<PathBuf>,

    /// Workspace root; defaults to the current directory.
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Pipeline step budget (1..=1000).
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// Lower the default log level to debug.
    #[arg(long)]
    pub verbose: bool,
}

/// Validate raw flags into a run request.
pub fn parse_run_request(args: RunArgs) -> Result<RunRequest> {
    if args.task.is_none() && args.plan_file.is_none() {
        return Err(AgentError::input(
            "missing_required_flag",
            "Must provide either --task or --plan-file",
        )
        .with_hint("Usage: agent run --task \"...\" | --plan-file <path>"));
    }
    if args.task.is_some() && args.plan_file.is_some() {
        return Err(AgentError::input(
            "conflicting_flags",
            "Cannot provide both --task and --plan-file",
        ));
    }
    if args.task.as_deref().is_some_and(|task| task.trim().is_empty()) {
        return Err(AgentError::input("empty_task", "Task description cannot be empty."));
    }

    let max_steps = match args.max_steps {
        None => RunRequest::default().max_steps,
        Some(steps) if MAX_STEPS_RANGE.contains(&steps) => steps,
        Some(_) => {
            return Err(AgentError::input("bounds_error", "--max-steps out of bounds")
                .with_hint("Must be between 1 and 1000."));
        }
    };

    let working_directory = match args.cwd {
        Some(cwd) => {
            if !cwd.is_dir() {
                return Err(AgentError::input(
                    "invalid_path",
                    "Working directory does not exist or is not a directory",
                ));
            }
            cwd.canonicalize().map_err(|_| {
                AgentError::input("invalid_path", "Failed to canonicalize working directory")
            })?
        }
        None => std::env::current_dir().map_err(|_| {
            AgentError::input("invalid_path", "Failed to resolve current directory")
        })?,
    };

    Ok(RunRequest {
        task_description: args.task,
        plan_file: args.plan_file,
        working_directory,
        max_steps,
        verbose: args.verbose,
    })
}
