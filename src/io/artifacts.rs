//! Append-only per-run JSON-lines event log.
//!
//! Each run journals to `<canonical_workspace>/.agent_runs/<run_id>.jsonl`,
//! one JSON object per line with the envelope
//! `{ ts_unix_ms, event, run_id, payload }`. Every call re-resolves the log
//! path, so the writer owns no durable state beyond the filesystem.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use serde_json::json;

use crate::core::error::{AgentError, Result};
use crate::core::types::{RunRequest, RunStatus, RunStep};
use crate::policy::weak_canonicalize;

/// Default artifact directory under the workspace root.
pub const DEFAULT_ARTIFACT_SUBDIR: &str = ".agent_runs";

/// Journals run events to the per-run append-only log.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    workspace_root: PathBuf,
    artifact_subdir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self::with_subdir(workspace_root, DEFAULT_ARTIFACT_SUBDIR)
    }

    pub fn with_subdir(
        workspace_root: impl Into<PathBuf>,
        artifact_subdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            artifact_subdir: artifact_subdir.into(),
        }
    }

    /// Resolve the log path for `run_id`, creating the artifact directory.
    pub fn run_log_path(&self, run_id: &str) -> Result<PathBuf> {
        if run_id.is_empty() {
            return Err(AgentError::input("invalid_run_id", "Run ID cannot be empty."));
        }
        if !self.workspace_root.exists() {
            return Err(AgentError::input(
                "invalid_workspace_root",
                format!(
                    "Workspace root does not exist: {}",
                    self.workspace_root.display()
                ),
            ));
        }
        if !self.workspace_root.is_dir() {
            return Err(AgentError::input(
                "invalid_workspace_root",
                format!(
                    "Workspace root is not a directory: {}",
                    self.workspace_root.display()
                ),
            ));
        }

        let canonical_root = weak_canonicalize(&self.workspace_root).map_err(|_| {
            AgentError::input(
                "invalid_workspace_root",
                format!(
                    "Unable to resolve workspace root: {}",
                    self.workspace_root.display()
                ),
            )
        })?;

        let artifacts_dir = canonical_root.join(&self.artifact_subdir);
        std::fs::create_dir_all(&artifacts_dir).map_err(|_| {
            AgentError::internal(
                "artifact_dir_create_failed",
                format!(
                    "Unable to create artifacts directory: {}",
                    artifacts_dir.display()
                ),
            )
        })?;

        Ok(artifacts_dir.join(format!("{run_id}.jsonl")))
    }

    /// Append one pre-serialized JSON value as a single line.
    pub fn append_event(&self, run_id: &str, event_json: &str) -> Result<PathBuf> {
        let run_path = self.run_log_path(run_id)?;

        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&run_path)
            .map_err(|err| {
                AgentError::internal(
                    "artifact_open_failed",
                    format!("Unable to open artifact file {}: {err}", run_path.display()),
                )
            })?;

        let write_failed = |err: std::io::Error| {
            AgentError::internal(
                "artifact_write_failed",
                format!("Unable to write artifact event {}: {err}", run_path.display()),
            )
        };
        writeln!(out, "{event_json}").map_err(write_failed)?;
        out.flush().map_err(write_failed)?;

        Ok(run_path)
    }

    pub fn write_request(&self, run_id: &str, request: &RunRequest) -> Result<PathBuf> {
        let payload = json!({
            "task_description": request.task_description.clone().unwrap_or_default(),
            "plan_file": request
                .plan_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "working_directory": request.working_directory.display().to_string(),
            "max_steps": request.max_steps,
            "verbose": request.verbose,
        });
        self.append_event(run_id, &envelope(run_id, "request", payload).to_string())
    }

    pub fn write_step(&self, run_id: &str, step: &RunStep) -> Result<PathBuf> {
        let payload = serde_json::to_value(step).map_err(|err| {
            AgentError::internal(
                "artifact_write_failed",
                format!("Unable to serialize step event: {err}"),
            )
        })?;
        self.append_event(run_id, &envelope(run_id, "step", payload).to_string())
    }

    pub fn write_final(
        &self,
        run_id: &str,
        status: RunStatus,
        summary: &str,
        error_message: Option<&str>,
    ) -> Result<PathBuf> {
        let payload = json!({
            "status": status.to_string(),
            "summary": summary,
            "error_message": error_message.unwrap_or_default(),
        });
        self.append_event(run_id, &envelope(run_id, "final", payload).to_string())
    }
}

fn envelope(run_id: &str, event: &str, payload: serde_json::Value) -> serde_json::Value {
    json!({
        "ts_unix_ms": Utc::now().timestamp_millis(),
        "event": event,
        "run_id": run_id,
        "payload": payload,
    })
}
