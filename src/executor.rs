//! The fixed deterministic pipeline.
//!
//! Given a run id, a validated request and a cancellation handle, the
//! executor composes the tool host into a fixed sequence of typed steps.
//! Each step is journaled through the [`StepSink`] seam *before* the next
//! step runs, so a crash-truncated log still honours prefix ordering.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::error::{AgentError, Result};
use crate::core::types::{CancelToken, RunRequest, RunResult, RunStatus, RunStep, StepType, ToolResult};
use crate::io::artifacts::ArtifactWriter;
use crate::tools::{CommandRequest, PatchRequest, SearchRequest, ToolHost};

/// Timeout for the fixed command probe.
const PROBE_TIMEOUT_MS: u64 = 2000;
/// Timeout for applying a plan-embedded patch.
const PATCH_TIMEOUT_MS: u64 = 4000;
/// Match budget for the task-derived context search.
const CONTEXT_MAX_MATCHES: usize = 12;

/// Receives each step as soon as it has executed.
pub trait StepSink {
    fn record_step(&self, run_id: &str, step: &RunStep) -> Result<()>;
}

impl StepSink for ArtifactWriter {
    fn record_step(&self, run_id: &str, step: &RunStep) -> Result<()> {
        self.write_step(run_id, step)?;
        Ok(())
    }
}

/// Drives the fixed pipeline against a tool host.
#[derive(Debug, Default)]
pub struct DeterministicExecutor {
    tool_host: ToolHost,
}

impl DeterministicExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute the pipeline, journaling steps through `sink` as they land.
    ///
    /// Any hard error exits early; the surrounding driver marks the run
    /// failed and writes the final artifact.
    pub fn execute(
        &self,
        run_id: &str,
        request: &RunRequest,
        cancel_token: CancelToken,
        sink: &dyn StepSink,
    ) -> Result<RunResult> {
        let mut result = RunResult {
            run_id: run_id.to_string(),
            status: RunStatus::Completed,
            steps: Vec::new(),
            summary: String::new(),
        };
        let mut next_step_id = 1u32;
        let workspace = request.working_directory.as_path();

        // InspectRequest
        let mode = if request.plan_file.is_some() {
            "mode=plan_file"
        } else {
            "mode=task"
        };
        emit_step(
            sink,
            &mut result,
            &mut next_step_id,
            StepType::InspectRequest,
            mode.to_string(),
        )?;

        // LoadContext
        let mut plan_contents = String::new();
        let context_output = if let Some(plan_file) = &request.plan_file {
            let tool_result = self.tool_host.read_file(workspace, plan_file)?;
            if !tool_result.success {
                return Err(AgentError::execution(
                    "plan_file_read_failed",
                    format!("Failed to read plan file: {}", tool_result.error_message),
                ));
            }
            plan_contents = tool_result.output;
            format!("Loaded plan file ({} bytes)", plan_contents.len())
        } else if let Some(task) = &request.task_description {
            let search_request = SearchRequest {
                pattern: pick_search_pattern(task),
                scope: PathBuf::from("."),
                max_matches: CONTEXT_MAX_MATCHES,
            };
            let tool_result = self.tool_host.search(workspace, &search_request)?;
            if !tool_result.success {
                return Err(AgentError::execution(
                    "search_failed",
                    format!("Search failed: {}", tool_result.error_message),
                ));
            }
            format!("Task: {task}\n{}", tool_result.output)
        } else {
            return Err(AgentError::input(
                "invalid_run_request",
                "Request has neither task nor plan file.",
            ));
        };
        emit_step(
            sink,
            &mut result,
            &mut next_step_id,
            StepType::LoadContext,
            context_output,
        )?;

        // ExecuteCommand: fixed probe proving the command runner works.
        let command_result = self.tool_host.run_command(
            workspace,
            &CommandRequest {
                command: "echo command_runner_ok".to_string(),
                working_directory: PathBuf::from("."),
                timeout_ms: PROBE_TIMEOUT_MS,
                cancel_token: Some(cancel_token.clone()),
            },
        )?;
        if !command_result.success {
            return Err(AgentError::execution(
                "command_failed",
                format!("Command step failed: {}", command_result.error_message),
            ));
        }
        emit_step(
            sink,
            &mut result,
            &mut next_step_id,
            StepType::ExecuteCommand,
            command_result.output,
        )?;

        // ApplyPatch, only when the plan carries a unified diff.
        if !plan_contents.is_empty() && looks_like_patch(&plan_contents) {
            let patch_result = self.apply_plan_patch(workspace, &plan_contents, &cancel_token)?;
            if !patch_result.success {
                return Err(AgentError::execution(
                    "apply_patch_failed",
                    format!("Patch step failed: {}", patch_result.error_message),
                ));
            }
            emit_step(
                sink,
                &mut result,
                &mut next_step_id,
                StepType::ApplyPatch,
                "Patch applied successfully.".to_string(),
            )?;
        }

        // BuildReport
        emit_step(
            sink,
            &mut result,
            &mut next_step_id,
            StepType::BuildReport,
            "Prepared deterministic report context".to_string(),
        )?;

        result.summary = format!(
            "Deterministic execution completed with {} steps.",
            result.steps.len()
        );
        Ok(result)
    }

    fn apply_plan_patch(
        &self,
        workspace: &Path,
        plan_contents: &str,
        cancel_token: &CancelToken,
    ) -> Result<ToolResult> {
        self.tool_host.apply_patch(
            workspace,
            &PatchRequest {
                patch_text: plan_contents.to_string(),
                timeout_ms: PATCH_TIMEOUT_MS,
                cancel_token: Some(cancel_token.clone()),
            },
        )
    }
}

fn emit_step(
    sink: &dyn StepSink,
    result: &mut RunResult,
    next_step_id: &mut u32,
    step_type: StepType,
    output: String,
) -> Result<()> {
    let step = RunStep {
        id: format!("step-{next_step_id}"),
        step_type,
        success: true,
        output,
    };
    *next_step_id += 1;

    sink.record_step(&result.run_id, &step)?;
    info!(run_id = %result.run_id, step = %step.id, step_type = %step.step_type, "step completed");
    debug!(run_id = %result.run_id, output = %step.output, "step output");
    result.steps.push(step);
    Ok(())
}

/// Derive a search pattern from free-form task text.
///
/// First ASCII-alphanumeric token of length >= 4, else the first token,
/// else `"TODO"`.
fn pick_search_pattern(task: &str) -> String {
    let mut fallback: Option<&str> = None;
    for token in task
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
    {
        if token.len() >= 4 {
            return token.to_string();
        }
        fallback.get_or_insert(token);
    }
    fallback.unwrap_or("TODO").to_string()
}

fn looks_like_patch(text: &str) -> bool {
    text.contains("+++ ") && text.contains("--- ")
}
