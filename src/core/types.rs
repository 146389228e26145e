//! Shared contracts between harness components.
//!
//! These types define the stable boundary between the run manager, the
//! deterministic executor, the tool host and the artifact writer. They must
//! remain deterministic across runs; serialized names are part of the
//! artifact format.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Validated user input required to start a run.
///
/// Exactly one of `task_description` and `plan_file` must be set; the run
/// manager rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub task_description: Option<String>,
    /// Path to a plan file, possibly relative to `working_directory`.
    pub plan_file: Option<PathBuf>,
    /// Absolute, existing directory bounding every filesystem touch.
    pub working_directory: PathBuf,
    pub max_steps: u32,
    pub verbose: bool,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            task_description: None,
            plan_file: None,
            working_directory: PathBuf::from("."),
            max_steps: 30,
            verbose: false,
        }
    }
}

/// Kind of a pipeline step, serialized snake_case into artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    InspectRequest,
    LoadContext,
    ExecuteCommand,
    ApplyPatch,
    BuildReport,
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InspectRequest => "inspect_request",
            Self::LoadContext => "load_context",
            Self::ExecuteCommand => "execute_command",
            Self::ApplyPatch => "apply_patch",
            Self::BuildReport => "build_report",
        };
        f.write_str(name)
    }
}

/// One executed pipeline step.
///
/// `id` is `step-N`, monotonically increasing within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub success: bool,
    pub output: String,
}

/// Terminal status of a run result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Ordered outcome of a full deterministic pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    pub steps: Vec<RunStep>,
    pub summary: String,
}

/// Structured outcome of a single capability call.
///
/// A `success=false` result is a negative outcome the caller may reason
/// about, not an error; hard errors travel as [`crate::core::error::AgentError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Capability name (`"read_file"`, `"search"`, ...), not a correlation id.
    pub tool_call_id: String,
    pub success: bool,
    pub output: String,
    pub error_message: String,
    pub duration_ms: u64,
}

impl ToolResult {
    /// Successful outcome with captured output.
    pub fn success(tool: &str, output: String, duration_ms: u64) -> Self {
        Self {
            tool_call_id: tool.to_string(),
            success: true,
            output,
            error_message: String::new(),
            duration_ms,
        }
    }

    /// Negative outcome with a descriptive message.
    pub fn failure(tool: &str, error_message: String) -> Self {
        Self {
            tool_call_id: tool.to_string(),
            success: false,
            output: String::new(),
            error_message,
            duration_ms: 0,
        }
    }
}

/// Shared cooperative cancellation flag.
///
/// The run manager owns the only writer; in-flight tool calls hold clones and
/// observe the flag at their polling cadence.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_round_trips_through_json() {
        let step = RunStep {
            id: "step-2".to_string(),
            step_type: StepType::LoadContext,
            success: true,
            output: "Loaded plan file (12 bytes)".to_string(),
        };

        let encoded = serde_json::to_string(&step).expect("serialize");
        assert!(encoded.contains("\"type\":\"load_context\""));

        let decoded: RunStep = serde_json::from_str(&encoded).expect("parse");
        assert_eq!(decoded, step);
    }

    #[test]
    fn step_type_display_matches_wire_names() {
        assert_eq!(StepType::InspectRequest.to_string(), "inspect_request");
        assert_eq!(StepType::ApplyPatch.to_string(), "apply_patch");
        assert_eq!(RunStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn cancel_token_clones_share_state() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());

        token.cancel();
        assert!(observer.is_cancelled());
    }
}
