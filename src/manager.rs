//! Run registry, lifecycle state machine and cancellation tokens.
//!
//! The manager exclusively owns every `RunRecord` for the process lifetime;
//! callers receive state snapshots and shared token handles. All operations
//! serialise through one mutex, and cancellation flips the shared token in
//! the same critical section as the state transition so in-flight tools
//! observe it promptly.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::info;

use crate::core::error::{AgentError, Result};
use crate::core::types::{CancelToken, RunRequest};
use crate::io::run_id::generate_run_id;

/// Lifecycle state of a run.
///
/// `Created` is internal only: `start_run` transitions to `Running` before
/// returning, so external observers never see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    /// Terminal states permit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct RunRecord {
    request: RunRequest,
    state: RunState,
    failure_reason: Option<String>,
    cancel_token: CancelToken,
}

/// Concurrent registry mapping run ids to lifecycle records.
#[derive(Debug, Default)]
pub struct RunManager {
    runs: Mutex<HashMap<String, RunRecord>>,
}

impl RunManager {
    const MAX_ID_ATTEMPTS: usize = 16;

    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validated request and return its new run id.
    ///
    /// Enforces the task/plan XOR, retries id generation until unique, and
    /// immediately transitions the fresh record to `Running`.
    pub fn start_run(&self, request: &RunRequest) -> Result<String> {
        if request.task_description.is_none() && request.plan_file.is_none() {
            return Err(AgentError::input(
                "invalid_run_request",
                "Run request must include task or plan file.",
            ));
        }
        if request.task_description.is_some() && request.plan_file.is_some() {
            return Err(AgentError::input(
                "invalid_run_request",
                "Run request cannot include both task and plan file.",
            ));
        }

        let mut runs = self.lock()?;
        for _ in 0..Self::MAX_ID_ATTEMPTS {
            let run_id = generate_run_id();
            if runs.contains_key(&run_id) {
                continue;
            }

            let mut record = RunRecord {
                request: request.clone(),
                state: RunState::Created,
                failure_reason: None,
                cancel_token: CancelToken::new(),
            };
            info!(run_id = %run_id, from = %record.state, to = %RunState::Running, "run state transition");
            record.state = RunState::Running;
            runs.insert(run_id.clone(), record);
            return Ok(run_id);
        }

        Err(AgentError::internal(
            "run_id_generation_failed",
            "Unable to allocate unique run ID.",
        ))
    }

    /// Snapshot the current state of a run.
    pub fn get_run_state(&self, run_id: &str) -> Result<RunState> {
        let runs = self.lock()?;
        runs.get(run_id)
            .map(|record| record.state)
            .ok_or_else(|| run_not_found(run_id))
    }

    /// Shared handle to the run's cancellation flag.
    pub fn get_cancel_token(&self, run_id: &str) -> Result<CancelToken> {
        let runs = self.lock()?;
        runs.get(run_id)
            .map(|record| record.cancel_token.clone())
            .ok_or_else(|| run_not_found(run_id))
    }

    /// Snapshot of the request a run was started with.
    pub fn get_request(&self, run_id: &str) -> Result<RunRequest> {
        let runs = self.lock()?;
        runs.get(run_id)
            .map(|record| record.request.clone())
            .ok_or_else(|| run_not_found(run_id))
    }

    /// Failure reason recorded by `mark_failed`, if any.
    pub fn get_failure_reason(&self, run_id: &str) -> Result<Option<String>> {
        let runs = self.lock()?;
        runs.get(run_id)
            .map(|record| record.failure_reason.clone())
            .ok_or_else(|| run_not_found(run_id))
    }

    /// Cancel a running run and flip its token atomically.
    pub fn cancel_run(&self, run_id: &str) -> Result<RunState> {
        self.transition_to_terminal(run_id, RunState::Cancelled, None)
    }

    pub fn mark_completed(&self, run_id: &str) -> Result<RunState> {
        self.transition_to_terminal(run_id, RunState::Completed, None)
    }

    pub fn mark_failed(&self, run_id: &str, reason: &str) -> Result<RunState> {
        self.transition_to_terminal(run_id, RunState::Failed, Some(reason.to_string()))
    }

    /// Number of registered runs.
    pub fn run_count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn transition_to_terminal(
        &self,
        run_id: &str,
        next_state: RunState,
        failure_reason: Option<String>,
    ) -> Result<RunState> {
        let mut runs = self.lock()?;
        let record = runs.get_mut(run_id).ok_or_else(|| run_not_found(run_id))?;

        if record.state.is_terminal() {
            return Err(AgentError::input(
                "invalid_state_transition",
                format!("Run is already terminal: {}", record.state),
            ));
        }

        info!(run_id = %run_id, from = %record.state, to = %next_state, "run state transition");
        record.state = next_state;
        record.failure_reason = failure_reason;
        if next_state == RunState::Cancelled {
            record.cancel_token.cancel();
        }
        Ok(record.state)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, RunRecord>>> {
        self.runs.lock().map_err(|_| {
            AgentError::internal("run_registry_poisoned", "Run registry mutex was poisoned.")
        })
    }
}

fn run_not_found(run_id: &str) -> AgentError {
    AgentError::input("run_not_found", format!("Run ID not found: {run_id}"))
}
