//! Composition of run manager, executor and artifact writer.
//!
//! Reproduces the outer control flow of one run: register it, journal the
//! request, execute the pipeline, report the terminal transition and write
//! the final artifact. Every failure path maps to a stable exit code
//! (see [`crate::exit_codes`]).

use tracing::{error, info};

use crate::core::error::AgentError;
use crate::core::types::{RunRequest, RunStatus};
use crate::executor::DeterministicExecutor;
use crate::exit_codes;
use crate::io::artifacts::ArtifactWriter;
use crate::manager::RunManager;

/// Drive one run to completion and return the process exit code.
pub fn run(request: &RunRequest) -> i32 {
    let manager = RunManager::new();

    let run_id = match manager.start_run(request) {
        Ok(run_id) => run_id,
        Err(err) => {
            log_error("Failed to start run", &err);
            return exit_codes::RUN_START_FAILED;
        }
    };
    info!(run_id = %run_id, "run started");

    let cancel_token = match manager.get_cancel_token(&run_id) {
        Ok(token) => token,
        Err(err) => {
            log_error("Failed to get cancellation token", &err);
            return exit_codes::RUN_START_FAILED;
        }
    };

    let artifacts = ArtifactWriter::new(&request.working_directory);
    if let Err(err) = artifacts.write_request(&run_id, request) {
        log_error("Failed to write request artifact", &err);
        return exit_codes::ARTIFACT_FAILED;
    }

    let executor = DeterministicExecutor::new();
    let result = match executor.execute(&run_id, request, cancel_token, &artifacts) {
        Ok(result) => result,
        Err(err) => {
            log_error("Execution failed", &err);
            if let Err(artifact_err) = artifacts.write_final(
                &run_id,
                RunStatus::Failed,
                "Execution failed.",
                Some(&err.message),
            ) {
                log_error("Failed to write failure artifact", &artifact_err);
            }
            if let Err(fail_err) = manager.mark_failed(&run_id, &err.message) {
                log_error("Failed to mark run as failed", &fail_err);
            }
            if err.code.starts_with("artifact_") {
                return exit_codes::ARTIFACT_FAILED;
            }
            return exit_codes::EXECUTION_FAILED;
        }
    };
    info!(run_id = %run_id, summary = %result.summary, "run summary");

    if let Err(err) = manager.mark_completed(&run_id) {
        log_error("Failed to mark run as completed", &err);
        return exit_codes::COMPLETION_FAILED;
    }

    let final_state = match manager.get_run_state(&run_id) {
        Ok(state) => state,
        Err(err) => {
            log_error("Failed to fetch final run state", &err);
            return exit_codes::STATE_READ_FAILED;
        }
    };
    info!(run_id = %run_id, state = %final_state, "final run state");

    let artifact_path =
        match artifacts.write_final(&run_id, RunStatus::Completed, &result.summary, None) {
            Ok(path) => path,
            Err(err) => {
                log_error("Failed to write final artifact", &err);
                return exit_codes::ARTIFACT_FAILED;
            }
        };
    info!(run_id = %run_id, artifacts = %artifact_path.display(), "artifacts written");

    exit_codes::SUCCESS
}

fn log_error(context: &str, err: &AgentError) {
    error!(code = %err.code, "{context}: {}", err.message);
    if let Some(hint) = &err.hint {
        info!("Hint: {hint}");
    }
}
