//! Shell command execution under policy and supervision.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::ToolHost;
use crate::core::error::Result;
use crate::core::types::{CancelToken, ToolResult};
use crate::io::process::{run_shell_command, ShellCapture};

const TOOL: &str = "run_command";

/// Parameters for a supervised shell command.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command: String,
    /// Working directory, resolved against the workspace root.
    pub working_directory: PathBuf,
    /// Wall-clock bound in milliseconds; `0` disables the timeout.
    pub timeout_ms: u64,
    pub cancel_token: Option<CancelToken>,
}

impl Default for CommandRequest {
    fn default() -> Self {
        Self {
            command: String::new(),
            working_directory: PathBuf::from("."),
            timeout_ms: 5000,
            cancel_token: None,
        }
    }
}

impl ToolHost {
    /// Run a denylist-checked shell command inside the workspace.
    ///
    /// Timeouts and cancellations are negative outcomes, never hard errors;
    /// the capture's stderr becomes `error_message` with a trailing marker
    /// appended.
    pub fn run_command(&self, workspace_root: &Path, request: &CommandRequest) -> Result<ToolResult> {
        let command = self.guard().validate_command(&request.command)?;
        let cwd = self.resolve_path(workspace_root, &request.working_directory)?;
        debug!(command, cwd = %cwd.display(), timeout_ms = request.timeout_ms, "running command");

        let capture = run_shell_command(
            command,
            &cwd,
            request.timeout_ms,
            request.cancel_token.as_ref(),
        )?;
        Ok(capture_to_result(capture))
    }
}

fn capture_to_result(capture: ShellCapture) -> ToolResult {
    let mut result = ToolResult {
        tool_call_id: TOOL.to_string(),
        success: false,
        output: capture.stdout,
        error_message: capture.stderr,
        duration_ms: capture.duration_ms,
    };

    if capture.cancelled {
        append_marker(&mut result.error_message, "Command cancelled.");
        return result;
    }
    if capture.timed_out {
        append_marker(&mut result.error_message, "Command timed out.");
        return result;
    }

    result.success = capture.exit_code == 0;
    if !result.success && result.error_message.is_empty() {
        result.error_message = format!("Command failed with exit code {}", capture.exit_code);
    }
    result
}

fn append_marker(message: &mut String, marker: &str) {
    if !message.is_empty() {
        message.push('\n');
    }
    message.push_str(marker);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn request(command: &str) -> CommandRequest {
        CommandRequest {
            command: command.to_string(),
            ..CommandRequest::default()
        }
    }

    fn capture(exit_code: i32) -> ShellCapture {
        ShellCapture {
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            cancelled: false,
            duration_ms: 5,
        }
    }

    #[test]
    fn runs_successful_command() {
        let temp = tempfile::tempdir().expect("tempdir");

        let host = ToolHost::new();
        let result = host
            .run_command(temp.path(), &request("printf 'hello'"))
            .expect("run");

        assert!(result.success);
        assert_eq!(result.tool_call_id, "run_command");
        assert_eq!(result.output, "hello");
    }

    #[test]
    fn runs_in_validated_working_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(temp.path().join("sub")).expect("mkdir");
        std::fs::write(temp.path().join("sub/marker.txt"), "x").expect("write");

        let host = ToolHost::new();
        let result = host
            .run_command(
                temp.path(),
                &CommandRequest {
                    command: "ls".to_string(),
                    working_directory: PathBuf::from("sub"),
                    ..CommandRequest::default()
                },
            )
            .expect("run");

        assert!(result.success);
        assert!(result.output.contains("marker.txt"));
    }

    #[test]
    fn rejects_blocked_command() {
        let temp = tempfile::tempdir().expect("tempdir");

        let host = ToolHost::new();
        let err = host
            .run_command(temp.path(), &request("sudo ls"))
            .expect_err("must reject");
        assert_eq!(err.code, "blocked_command");
    }

    #[test]
    fn custom_policy_applies_to_commands() {
        let temp = tempfile::tempdir().expect("tempdir");

        let host = ToolHost::with_policy(crate::policy::CommandPolicy {
            blocked_substrings: vec!["curl".to_string()],
        });
        let err = host
            .run_command(temp.path(), &request("curl example.com"))
            .expect_err("must reject");
        assert_eq!(err.code, "blocked_command");
    }

    #[test]
    fn rejects_cwd_outside_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");

        let host = ToolHost::new();
        let err = host
            .run_command(
                temp.path(),
                &CommandRequest {
                    command: "ls".to_string(),
                    working_directory: PathBuf::from(".."),
                    ..CommandRequest::default()
                },
            )
            .expect_err("must reject");
        assert_eq!(err.code, "path_outside_workspace");
    }

    #[test]
    fn timeout_is_a_negative_outcome() {
        let temp = tempfile::tempdir().expect("tempdir");
        let started = Instant::now();

        let host = ToolHost::new();
        let result = host
            .run_command(
                temp.path(),
                &CommandRequest {
                    command: "sleep 1".to_string(),
                    timeout_ms: 30,
                    ..CommandRequest::default()
                },
            )
            .expect("run");

        assert!(!result.success);
        assert!(result.error_message.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn pre_set_token_cancels_before_start() {
        let temp = tempfile::tempdir().expect("tempdir");
        let token = CancelToken::new();
        token.cancel();

        let host = ToolHost::new();
        let result = host
            .run_command(
                temp.path(),
                &CommandRequest {
                    command: "sleep 1".to_string(),
                    cancel_token: Some(token),
                    ..CommandRequest::default()
                },
            )
            .expect("run");

        assert!(!result.success);
        assert!(result.error_message.contains("cancelled before start"));
        assert!(result.error_message.contains("Command cancelled."));
    }

    #[test]
    fn synthesises_message_for_silent_failure() {
        let result = capture_to_result(capture(7));
        assert!(!result.success);
        assert_eq!(result.error_message, "Command failed with exit code 7");
    }

    #[test]
    fn keeps_stderr_for_noisy_failure() {
        let mut noisy = capture(1);
        noisy.stderr = "boom".to_string();

        let result = capture_to_result(noisy);
        assert!(!result.success);
        assert_eq!(result.error_message, "boom");
    }

    #[test]
    fn cancellation_marker_is_appended_to_existing_stderr() {
        let mut cancelled = capture(137);
        cancelled.cancelled = true;
        cancelled.stderr = "partial".to_string();

        let result = capture_to_result(cancelled);
        assert!(!result.success);
        assert_eq!(result.error_message, "partial\nCommand cancelled.");
    }

    #[test]
    fn timeout_marker_overrides_exit_code_mapping() {
        let mut timed_out = capture(137);
        timed_out.timed_out = true;

        let result = capture_to_result(timed_out);
        assert!(!result.success);
        assert_eq!(result.error_message, "Command timed out.");
    }
}
