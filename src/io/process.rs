//! Child-process supervision with bounded waits and concurrent pipe drain.
//!
//! Stdout and stderr are read on dedicated threads while the parent waits for
//! the child in short slices, so a child that writes more than one pipe
//! buffer cannot deadlock against us. Reaping the child does not flush the
//! kernel pipe buffers; the reader threads are joined only after the child
//! has exited, which guarantees both pipes were drained to EOF.

use std::io::Read;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::core::error::{AgentError, Result};
use crate::core::types::CancelToken;

/// Cadence at which the supervision loop observes cancellation and timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured outcome of one supervised shell command.
#[derive(Debug)]
pub struct ShellCapture {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// Run `command` through `/bin/sh -lc` in `cwd`, capturing both pipes.
///
/// `timeout_ms = 0` disables the timeout. The cancel token is observed at
/// the polling cadence; a cancelled or timed-out child is killed with
/// `SIGKILL` and its pipes are still drained to EOF before returning.
/// Signalled exits map to `128 + signo`.
pub fn run_shell_command(
    command: &str,
    cwd: &Path,
    timeout_ms: u64,
    cancel_token: Option<&CancelToken>,
) -> Result<ShellCapture> {
    if cancel_token.is_some_and(CancelToken::is_cancelled) {
        return Ok(ShellCapture {
            exit_code: -1,
            stdout: String::new(),
            stderr: "Command cancelled before start.".to_string(),
            timed_out: false,
            cancelled: true,
            duration_ms: 0,
        });
    }

    let started = Instant::now();
    let mut child = Command::new("/bin/sh")
        .arg("-lc")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| {
            AgentError::internal("spawn_failed", format!("Failed to spawn shell: {err}"))
        })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        AgentError::internal("pipe_creation_failed", "Failed to capture child stdout.")
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        AgentError::internal("pipe_creation_failed", "Failed to capture child stderr.")
    })?;

    let stdout_reader = thread::spawn(move || drain_to_end(stdout));
    let stderr_reader = thread::spawn(move || drain_to_end(stderr));

    let mut timed_out = false;
    let mut cancelled = false;
    let status = loop {
        if !cancelled && cancel_token.is_some_and(CancelToken::is_cancelled) {
            cancelled = true;
            let _ = child.kill();
        }
        if !timed_out && timeout_ms > 0 && started.elapsed() > Duration::from_millis(timeout_ms) {
            timed_out = true;
            let _ = child.kill();
        }

        match child.wait_timeout(POLL_INTERVAL) {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(err) => {
                return Err(AgentError::internal(
                    "wait_failed",
                    format!("Failed to wait for child process: {err}"),
                ));
            }
        }
    };

    let stdout = join_reader(stdout_reader)?;
    let stderr = join_reader(stderr_reader)?;

    let exit_code = match status.code() {
        Some(code) => code,
        None => 128 + status.signal().unwrap_or(0),
    };

    Ok(ShellCapture {
        exit_code,
        stdout,
        stderr,
        timed_out,
        cancelled,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

fn drain_to_end<R: Read>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

fn join_reader(handle: thread::JoinHandle<std::io::Result<Vec<u8>>>) -> Result<String> {
    let bytes = handle
        .join()
        .map_err(|_| AgentError::internal("output_capture_failed", "Pipe reader thread panicked."))?
        .map_err(|err| {
            AgentError::internal(
                "output_capture_failed",
                format!("Failed to drain child pipe: {err}"),
            )
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
