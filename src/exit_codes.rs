//! Stable process exit codes for the `agent` CLI.

/// Run completed and all artifacts were written.
pub const SUCCESS: i32 = 0;
/// The executor surfaced an execution or policy failure.
pub const EXECUTION_FAILED: i32 = 1;
/// CLI input or request validation failed.
pub const INPUT_ERROR: i32 = 2;
/// The run manager could not start the run or hand out its token.
pub const RUN_START_FAILED: i32 = 3;
/// Marking the run completed was rejected.
pub const COMPLETION_FAILED: i32 = 4;
/// Reading the final run state failed.
pub const STATE_READ_FAILED: i32 = 5;
/// An artifact write failed.
pub const ARTIFACT_FAILED: i32 = 6;
