//! Unified-diff application through the system `patch` binary.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{CommandRequest, ToolHost};
use crate::core::error::{AgentError, Result};
use crate::core::types::{CancelToken, ToolResult};
use crate::io::artifacts::DEFAULT_ARTIFACT_SUBDIR;

const TOOL: &str = "apply_patch";

/// Parameters for a patch application.
#[derive(Debug, Clone)]
pub struct PatchRequest {
    pub patch_text: String,
    pub timeout_ms: u64,
    pub cancel_token: Option<CancelToken>,
}

impl Default for PatchRequest {
    fn default() -> Self {
        Self {
            patch_text: String::new(),
            timeout_ms: 5000,
            cancel_token: None,
        }
    }
}

impl ToolHost {
    /// Apply a unified diff to workspace files.
    ///
    /// Every path named by the diff headers is validated against the
    /// workspace before anything is written; the patch text then goes
    /// through a uniquely named temp file under the artifact directory and
    /// `patch -p1 --forward --batch`. The temp file is removed whether the
    /// patch command succeeded or not.
    pub fn apply_patch(&self, workspace_root: &Path, request: &PatchRequest) -> Result<ToolResult> {
        if request.patch_text.is_empty() {
            return Err(AgentError::input("empty_patch", "Patch text cannot be empty."));
        }

        let patch_paths = extract_patch_paths(&request.patch_text);
        if patch_paths.is_empty() {
            return Err(AgentError::input(
                "invalid_patch_format",
                "Patch does not include any file paths.",
            ));
        }
        for patch_path in &patch_paths {
            self.resolve_path(workspace_root, patch_path)?;
        }

        let artifacts_dir = workspace_root.join(DEFAULT_ARTIFACT_SUBDIR);
        std::fs::create_dir_all(&artifacts_dir).map_err(|_| {
            AgentError::internal(
                "patch_temp_dir_failed",
                format!(
                    "Failed to create temporary patch directory: {}",
                    artifacts_dir.display()
                ),
            )
        })?;

        // NamedTempFile removes itself on drop, covering both outcomes.
        let mut patch_file = tempfile::Builder::new()
            .prefix("tool_patch_")
            .suffix(".diff")
            .tempfile_in(&artifacts_dir)
            .map_err(|err| {
                AgentError::internal(
                    "patch_temp_open_failed",
                    format!("Failed to open temporary patch file: {err}"),
                )
            })?;
        patch_file
            .write_all(request.patch_text.as_bytes())
            .and_then(|()| patch_file.flush())
            .map_err(|err| {
                AgentError::internal(
                    "patch_temp_write_failed",
                    format!("Failed to write temporary patch file: {err}"),
                )
            })?;
        debug!(patch_file = %patch_file.path().display(), files = patch_paths.len(), "applying patch");

        let command = format!(
            "patch -p1 --forward --batch -i '{}'",
            escape_single_quotes(&patch_file.path().display().to_string())
        );
        let command_request = CommandRequest {
            command,
            working_directory: PathBuf::from("."),
            timeout_ms: request.timeout_ms,
            cancel_token: request.cancel_token.clone(),
        };

        let mut result = self.run_command(workspace_root, &command_request)?;
        result.tool_call_id = TOOL.to_string();
        Ok(result)
    }
}

/// Pull target paths out of `--- ` / `+++ ` header lines.
///
/// Timestamp suffixes (first tab onward) are stripped, `a/` and `b/`
/// prefixes removed, `/dev/null` dropped, duplicates collapsed preserving
/// first-seen order.
fn extract_patch_paths(patch_text: &str) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for line in patch_text.lines() {
        let Some(candidate) = line
            .strip_prefix("--- ")
            .or_else(|| line.strip_prefix("+++ "))
        else {
            continue;
        };
        if candidate == "/dev/null" {
            continue;
        }

        let candidate = candidate.split('\t').next().unwrap_or(candidate);
        let candidate = candidate
            .strip_prefix("a/")
            .or_else(|| candidate.strip_prefix("b/"))
            .unwrap_or(candidate);
        if candidate.is_empty() {
            continue;
        }

        if seen.insert(candidate.to_string()) {
            paths.push(PathBuf::from(candidate));
        }
    }

    paths
}

fn escape_single_quotes(value: &str) -> String {
    value.replace('\'', "'\\''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SAMPLE_PATCH: &str = concat!(
        "diff --git a/file.txt b/file.txt\n",
        "--- a/file.txt\n",
        "+++ b/file.txt\n",
        "@@ -1 +1 @@\n",
        "-old\n",
        "+new\n",
    );

    fn request(patch_text: &str) -> PatchRequest {
        PatchRequest {
            patch_text: patch_text.to_string(),
            timeout_ms: 2000,
            cancel_token: None,
        }
    }

    #[test]
    fn extracts_paths_from_headers() {
        let paths = extract_patch_paths(SAMPLE_PATCH);
        assert_eq!(paths, vec![PathBuf::from("file.txt")]);
    }

    #[test]
    fn extraction_strips_timestamps_and_drops_dev_null() {
        let patch = concat!(
            "--- a/src/lib.rs\t2024-01-01 00:00:00\n",
            "+++ b/src/lib.rs\t2024-01-02 00:00:00\n",
            "--- /dev/null\n",
            "+++ b/src/new.rs\n",
        );
        let paths = extract_patch_paths(patch);
        assert_eq!(
            paths,
            vec![PathBuf::from("src/lib.rs"), PathBuf::from("src/new.rs")]
        );
    }

    #[test]
    fn applies_patch_to_workspace_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("file.txt"), "old\n").expect("write");

        let host = ToolHost::new();
        let result = host
            .apply_patch(temp.path(), &request(SAMPLE_PATCH))
            .expect("apply");

        assert!(result.success, "patch failed: {}", result.error_message);
        assert_eq!(result.tool_call_id, "apply_patch");
        let contents = fs::read_to_string(temp.path().join("file.txt")).expect("read");
        assert_eq!(contents, "new\n");
    }

    #[test]
    fn temp_patch_file_does_not_survive_the_call() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("file.txt"), "old\n").expect("write");

        let host = ToolHost::new();
        host.apply_patch(temp.path(), &request(SAMPLE_PATCH))
            .expect("apply");

        let leftovers: Vec<_> = fs::read_dir(temp.path().join(DEFAULT_ARTIFACT_SUBDIR))
            .expect("read artifacts dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("tool_patch_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn rejects_empty_patch() {
        let temp = tempfile::tempdir().expect("tempdir");

        let host = ToolHost::new();
        let err = host
            .apply_patch(temp.path(), &request(""))
            .expect_err("must reject");
        assert_eq!(err.code, "empty_patch");
    }

    #[test]
    fn rejects_patch_without_paths() {
        let temp = tempfile::tempdir().expect("tempdir");

        let host = ToolHost::new();
        let err = host
            .apply_patch(temp.path(), &request("this is not a patch"))
            .expect_err("must reject");
        assert_eq!(err.code, "invalid_patch_format");
    }

    #[test]
    fn rejects_patch_escaping_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let patch = concat!(
            "--- a/../escape.txt\n",
            "+++ b/../escape.txt\n",
            "@@ -1 +1 @@\n",
            "-old\n",
            "+new\n",
        );

        let host = ToolHost::new();
        let err = host
            .apply_patch(temp.path(), &request(patch))
            .expect_err("must reject");
        assert_eq!(err.code, "path_outside_workspace");
        // Validation fails before any temp file is created.
        assert!(!temp.path().join(DEFAULT_ARTIFACT_SUBDIR).exists());
    }
}
