//! Workspace confinement and command denylist.
//!
//! The guard is a coarse safety net, not the security boundary: the boundary
//! is path confinement plus whatever sandbox the host OS applies to child
//! processes. Every tool routes paths and commands through here before I/O.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::core::error::{AgentError, Result};

/// Substring denylist applied to shell commands.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    pub blocked_substrings: Vec<String>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            blocked_substrings: [
                "sudo",
                "rm -rf",
                "shutdown",
                "reboot",
                "mkfs",
                "dd if=",
                ":(){ :|:& };:",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

/// Enforces path confinement and the command denylist.
#[derive(Debug, Clone, Default)]
pub struct PolicyGuard {
    command_policy: CommandPolicy,
}

impl PolicyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(command_policy: CommandPolicy) -> Self {
        Self { command_policy }
    }

    /// Resolve `target` against `workspace_root` and require confinement.
    ///
    /// Both sides are weakly canonicalised; the prefix check compares path
    /// components, never raw strings (`/a/bc` does not live under `/a/b`).
    /// Relative targets are joined under the canonical root first.
    pub fn validate_path_in_workspace(
        &self,
        workspace_root: &Path,
        target: &Path,
    ) -> Result<PathBuf> {
        if !workspace_root.exists() {
            return Err(AgentError::input(
                "invalid_workspace_root",
                format!("Workspace root does not exist: {}", workspace_root.display()),
            ));
        }
        if !workspace_root.is_dir() {
            return Err(AgentError::input(
                "invalid_workspace_root",
                format!(
                    "Workspace root is not a directory: {}",
                    workspace_root.display()
                ),
            ));
        }

        let canonical_root = weak_canonicalize(workspace_root).map_err(|_| {
            AgentError::input(
                "invalid_workspace_root",
                format!("Unable to resolve workspace root: {}", workspace_root.display()),
            )
        })?;

        let candidate = if target.is_relative() {
            canonical_root.join(target)
        } else {
            target.to_path_buf()
        };

        let canonical_target = weak_canonicalize(&candidate).map_err(|_| {
            AgentError::input(
                "invalid_path",
                format!("Unable to resolve target path: {}", target.display()),
            )
        })?;

        if !canonical_target.starts_with(&canonical_root) {
            return Err(AgentError::policy(
                "path_outside_workspace",
                format!("Path escapes workspace root: {}", canonical_target.display()),
            ));
        }

        Ok(canonical_target)
    }

    /// Reject empty commands and commands containing a denylist substring.
    ///
    /// Matching is case-insensitive so `ReBoOt now` is still blocked.
    pub fn validate_command<'a>(&self, command: &'a str) -> Result<&'a str> {
        if command.is_empty() {
            return Err(AgentError::input("empty_command", "Command cannot be empty."));
        }

        let lowered = command.to_lowercase();
        for blocked in &self.command_policy.blocked_substrings {
            if lowered.contains(&blocked.to_lowercase()) {
                return Err(AgentError::policy(
                    "blocked_command",
                    format!("Command contains blocked operation: {blocked}"),
                ));
            }
        }

        Ok(command)
    }
}

/// Resolve a path to an absolute, symlink-collapsed form, tolerating
/// nonexistent trailing components.
///
/// The deepest existing prefix is canonicalised through the filesystem; the
/// missing tail is applied lexically (`.` dropped, `..` pops one component).
pub(crate) fn weak_canonicalize(path: &Path) -> io::Result<PathBuf> {
    let mut cursor = path.to_path_buf();
    let mut pending: Vec<OsString> = Vec::new();

    loop {
        match fs::canonicalize(&cursor) {
            Ok(base) => {
                let mut resolved = base;
                for segment in pending.iter().rev() {
                    if segment == ".." {
                        resolved.pop();
                    } else if segment != "." {
                        resolved.push(segment);
                    }
                }
                return Ok(resolved);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let last = match cursor.components().next_back() {
                    Some(Component::Normal(name)) => name.to_os_string(),
                    Some(Component::ParentDir) => OsString::from(".."),
                    Some(Component::CurDir) => OsString::from("."),
                    _ => return Err(err),
                };
                pending.push(last);
                if !cursor.pop() {
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn accepts_relative_path_inside_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("notes.txt"), "hello").expect("write");

        let guard = PolicyGuard::new();
        let resolved = guard
            .validate_path_in_workspace(temp.path(), Path::new("notes.txt"))
            .expect("validate");
        assert!(resolved.ends_with("notes.txt"));
        assert!(resolved.is_absolute());
    }

    #[test]
    fn tolerates_nonexistent_trailing_components() {
        let temp = tempfile::tempdir().expect("tempdir");

        let guard = PolicyGuard::new();
        let resolved = guard
            .validate_path_in_workspace(temp.path(), Path::new("missing/dir/file.txt"))
            .expect("validate");
        assert!(resolved.ends_with("missing/dir/file.txt"));
    }

    #[test]
    fn rejects_absolute_path_outside_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outside = temp.path().parent().expect("parent").join("outside.txt");

        let guard = PolicyGuard::new();
        let err = guard
            .validate_path_in_workspace(temp.path(), &outside)
            .expect_err("must reject");
        assert_eq!(err.code, "path_outside_workspace");
    }

    #[test]
    fn rejects_parent_traversal() {
        let temp = tempfile::tempdir().expect("tempdir");

        let guard = PolicyGuard::new();
        let err = guard
            .validate_path_in_workspace(temp.path(), Path::new("../escape.txt"))
            .expect_err("must reject");
        assert_eq!(err.code, "path_outside_workspace");
    }

    #[test]
    fn rejects_sibling_with_shared_string_prefix() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = temp.path().join("ws");
        fs::create_dir_all(&workspace).expect("mkdir");
        let sibling = temp.path().join("ws-extra");
        fs::create_dir_all(&sibling).expect("mkdir");

        let guard = PolicyGuard::new();
        let err = guard
            .validate_path_in_workspace(&workspace, &sibling.join("file.txt"))
            .expect_err("must reject");
        assert_eq!(err.code, "path_outside_workspace");
    }

    #[test]
    fn rejects_missing_workspace_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("nope");

        let guard = PolicyGuard::new();
        let err = guard
            .validate_path_in_workspace(&missing, Path::new("file.txt"))
            .expect_err("must reject");
        assert_eq!(err.code, "invalid_workspace_root");
    }

    #[test]
    fn blocks_denylisted_commands_case_insensitively() {
        let guard = PolicyGuard::new();

        for command in ["sudo ls", "ReBoOt now", "echo hi && rm -rf /", "dd if=/dev/zero"] {
            let err = guard.validate_command(command).expect_err("must block");
            assert_eq!(err.code, "blocked_command", "command: {command}");
        }
    }

    #[test]
    fn rejects_empty_command() {
        let guard = PolicyGuard::new();
        let err = guard.validate_command("").expect_err("must reject");
        assert_eq!(err.code, "empty_command");
    }

    #[test]
    fn allows_benign_command() {
        let guard = PolicyGuard::new();
        let ok = guard.validate_command("echo hello").expect("allow");
        assert_eq!(ok, "echo hello");
    }

    #[test]
    fn custom_policy_extends_denylist() {
        let guard = PolicyGuard::with_policy(CommandPolicy {
            blocked_substrings: vec!["curl".to_string()],
        });

        assert!(guard.validate_command("sudo ls").is_ok());
        let err = guard.validate_command("curl example.com").expect_err("block");
        assert_eq!(err.code, "blocked_command");
    }

    #[test]
    fn weak_canonicalize_collapses_dot_segments_in_missing_tail() {
        let temp = tempfile::tempdir().expect("tempdir");
        let input = temp.path().join("missing/./sub/../file.txt");

        let resolved = weak_canonicalize(&input).expect("canonicalize");
        let root = fs::canonicalize(temp.path()).expect("root");
        assert_eq!(resolved, root.join("missing/file.txt"));
    }
}
