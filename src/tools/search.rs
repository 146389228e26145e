//! Substring search over workspace text files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::debug;
use walkdir::WalkDir;

use super::{is_probably_binary, ToolHost};
use crate::core::error::{AgentError, Result};
use crate::core::types::ToolResult;

const TOOL: &str = "search";
/// Files larger than this are skipped entirely.
const MAX_FILE_BYTES: u64 = 1024 * 1024;
/// Matched lines longer than this are truncated with `...`.
const MAX_LINE_CHARS: usize = 240;

/// Parameters for a search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Substring to look for; must be non-empty.
    pub pattern: String,
    /// File or directory scope, resolved against the workspace root.
    pub scope: PathBuf,
    pub max_matches: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            scope: PathBuf::from("."),
            max_matches: 20,
        }
    }
}

impl ToolHost {
    /// Scan the scope for lines containing the pattern.
    ///
    /// Output starts with a `pattern="…" scope="…" matches=N` header followed
    /// by `<file>:<line>:<trimmed-line>` entries in discovery order, or
    /// `No matches found.`. Oversized and binary files are skipped;
    /// unreadable entries are skipped silently.
    pub fn search(&self, workspace_root: &Path, request: &SearchRequest) -> Result<ToolResult> {
        if request.pattern.is_empty() {
            return Err(AgentError::input(
                "empty_search_pattern",
                "Search pattern cannot be empty.",
            ));
        }
        if request.max_matches == 0 {
            return Err(AgentError::input(
                "invalid_search_limit",
                "max_matches must be greater than zero.",
            ));
        }

        let started = Instant::now();
        let scope_path = self.resolve_path(workspace_root, &request.scope)?;
        debug!(pattern = %request.pattern, scope = %scope_path.display(), "searching");

        if !scope_path.exists() {
            return Ok(ToolResult::failure(
                TOOL,
                format!("Scope does not exist: {}", scope_path.display()),
            ));
        }

        let files: Vec<PathBuf> = if scope_path.is_file() {
            vec![scope_path.clone()]
        } else if scope_path.is_dir() {
            // File-name ordering keeps discovery order stable for a tree.
            WalkDir::new(&scope_path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect()
        } else {
            return Ok(ToolResult::failure(
                TOOL,
                format!(
                    "Scope is neither a file nor directory: {}",
                    scope_path.display()
                ),
            ));
        };

        let mut matches = 0usize;
        let mut body = String::new();
        'files: for file in &files {
            let Ok(metadata) = file.metadata() else {
                continue;
            };
            if metadata.len() > MAX_FILE_BYTES {
                continue;
            }
            if is_probably_binary(file) {
                continue;
            }
            let Ok(handle) = File::open(file) else {
                continue;
            };

            for (index, line) in BufReader::new(handle).lines().enumerate() {
                let Ok(line) = line else {
                    continue;
                };
                if !line.contains(&request.pattern) {
                    continue;
                }
                body.push_str(&format!(
                    "{}:{}:{}\n",
                    file.display(),
                    index + 1,
                    trim_line(&line)
                ));
                matches += 1;
                if matches >= request.max_matches {
                    break 'files;
                }
            }
        }

        let mut output = format!(
            "pattern=\"{}\" scope=\"{}\" matches={}\n",
            request.pattern,
            scope_path.display(),
            matches
        );
        if matches == 0 {
            output.push_str("No matches found.");
        } else {
            output.push_str(&body);
        }

        Ok(ToolResult::success(
            TOOL,
            output,
            started.elapsed().as_millis() as u64,
        ))
    }
}

fn trim_line(line: &str) -> String {
    if line.chars().count() <= MAX_LINE_CHARS {
        return line.to_string();
    }
    let mut trimmed: String = line.chars().take(MAX_LINE_CHARS).collect();
    trimmed.push_str("...");
    trimmed
}
