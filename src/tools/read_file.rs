//! Whole-file reads confined to the workspace.

use std::fs;
use std::path::Path;
use std::time::Instant;

use tracing::debug;

use super::{is_probably_binary, ToolHost};
use crate::core::error::Result;
use crate::core::types::ToolResult;

const TOOL: &str = "read_file";

impl ToolHost {
    /// Read a regular text file inside the workspace.
    ///
    /// Directories, special files, binary files and I/O failures yield a
    /// failed `ToolResult`; only policy violations are hard errors.
    pub fn read_file(&self, workspace_root: &Path, path: &Path) -> Result<ToolResult> {
        let started = Instant::now();
        let file_path = self.resolve_path(workspace_root, path)?;
        debug!(path = %file_path.display(), "reading file");

        if !file_path.exists() {
            return Ok(ToolResult::failure(
                TOOL,
                format!("File does not exist: {}", file_path.display()),
            ));
        }
        if !file_path.is_file() {
            return Ok(ToolResult::failure(
                TOOL,
                format!("Path is not a regular file: {}", file_path.display()),
            ));
        }
        if is_probably_binary(&file_path) {
            return Ok(ToolResult::failure(
                TOOL,
                format!("Refusing to read binary file: {}", file_path.display()),
            ));
        }

        match fs::read_to_string(&file_path) {
            Ok(contents) => Ok(ToolResult::success(
                TOOL,
                contents,
                started.elapsed().as_millis() as u64,
            )),
            Err(err) => Ok(ToolResult::failure(
                TOOL,
                format!("I/O error while reading file {}: {err}", file_path.display()),
            )),
        }
    }
}
