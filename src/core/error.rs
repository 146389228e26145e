//! Categorised failure values with stable codes.
//!
//! Every fallible operation in the harness returns `Result<T, AgentError>`;
//! there is no exceptional control flow. Codes are stable strings and form
//! part of the public contract (tests assert against them), while categories
//! segment the cause and drive exit-code mapping at the outer boundary.

/// Broad cause of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller supplied invalid input (CLI flag, request field, path).
    Input,
    /// A tool or pipeline step ran and failed.
    Execution,
    /// Reserved for upstream provider failures; unused by the core.
    Provider,
    /// A policy check rejected the operation (confinement, denylist).
    Policy,
    /// An infrastructure or logic breakdown inside the harness.
    Internal,
}

/// The standard error payload carried through the whole harness.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct AgentError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    pub hint: Option<String>,
}

impl AgentError {
    pub fn new(
        category: ErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn input(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Input, code, message)
    }

    pub fn execution(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Execution, code, message)
    }

    pub fn policy(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Policy, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, code, message)
    }

    /// Attach a user-facing hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Shorthand result alias used across the harness.
pub type Result<T, E = AgentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_code_and_message() {
        let err = AgentError::policy("blocked_command", "Command contains blocked operation: sudo");
        assert_eq!(
            err.to_string(),
            "[blocked_command] Command contains blocked operation: sudo"
        );
    }

    #[test]
    fn hint_is_optional() {
        let plain = AgentError::input("bounds_error", "--max-steps out of bounds");
        assert_eq!(plain.hint, None);

        let hinted = plain.clone().with_hint("Must be between 1 and 1000.");
        assert_eq!(hinted.hint.as_deref(), Some("Must be between 1 and 1000."));
        assert_eq!(hinted.code, "bounds_error");
    }

    #[test]
    fn categories_are_preserved() {
        assert_eq!(
            AgentError::execution("command_failed", "boom").category,
            ErrorCategory::Execution
        );
        assert_eq!(
            AgentError::internal("spawn_failed", "boom").category,
            ErrorCategory::Internal
        );
    }
}
