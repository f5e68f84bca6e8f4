//! Error taxonomy for the orchestration core.
//!
//! Every failure an operation can produce is captured here and returned as
//! part of the operation's completion result. Nothing in this crate panics
//! across the public API.

use thiserror::Error;

use crate::tools::ToolId;

/// Failure modes surfaced by workflow operations.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The external tool the operation depends on was never located.
    #[error("required tool '{tool}' was not found on this system")]
    ToolUnavailable { tool: ToolId },

    /// The operation was requested out of its required order, or while
    /// another operation on the same ROM was still in flight.
    #[error("operation not currently allowed: {reason}")]
    PreconditionNotMet { reason: String },

    /// The external tool ran but exited unsuccessfully. `code` is `None`
    /// when the process was terminated by a signal.
    #[error("external tool exited with status {code:?}")]
    ProcessFailed { code: Option<i32> },

    /// The tool's output did not contain the markers the parser expected.
    #[error("could not parse tool output: {stage}")]
    ParseFailed { stage: &'static str },

    /// Filesystem step (backup copy, directory creation) failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// Shorthand for a precondition failure with a formatted reason.
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionNotMet {
            reason: reason.into(),
        }
    }
}

/// Convenient crate-wide result type.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorkflowError::ToolUnavailable {
            tool: ToolId::Ndstool,
        };
        assert!(err.to_string().contains("ndstool"));

        let err = WorkflowError::ProcessFailed { code: Some(2) };
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: WorkflowError = io.into();
        assert!(matches!(err, WorkflowError::Io(_)));
    }
}
