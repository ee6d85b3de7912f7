//! Command Error Types
//!
//! Every failure the command machinery can report, whether it happens while a
//! command set is being built or while it runs.

use std::time::Duration;

use crate::workdir::WorkingDirError;

/// Message used when a failing command wrote nothing to stderr
pub const NO_ERROR_MESSAGE: &str = "No error message provided";

/// Error types for command parsing, validation and execution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// Parsing produced no tokens, or the quoting was unbalanced
    #[error("Malformed command {raw:?}: {reason}")]
    MalformedCommand { raw: String, reason: String },

    /// No commands were supplied and the policy requires at least one
    #[error("command list should have at least 1 item, got 0")]
    EmptyCommandSet,

    /// Program does not resolve on the search path
    #[error("Command '{name}' not found in system PATH")]
    ProgramNotFound { name: String },

    /// Program is on the search path but not whitelisted
    #[error("Command '{name}' is not in the permitted commands list")]
    ProgramNotPermitted { name: String },

    /// Child process outlived its timeout and was killed
    #[error("Command timed out after {elapsed:?}: {command}")]
    TimedOut { command: String, elapsed: Duration },

    /// Child process exited with a nonzero status
    #[error("Command failed: {command}\nError: {stderr}")]
    Failed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// The OS refused to start the child process
    #[error("Command could not be launched: {command}: {reason}")]
    NotLaunched { command: String, reason: String },

    /// Timeout was zero, negative or not a number
    #[error("Timeout must be greater than 0, got {0}")]
    InvalidTimeout(f64),

    /// Configured working directory failed validation
    #[error(transparent)]
    InvalidWorkingDir(#[from] WorkingDirError),
}

impl CommandError {
    /// Whether this error was raised while building a command set
    /// (as opposed to while running one)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MalformedCommand { .. }
                | Self::EmptyCommandSet
                | Self::ProgramNotFound { .. }
                | Self::ProgramNotPermitted { .. }
                | Self::InvalidTimeout(_)
                | Self::InvalidWorkingDir(_)
        )
    }

    /// Program name or command line the error is about, if any
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::MalformedCommand { raw, .. } => Some(raw),
            Self::ProgramNotFound { name } | Self::ProgramNotPermitted { name } => Some(name),
            Self::TimedOut { command, .. }
            | Self::Failed { command, .. }
            | Self::NotLaunched { command, .. } => Some(command),
            Self::EmptyCommandSet | Self::InvalidTimeout(_) | Self::InvalidWorkingDir(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_program() {
        let err = CommandError::ProgramNotFound {
            name: "invalid_command".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Command 'invalid_command' not found in system PATH"
        );

        let err = CommandError::ProgramNotPermitted {
            name: "rm".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Command 'rm' is not in the permitted commands list"
        );
    }

    #[test]
    fn test_failed_message_includes_stderr() {
        let err = CommandError::Failed {
            command: "git status".to_string(),
            exit_code: 128,
            stderr: "fatal: not a git repository".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Command failed: git status"));
        assert!(msg.contains("fatal: not a git repository"));
    }

    #[test]
    fn test_validation_classification() {
        assert!(CommandError::EmptyCommandSet.is_validation());
        assert!(CommandError::InvalidTimeout(0.0).is_validation());
        assert!(!CommandError::TimedOut {
            command: "sleep 5".to_string(),
            elapsed: Duration::from_secs(2),
        }
        .is_validation());
        assert!(!CommandError::NotLaunched {
            command: "gone".to_string(),
            reason: "No such file or directory".to_string(),
        }
        .is_validation());
    }

    #[test]
    fn test_subject() {
        let err = CommandError::ProgramNotFound {
            name: "nonexistent".to_string(),
        };
        assert_eq!(err.subject(), Some("nonexistent"));
        assert_eq!(CommandError::EmptyCommandSet.subject(), None);
    }
}
