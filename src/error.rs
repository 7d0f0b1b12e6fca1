//! Error taxonomy for command dispatch.
//!
//! None of these are fatal. The daemon logs them and keeps accepting
//! commands; nothing here is ever broadcast as an event.

use crate::variables::VarType;

/// Errors a dispatched command can report to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// No handler is registered under this name.
    UnknownCommand(String),
    /// `set` value does not parse as the variable's declared type.
    InvalidAssignment {
        /// Target variable.
        name: String,
        /// Declared type of the variable.
        expected: VarType,
        /// The value as received.
        raw: String,
    },
    /// Arguments do not match the command's syntax.
    MalformedArguments {
        /// Command name.
        command: &'static str,
        /// What was wrong.
        reason: String,
    },
    /// A subprocess could not be spawned.
    SubprocessFailure(String),
    /// The script engine raised an error or is unavailable.
    ScriptFailure(String),
}

impl CommandError {
    pub(crate) fn malformed(command: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedArguments {
            command,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCommand(name) => write!(f, "Unknown command: {name}"),
            Self::InvalidAssignment {
                name,
                expected,
                raw,
            } => write!(f, "Cannot assign '{raw}' to {expected} variable '{name}'"),
            Self::MalformedArguments { command, reason } => {
                write!(f, "Malformed arguments to '{command}': {reason}")
            }
            Self::SubprocessFailure(msg) => write!(f, "Subprocess failure: {msg}"),
            Self::ScriptFailure(msg) => write!(f, "Script failure: {msg}"),
        }
    }
}

impl std::error::Error for CommandError {}
