//! Error types for command execution.
//!
//! Every failure a command can run into is represented by the [`Error`] enum.
//! Errors are:
//! - **Structured**: each variant carries typed fields for its details
//! - **Classified**: [`Error::kind`] maps every variant onto an [`ErrorKind`]
//! - **Serializable**: can be handed to clients as JSON
//!
//! Nothing leaves the execution core as a panic. The core converts every
//! failure into one of these values plus diagnostics text.

use std::collections::TryReserveError;

use serde::{Deserialize, Serialize};

use crate::node::NodeKind;

/// Result type for Keystone operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
///
/// | Kind | Detected | Lock touched? |
/// |------|----------|---------------|
/// | `Precondition` | before the lock is acquired | no |
/// | `Validation` | while the operation runs | released normally |
/// | `Exhaustion` | while the operation runs | released immediately |
/// | `Internal` | at the failure boundary | released immediately |
/// | `Transport` | during the output phase | released by the output phase |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing resource, incompatible mode, missing privilege, lock timeout.
    Precondition,
    /// Wrong node kind, malformed arguments, query failures.
    Validation,
    /// Out of memory.
    Exhaustion,
    /// A fault inside the operation (panic, broken invariant).
    Internal,
    /// Serialization or I/O failure while writing output.
    Transport,
}

/// Command execution errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    // ==================== Precondition ====================
    /// The command needs an open resource but none is bound to the context
    #[error("no database opened")]
    NoResource,

    /// A mutating command was submitted in a mode that does not allow updates
    #[error("updates are not allowed in {mode} mode")]
    ModeConflict { mode: String },

    /// The caller lacks the privilege the command requires
    #[error("{command} requires {required} privilege")]
    PermissionDenied { command: String, required: String },

    /// Waiting for the resource lock exceeded the configured timeout
    #[error("timed out after {waited_ms}ms waiting for {intent} lock")]
    LockTimeout { intent: String, waited_ms: u64 },

    /// Invalid configuration
    #[error("configuration error: {reason}")]
    Config { reason: String },

    // ==================== Validation ====================
    /// A query result contained a node of the wrong kind
    #[error("result node at position {position} is {actual}, expected {expected}")]
    WrongNodeKind {
        position: usize,
        expected: NodeKind,
        actual: NodeKind,
    },

    /// Malformed command arguments
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The query evaluator rejected the query
    #[error("{message}")]
    Query { message: String },

    /// The operation reported a failure through its diagnostics
    #[error("{message}")]
    Rejected { command: String, message: String },

    /// A nested command needs a stronger lock than its parent holds
    #[error("{command} cannot update the database inside a read-only command")]
    NestedConflict { command: String },

    // ==================== Exhaustion ====================
    /// Memory could not be allocated
    #[error("out of main memory")]
    OutOfMemory,

    // ==================== Internal ====================
    /// Unexpected fault inside a command
    #[error("error while executing {command}: {reason}")]
    Internal { command: String, reason: String },

    // ==================== Transport ====================
    /// I/O error on the output channel
    #[error("I/O error: {reason}")]
    Io { reason: String },

    /// The serializer failed to render a result
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoResource
            | Error::ModeConflict { .. }
            | Error::PermissionDenied { .. }
            | Error::LockTimeout { .. }
            | Error::Config { .. } => ErrorKind::Precondition,
            Error::WrongNodeKind { .. }
            | Error::InvalidArgument { .. }
            | Error::Query { .. }
            | Error::Rejected { .. }
            | Error::NestedConflict { .. } => ErrorKind::Validation,
            Error::OutOfMemory => ErrorKind::Exhaustion,
            Error::Internal { .. } => ErrorKind::Internal,
            Error::Io { .. } | Error::Serialization { .. } => ErrorKind::Transport,
        }
    }

    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::Query`].
    pub fn query(message: impl Into<String>) -> Self {
        Error::Query {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::Config`].
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            reason: err.to_string(),
        }
    }
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization {
            reason: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::config(err.to_string())
    }
}
