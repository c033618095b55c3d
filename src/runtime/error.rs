//! Runtime client errors and connection health classification

use serde::{Deserialize, Serialize};

/// Category of a failure reported by the runtime daemon or its transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Daemon unreachable or the connection dropped
    Unavailable,
    NotFound,
    AlreadyExists,
    /// Operation not valid in the task's current state (e.g. already exited)
    FailedPrecondition,
    InvalidArgument,
    PermissionDenied,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::FailedPrecondition => "failed precondition",
            Self::InvalidArgument => "invalid argument",
            Self::PermissionDenied => "permission denied",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", kind.as_str())]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_unavailable(&self) -> bool {
        classify(self) == ErrorClass::Unavailable
    }
}

/// Outcome of classifying a runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Connection-level: the task may still be alive, reconnect and retry
    Unavailable,
    /// Task-level or request-level: never retried
    Other,
}

/// Decide whether an error means "the daemon is unreachable" or something
/// about the task itself went wrong.
pub fn classify(err: &RuntimeError) -> ErrorClass {
    match err.kind {
        ErrorKind::Unavailable => ErrorClass::Unavailable,
        ErrorKind::NotFound
        | ErrorKind::AlreadyExists
        | ErrorKind::FailedPrecondition
        | ErrorKind::InvalidArgument
        | ErrorKind::PermissionDenied
        | ErrorKind::Internal => ErrorClass::Other,
    }
}
