//! Errors returned by job handlers, classified for the retry decision.

use std::fmt;

use crate::error::FanoutError;

/// Classification of a handler failure.
///
/// - Transient: worth another attempt (network, rate limit, busy post).
/// - Permanent: retrying cannot help (unknown post, bad payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Error returned by a `JobHandler`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.kind == ErrorKind::Permanent
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl std::error::Error for JobError {}

impl From<FanoutError> for JobError {
    fn from(err: FanoutError) -> Self {
        match err {
            FanoutError::Adapter(_)
            | FanoutError::DispatchInProgress(_)
            | FanoutError::Store(_)
            | FanoutError::Scheduler(_) => JobError::transient(err.to_string()),
            _ => JobError::permanent(err.to_string()),
        }
    }
}
