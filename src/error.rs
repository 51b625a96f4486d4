//! Errors that can be returned by this crate

use thiserror::Error;

use crate::task::TaskId;

/// Everything that can go wrong in the agenda core.
///
/// None of these is fatal: callers that act on behalf of the user surface them (usually as an alert),
/// background jobs only log them.
#[derive(Debug, Error)]
pub enum AgendaError {
    #[error("unable to read key {key:?} from the store: {reason}")]
    StorageRead { key: String, reason: String },

    #[error("unable to write key {key:?} to the store: {reason}")]
    StorageWrite { key: String, reason: String },

    /// A stored value could not be parsed
    #[error("corrupt data under key {key:?}: {reason}")]
    CorruptState { key: String, reason: String },

    #[error("invalid backup: {0}")]
    InvalidBackupFormat(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("no task with id {0}")]
    NotFound(TaskId),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for AgendaError {
    fn from(err: reqwest::Error) -> Self {
        AgendaError::Network(err.to_string())
    }
}

pub type AgendaResult<T> = Result<T, AgendaError>;
