//! Common error types and handling for Paperchat

use crate::state::StateError;

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Paperchat crates
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid resource identifier: must not be empty")]
    InvalidResourceId,

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Cannot change threads while a response is streaming; stop it first")]
    ThreadSwitchDuringStream,

    #[error("The last remaining thread cannot be deleted")]
    LastThreadProtected,

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Stream transport failure: {0}")]
    StreamTransportFailure(String),

    #[error("Corrupt data: {0}")]
    CorruptData(String),

    #[error(transparent)]
    InvalidTransition(#[from] StateError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Get the error code for UI and log reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Unexpected(_) => "UNEXPECTED_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::InvalidResourceId => "INVALID_RESOURCE_ID",
            Error::ThreadNotFound(_) => "THREAD_NOT_FOUND",
            Error::ThreadSwitchDuringStream => "THREAD_SWITCH_DURING_STREAM",
            Error::LastThreadProtected => "LAST_THREAD_PROTECTED",
            Error::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            Error::StreamTransportFailure(_) => "STREAM_TRANSPORT_FAILURE",
            Error::CorruptData(_) => "CORRUPT_DATA",
            Error::InvalidTransition(_) => "INVALID_TRANSITION",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
        }
    }

    /// True when the change was applied in memory but may not survive a reload
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Error::PersistenceFailure(_) | Error::Serialization(_))
    }

    /// True when the last turn failed and can be retried
    pub fn is_stream_failure(&self) -> bool {
        matches!(self, Error::StreamTransportFailure(_))
    }
}
