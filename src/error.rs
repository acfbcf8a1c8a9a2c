//! Error types for the sync server.

use crate::protocol::RecordId;
use thiserror::Error;

/// Main error type for server operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("record not found: {0}")]
    NotFound(RecordId),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Stable code carried in the `errorAck` wire payload.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Error::BadRequest(_) => "BAD_REQUEST",
            Error::Io(_) => "IO",
            Error::Serialization(_) => "SERIALIZATION",
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;
