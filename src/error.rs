// Error taxonomy for pot operations
//
// Every RPC-facing failure is one of three kinds. Call sites pick the kind
// from where in the operation the failure happened, so there is no blanket
// From<rusqlite::Error> conversion here.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PotError {
    /// Malformed request, over-withdrawal, or input rejected by storage
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Pot absent, or the final commit did not go through
    #[error("not found: {0}")]
    NotFound(String),

    /// Transaction infrastructure or ledger read failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl PotError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        PotError::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        PotError::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PotError::Internal(msg.into())
    }

    /// Short machine-readable code, used in API responses
    pub fn code(&self) -> &'static str {
        match self {
            PotError::InvalidArgument(_) => "invalid_argument",
            PotError::NotFound(_) => "not_found",
            PotError::Internal(_) => "internal",
        }
    }
}

pub type PotResult<T> = std::result::Result<T, PotError>;
