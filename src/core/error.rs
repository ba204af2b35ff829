//! Hard-error taxonomy
//!
//! Only caller-input problems, referential problems and collaborator failures
//! are errors. Business denials (bad credentials, disabled token, failed
//! authorization, ...) are reported as [`crate::TokenStatus`] values instead.

use crate::core::storage::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IamError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Wire-level status code for a hard error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    AlreadyExists,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IamError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        IamError::InvalidArgument(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        IamError::NotFound(msg.into())
    }

    pub(crate) fn failed_precondition(msg: impl Into<String>) -> Self {
        IamError::FailedPrecondition(msg.into())
    }

    /// Map this error onto the wire status taxonomy
    pub fn code(&self) -> ErrorCode {
        match self {
            IamError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            IamError::NotFound(_) => ErrorCode::NotFound,
            IamError::FailedPrecondition(_) => ErrorCode::FailedPrecondition,
            IamError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            IamError::Storage(StoreError::PartitionMissing(_)) => ErrorCode::FailedPrecondition,
            IamError::Storage(StoreError::Conflict(_)) => ErrorCode::AlreadyExists,
            IamError::Storage(_) | IamError::Serialization(_) | IamError::Config(_) => {
                ErrorCode::Internal
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, IamError>;
