//! Unified error handling for the data-access layer.
//!
//! Provides the single error type returned to callers of the repository.
//! Transport layers map it onto their own status codes using [`AppError::code`]
//! and [`AppError::user_message`].

use domain::DomainError;
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Caller errors
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    // Store errors
    #[error("Store error: {0}")]
    Store(String),

    #[cfg(feature = "dynamodb")]
    #[error("DynamoDB error")]
    DynamoDb(#[from] aws_sdk_dynamodb::Error),

    #[error("Malformed stored item")]
    Serialization(#[from] serde_json::Error),

    // Internal
    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Store(_) => "STORE_ERROR",
            #[cfg(feature = "dynamodb")]
            AppError::DynamoDb(_) => "STORE_ERROR",
            AppError::Serialization(_) => "DATA_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error was caused by the caller's request
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::NotFound(_))
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            // Show full message for client errors
            AppError::Validation(msg) | AppError::NotFound(msg) => msg.clone(),

            // Hide details for internal errors
            AppError::Store(msg) => {
                tracing::error!("Store error: {}", msg);
                "A storage error occurred".to_string()
            }
            #[cfg(feature = "dynamodb")]
            AppError::DynamoDb(e) => {
                tracing::error!("DynamoDB error: {:?}", e);
                "A storage error occurred".to_string()
            }
            AppError::Serialization(e) => {
                tracing::error!("Malformed stored item: {:?}", e);
                "An internal error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
        }
    }
}

// =============================================================================
// Domain Error Conversion
// =============================================================================

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(rejection) => AppError::Validation(rejection.to_string()),
            DomainError::NotFound(msg) => AppError::NotFound(msg),
        }
    }
}

impl From<domain::InvalidUserInput> for AppError {
    fn from(rejection: domain::InvalidUserInput) -> Self {
        AppError::Validation(rejection.to_string())
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Convenience constructors
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        AppError::Store(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
