//! Domain-level errors.
//!
//! These errors represent business rule violations and domain logic failures.
//! They are independent of infrastructure concerns (transport, storage).

use thiserror::Error;

use crate::constants::{MAX_ADDRESS_LENGTH, MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};

/// Reasons a caller-supplied user record is rejected.
///
/// The display text is the message surfaced to callers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidUserInput {
    #[error("The name must be specified")]
    MissingName,

    #[error("The date of birth must be specified")]
    MissingDateOfBirth,

    #[error("The address must be specified")]
    MissingAddress,

    #[error("An invalid date of birth was provided")]
    InvalidDateOfBirth,

    #[error("The address max length is {} characters", MAX_ADDRESS_LENGTH)]
    AddressTooLong,

    #[error("The name max length is {} characters", MAX_NAME_LENGTH)]
    NameTooLong,

    #[error("The description max length is {} characters", MAX_DESCRIPTION_LENGTH)]
    DescriptionTooLong,
}

/// Domain-specific errors for business rule violations.
#[derive(Error, Debug, Clone)]
pub enum DomainError {
    /// Validation failed for a field or input
    #[error(transparent)]
    Validation(#[from] InvalidUserInput),

    /// Entity not found
    #[error("{0}")]
    NotFound(String),
}

impl DomainError {
    /// Create a not found error for a user id
    pub fn user_not_found(id: &str) -> Self {
        DomainError::NotFound(format!("Could not find user with id {}", id))
    }
}
