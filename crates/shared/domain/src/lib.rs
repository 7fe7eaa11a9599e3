//! Domain layer - Core business entities and value objects.
//!
//! This crate contains pure domain logic with no infrastructure dependencies:
//! the user entity, the rules caller input must satisfy, and the errors
//! raised when it does not.

pub mod constants;
pub mod error;
pub mod input;
pub mod timestamp;
pub mod user;

pub use constants::*;
pub use error::{DomainError, InvalidUserInput};
pub use input::{NewUser, UserChanges, UserInput};
pub use user::{User, UserPage};
