//! Repository layer for data access.

mod cursor;
mod user_repository;

pub use cursor::{decode_cursor, encode_cursor};
pub use user_repository::{DocumentUserRepository, UserRepository, ID_ATTRIBUTE, NAME_ATTRIBUTE};

#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
