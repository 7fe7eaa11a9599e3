//! Domain-level constants.
//!
//! These constants define business rules and validation requirements.

// =============================================================================
// Validation
// =============================================================================

/// Maximum user name length, in characters
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum address length, in characters
pub const MAX_ADDRESS_LENGTH: usize = 250;

/// Maximum description length, in characters
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Accepted shape for a date of birth
pub const DATE_OF_BIRTH_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Pagination
// =============================================================================

/// Maximum number of keys discovered per list page.
///
/// Matches the number of keys a single batch get can hydrate.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size used when a caller does not ask for one
pub const DEFAULT_PAGE_SIZE: u32 = 20;
