//! Caller-supplied user input and its validation rules.
//!
//! Validation is pure: it either produces a normalized record or names the
//! first rule the input breaks. Empty strings count as absent fields.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::constants::{
    DATE_OF_BIRTH_FORMAT, MAX_ADDRESS_LENGTH, MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH,
};
use crate::error::InvalidUserInput;

// The validator derive compares lengths as `u64`.
const MAX_NAME_LENGTH_U64: u64 = MAX_NAME_LENGTH as u64;
const MAX_ADDRESS_LENGTH_U64: u64 = MAX_ADDRESS_LENGTH as u64;
const MAX_DESCRIPTION_LENGTH_U64: u64 = MAX_DESCRIPTION_LENGTH as u64;

static DATE_OF_BIRTH_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid date of birth pattern"));

/// Length rules in the order they are reported.
const LENGTH_RULES: [(&str, InvalidUserInput); 3] = [
    ("address", InvalidUserInput::AddressTooLong),
    ("name", InvalidUserInput::NameTooLong),
    ("description", InvalidUserInput::DescriptionTooLong),
];

/// Untrusted user record as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserInput {
    /// Display name
    #[validate(length(max = MAX_NAME_LENGTH_U64))]
    pub name: Option<String>,
    /// Postal address
    #[validate(length(max = MAX_ADDRESS_LENGTH_U64))]
    pub address: Option<String>,
    /// Free text description
    #[validate(length(max = MAX_DESCRIPTION_LENGTH_U64))]
    pub description: Option<String>,
    /// Date of birth, `YYYY-MM-DD`
    pub dob: Option<String>,
}

/// Validated, normalized fields of a [`UserInput`].
///
/// `None` means the caller did not supply the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub dob: Option<DateTime<Utc>>,
}

/// Validated fields required to create a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub address: String,
    pub description: Option<String>,
    pub dob: DateTime<Utc>,
}

impl UserInput {
    /// Check the fields that are present and normalize them.
    ///
    /// Rules are checked in order (date of birth, address, name,
    /// description) and the first violation is returned.
    pub fn validated(&self) -> Result<UserChanges, InvalidUserInput> {
        let dob = present(&self.dob).map(parse_date_of_birth).transpose()?;

        if let Err(errors) = self.validate() {
            let fields = errors.field_errors();
            if let Some((_, rejection)) = LENGTH_RULES
                .iter()
                .find(|(field, _)| fields.contains_key(*field))
            {
                return Err(*rejection);
            }
        }

        Ok(UserChanges {
            name: present(&self.name).map(str::to_owned),
            address: present(&self.address).map(str::to_owned),
            description: present(&self.description).map(str::to_owned),
            dob,
        })
    }

    /// Validate input for creation: name, date of birth and address are
    /// required (checked in that order) before the field rules run.
    pub fn validated_for_create(&self) -> Result<NewUser, InvalidUserInput> {
        require(&self.name, InvalidUserInput::MissingName)?;
        require(&self.dob, InvalidUserInput::MissingDateOfBirth)?;
        require(&self.address, InvalidUserInput::MissingAddress)?;

        let changes = self.validated()?;
        Ok(NewUser {
            name: changes.name.ok_or(InvalidUserInput::MissingName)?,
            address: changes.address.ok_or(InvalidUserInput::MissingAddress)?,
            description: changes.description,
            dob: changes.dob.ok_or(InvalidUserInput::MissingDateOfBirth)?,
        })
    }
}

/// Parse a strict `YYYY-MM-DD` date into midnight UTC of that day.
pub fn parse_date_of_birth(raw: &str) -> Result<DateTime<Utc>, InvalidUserInput> {
    if !DATE_OF_BIRTH_SHAPE.is_match(raw) {
        return Err(InvalidUserInput::InvalidDateOfBirth);
    }

    let date = NaiveDate::parse_from_str(raw, DATE_OF_BIRTH_FORMAT)
        .map_err(|_| InvalidUserInput::InvalidDateOfBirth)?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or(InvalidUserInput::InvalidDateOfBirth)?;

    Ok(Utc.from_utc_datetime(&midnight))
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

fn require(field: &Option<String>, missing: InvalidUserInput) -> Result<(), InvalidUserInput> {
    present(field).map(|_| ()).ok_or(missing)
}
