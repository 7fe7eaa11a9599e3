//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::input::{NewUser, UserChanges};

/// User domain entity, as persisted in the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Date of birth at midnight UTC
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::timestamp::option"
    )]
    pub dob: Option<DateTime<Utc>>,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    /// Unset until the first update
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::timestamp::option"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Build a freshly created user. `updated_at` stays unset.
    pub fn create(id: String, new_user: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new_user.name,
            address: new_user.address,
            description: new_user.description,
            dob: Some(new_user.dob),
            created_at: now,
            updated_at: None,
        }
    }

    /// Merge validated changes into this user.
    ///
    /// Fields missing from `changes` keep their stored value; `id` and
    /// `created_at` are never touched.
    pub fn apply(&mut self, changes: UserChanges, now: DateTime<Utc>) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(address) = changes.address {
            self.address = address;
        }
        if let Some(dob) = changes.dob {
            self.dob = Some(dob);
        }
        if let Some(description) = changes.description {
            self.description = Some(description);
        }
        self.updated_at = Some(now);
    }
}

/// One page of users plus the token for the next page, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPage {
    pub items: Vec<User>,
    /// Opaque continuation token
    pub cursor: Option<String>,
}
