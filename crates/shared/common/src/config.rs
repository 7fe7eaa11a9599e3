//! Shared configuration structures.

use serde::{Deserialize, Serialize};

/// Base service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Log level
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Names of the store objects backing the user repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UsersDbConfig {
    /// Table holding full user records, keyed by `id`
    pub table_name: String,
    /// Secondary index keyed by `name`
    pub name_index: String,
}

impl Default for UsersDbConfig {
    fn default() -> Self {
        Self {
            table_name: "users".to_string(),
            name_index: "name-index".to_string(),
        }
    }
}

/// DynamoDB client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DynamoDbConfig {
    /// Region override; the default provider chain is used when unset
    pub region: Option<String>,
    /// Endpoint override, e.g. "http://localhost:8000" for DynamoDB Local
    pub endpoint_url: Option<String>,
    /// How many times unprocessed batch get keys are re-submitted
    pub batch_get_max_retries: u32,
}

impl Default for DynamoDbConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            batch_get_max_retries: 3,
        }
    }
}
