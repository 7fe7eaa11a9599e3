//! User service configuration.

use std::env;

use common::{DynamoDbConfig, ServiceConfig, UsersDbConfig};

/// User service configuration.
#[derive(Debug, Clone, Default)]
pub struct UserServiceConfig {
    /// Table and index names
    pub users_db: UsersDbConfig,
    /// DynamoDB client overrides
    pub dynamodb: DynamoDbConfig,
    /// Logging settings
    pub service: ServiceConfig,
}

impl UserServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());

        Self {
            users_db: UsersDbConfig {
                table_name: non_empty("USERS_TABLE_NAME")
                    .unwrap_or(defaults.users_db.table_name),
                name_index: non_empty("USERS_NAME_INDEX")
                    .unwrap_or(defaults.users_db.name_index),
            },
            dynamodb: DynamoDbConfig {
                region: non_empty("AWS_REGION"),
                endpoint_url: non_empty("DYNAMODB_ENDPOINT_URL"),
                batch_get_max_retries: non_empty("DYNAMODB_BATCH_GET_MAX_RETRIES")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.dynamodb.batch_get_max_retries),
            },
            service: ServiceConfig {
                log_level: non_empty("LOG_LEVEL").unwrap_or(defaults.service.log_level),
            },
        }
    }
}
