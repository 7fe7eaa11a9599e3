//! User Service Library
//!
//! Data-access layer for users stored in a document store: validation of
//! caller input, create/update/delete/get, and paginated listing that finds
//! keys through an index or scan and then batch-loads the full records.

pub mod config;
pub mod infra;
pub mod repository;

use std::sync::Arc;

use serde_json::Value;

use common::AppResult;
use domain::UserInput;

use crate::config::UserServiceConfig;
use crate::repository::{DocumentUserRepository, UserRepository};

/// Build a repository backed by DynamoDB (for the CLI and embedding callers).
#[cfg(feature = "dynamodb")]
pub async fn connect_repository(config: &UserServiceConfig) -> Arc<dyn UserRepository> {
    let store = infra::DynamoDbStore::connect(&config.dynamodb).await;
    Arc::new(DocumentUserRepository::new(
        Arc::new(store),
        config.users_db.clone(),
    ))
}

/// Build a repository backed by an in-memory store.
pub fn memory_repository(config: &UserServiceConfig) -> Arc<dyn UserRepository> {
    let store = infra::MemoryStore::for_users(&config.users_db);
    Arc::new(DocumentUserRepository::new(
        Arc::new(store),
        config.users_db.clone(),
    ))
}

/// A single repository operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Create(UserInput),
    Update {
        id: String,
        input: UserInput,
    },
    Get {
        id: String,
    },
    Delete {
        id: String,
    },
    List {
        query: Option<String>,
        limit: u32,
        cursor: Option<String>,
    },
}

/// Run a command against a repository and render the result as JSON.
///
/// Deleting a user that does not exist renders as `null`.
pub async fn execute(repo: &dyn UserRepository, command: UserCommand) -> AppResult<Value> {
    let output = match command {
        UserCommand::Create(input) => serde_json::to_value(repo.create_user(input).await?)?,
        UserCommand::Update { id, input } => {
            serde_json::to_value(repo.update_user(&id, input).await?)?
        }
        UserCommand::Get { id } => serde_json::to_value(repo.get_user(&id).await?)?,
        UserCommand::Delete { id } => serde_json::to_value(repo.delete_user(&id).await?)?,
        UserCommand::List {
            query,
            limit,
            cursor,
        } => serde_json::to_value(repo.list_users(query, limit, cursor).await?)?,
    };
    Ok(output)
}
