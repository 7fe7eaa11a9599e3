//! Infrastructure layer - document store clients.

#[cfg(feature = "dynamodb")]
mod dynamodb;
mod memory;
pub mod store;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStore;
pub use memory::{MemoryStore, TableSchema};
pub use store::{Document, StoreClient};

#[cfg(any(test, feature = "test-utils"))]
pub use store::MockStoreClient;
