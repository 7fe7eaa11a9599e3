//! Document store contract used by the repository.
//!
//! The store is an opaque key-value engine with point reads and writes,
//! equality queries on secondary indexes, full scans and batch reads. Items
//! and keys are JSON documents; continuation keys are store-defined documents
//! that callers pass back verbatim.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use common::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// A stored item, a key, or a continuation key.
pub type Document = Map<String, Value>;

/// Point read of one item.
#[derive(Debug, Clone, PartialEq)]
pub struct GetItem {
    pub table: String,
    pub key: Document,
}

/// Unconditional write that replaces any item with the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct PutItem {
    pub table: String,
    pub item: Document,
}

/// Delete by key, returning the attributes the item had.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItem {
    pub table: String,
    pub key: Document,
}

/// Equality lookup on a secondary index.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table: String,
    pub index: String,
    /// Index partition attribute
    pub field: String,
    pub value: String,
    pub limit: u32,
    /// Resume after this key
    pub start_key: Option<Document>,
}

/// Unfiltered read of a whole table.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub table: String,
    pub limit: u32,
    /// Resume after this key
    pub start_key: Option<Document>,
}

/// Read of many items by key from one table.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchGet {
    pub table: String,
    pub keys: Vec<Document>,
}

/// One page of a query or scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPage {
    /// Items in store order; index queries may return partial projections
    pub items: Vec<Document>,
    /// Set when more items exist beyond this page
    pub last_key: Option<Document>,
}

/// Batch read result, grouped by table name.
///
/// Item order within a table is not guaranteed to follow the request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetOutput {
    pub responses: Option<HashMap<String, Vec<Document>>>,
}

/// Store client trait for dependency injection.
///
/// Implementations must be safe to share between concurrent requests.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Fetch one item by key
    async fn get_item(&self, request: GetItem) -> AppResult<Option<Document>>;

    /// Write an item, overwriting any existing one
    async fn put_item(&self, request: PutItem) -> AppResult<()>;

    /// Delete an item, returning its previous attributes if it existed
    async fn delete_item(&self, request: DeleteItem) -> AppResult<Option<Document>>;

    /// Query a secondary index by equality on its partition attribute
    async fn query(&self, request: QueryRequest) -> AppResult<ItemPage>;

    /// Scan a table
    async fn scan(&self, request: ScanRequest) -> AppResult<ItemPage>;

    /// Fetch many items by key
    async fn batch_get(&self, request: BatchGet) -> AppResult<BatchGetOutput>;
}

/// Build a single-attribute key document.
pub fn key_of(attribute: &str, value: impl Into<Value>) -> Document {
    let mut key = Document::new();
    key.insert(attribute.to_string(), value.into());
    key
}
