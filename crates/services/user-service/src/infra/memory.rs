//! In-memory document store for development and testing.
//!
//! Tables are ordered by primary key, so scans and index queries return
//! items in a stable order and pagination can resume after any key. Index
//! queries return keys-only projections, like a keys-only secondary index.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use common::{AppError, AppResult, UsersDbConfig};

use super::store::{
    BatchGet, BatchGetOutput, DeleteItem, Document, GetItem, ItemPage, PutItem, QueryRequest,
    ScanRequest, StoreClient,
};

/// Key layout of an in-memory table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    key_attribute: String,
    /// index name -> partition attribute
    indexes: HashMap<String, String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, key_attribute: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_attribute: key_attribute.into(),
            indexes: HashMap::new(),
        }
    }

    /// Add an equality index on `attribute`
    pub fn with_index(mut self, index: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.indexes.insert(index.into(), attribute.into());
        self
    }
}

struct Table {
    schema: TableSchema,
    items: BTreeMap<String, Document>,
}

impl Table {
    fn key_string(&self, document: &Document) -> AppResult<String> {
        let value = document.get(&self.schema.key_attribute).ok_or_else(|| {
            AppError::store(format!(
                "Missing key attribute {} for table {}",
                self.schema.key_attribute, self.schema.name
            ))
        })?;
        Ok(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Items after `start_key` (exclusive) in key order.
    fn items_after<'a>(
        &'a self,
        start_key: Option<&Document>,
    ) -> AppResult<impl Iterator<Item = (&'a String, &'a Document)>> {
        let lower = match start_key {
            Some(key) => Bound::Excluded(self.key_string(key)?),
            None => Bound::Unbounded,
        };
        Ok(self.items.range((lower, Bound::Unbounded)))
    }
}

/// In-memory implementation of [`StoreClient`].
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the user table and name index described by `config`.
    pub fn for_users(config: &UsersDbConfig) -> Self {
        Self::new().with_table(
            TableSchema::new(&config.table_name, "id").with_index(&config.name_index, "name"),
        )
    }

    /// Register a table
    pub fn with_table(mut self, schema: TableSchema) -> Self {
        self.tables.get_mut().insert(
            schema.name.clone(),
            Table {
                schema,
                items: BTreeMap::new(),
            },
        );
        self
    }

    /// Number of items currently stored in `table`
    pub async fn item_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map_or(0, |table| table.items.len())
    }
}

fn missing_table(table: &str) -> AppError {
    AppError::store(format!("Requested resource not found: table {}", table))
}

fn check_limit(limit: u32) -> AppResult<()> {
    if limit == 0 {
        return Err(AppError::store("Limit must be greater than or equal to 1"));
    }
    Ok(())
}

/// Cut a sorted run of `(key, item)` pairs down to one page.
fn paginate<'a>(
    mut matches: impl Iterator<Item = (&'a String, &'a Document)>,
    limit: u32,
    project: impl Fn(&Document) -> Document,
    continuation: impl Fn(&Document) -> Document,
) -> ItemPage {
    let mut items = Vec::new();
    let mut last = None;
    for (_, item) in matches.by_ref().take(limit as usize) {
        items.push(project(item));
        last = Some(item);
    }

    let last_key = match (last, matches.next()) {
        (Some(last), Some(_)) => Some(continuation(last)),
        _ => None,
    };

    ItemPage { items, last_key }
}

fn pick(item: &Document, attributes: &[&str]) -> Document {
    attributes
        .iter()
        .filter_map(|attribute| {
            item.get(*attribute)
                .map(|value| (attribute.to_string(), value.clone()))
        })
        .collect()
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn get_item(&self, request: GetItem) -> AppResult<Option<Document>> {
        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table)
            .ok_or_else(|| missing_table(&request.table))?;

        let key = table.key_string(&request.key)?;
        Ok(table.items.get(&key).cloned())
    }

    async fn put_item(&self, request: PutItem) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(&request.table)
            .ok_or_else(|| missing_table(&request.table))?;

        let key = table.key_string(&request.item)?;
        table.items.insert(key, request.item);
        Ok(())
    }

    async fn delete_item(&self, request: DeleteItem) -> AppResult<Option<Document>> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(&request.table)
            .ok_or_else(|| missing_table(&request.table))?;

        let key = table.key_string(&request.key)?;
        Ok(table.items.remove(&key))
    }

    async fn query(&self, request: QueryRequest) -> AppResult<ItemPage> {
        check_limit(request.limit)?;

        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table)
            .ok_or_else(|| missing_table(&request.table))?;

        let attribute = table.schema.indexes.get(&request.index).ok_or_else(|| {
            AppError::store(format!(
                "The table does not have the specified index: {}",
                request.index
            ))
        })?;
        if *attribute != request.field {
            return Err(AppError::store(format!(
                "Query condition missed key schema element: {}",
                attribute
            )));
        }

        let expected = Value::String(request.value.clone());
        let key_attribute = table.schema.key_attribute.as_str();
        let matches = table
            .items_after(request.start_key.as_ref())?
            .filter(|(_, item)| item.get(attribute.as_str()) == Some(&expected));

        let projection = [key_attribute, attribute.as_str()];
        Ok(paginate(
            matches,
            request.limit,
            |item| pick(item, &projection),
            |item| pick(item, &projection),
        ))
    }

    async fn scan(&self, request: ScanRequest) -> AppResult<ItemPage> {
        check_limit(request.limit)?;

        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table)
            .ok_or_else(|| missing_table(&request.table))?;

        let key_attribute = table.schema.key_attribute.as_str();
        let matches = table.items_after(request.start_key.as_ref())?;

        Ok(paginate(
            matches,
            request.limit,
            Document::clone,
            |item| pick(item, &[key_attribute]),
        ))
    }

    async fn batch_get(&self, request: BatchGet) -> AppResult<BatchGetOutput> {
        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table)
            .ok_or_else(|| missing_table(&request.table))?;

        let mut found = Vec::with_capacity(request.keys.len());
        for key in &request.keys {
            if let Some(item) = table.items.get(&table.key_string(key)?) {
                found.push(item.clone());
            }
        }

        Ok(BatchGetOutput {
            responses: Some(HashMap::from([(request.table, found)])),
        })
    }
}
