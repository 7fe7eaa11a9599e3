//! DynamoDB implementation of the store contract using `aws-sdk-dynamodb`.

mod conversions;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::types::{AttributeValue, KeysAndAttributes, ReturnValue};
use aws_sdk_dynamodb::{Client, Error as DynamoDbError};

use common::{AppError, AppResult, DynamoDbConfig};

use super::store::{
    BatchGet, BatchGetOutput, DeleteItem, Document, GetItem, ItemPage, PutItem, QueryRequest,
    ScanRequest, StoreClient,
};
use conversions::{from_item, to_item, Item};

#[cfg(test)]
use mockall::automock;

/// Most keys a single BatchGetItem request accepts.
const BATCH_GET_MAX_KEYS: usize = 100;

/// First backoff delay before re-submitting unprocessed keys.
const BATCH_GET_BASE_DELAY: Duration = Duration::from_millis(50);

/// Result of one BatchGetItem round trip for a single table.
#[derive(Debug, Default)]
struct BatchGetRound {
    /// `None` when the response has no entry for the table
    items: Option<Vec<Item>>,
    unprocessed: Vec<Item>,
}

/// Sends a single BatchGetItem request.
#[cfg_attr(test, automock)]
#[async_trait]
trait BatchGetSender: Send + Sync {
    async fn send(&self, table: &str, keys: Vec<Item>) -> AppResult<BatchGetRound>;
}

#[async_trait]
impl BatchGetSender for Client {
    async fn send(&self, table: &str, keys: Vec<Item>) -> AppResult<BatchGetRound> {
        let request = KeysAndAttributes::builder()
            .set_keys(Some(keys))
            .build()
            .map_err(|e| AppError::internal(format!("Invalid batch get request: {}", e)))?;

        let output = self
            .batch_get_item()
            .request_items(table, request)
            .send()
            .await
            .map_err(DynamoDbError::from)?;

        Ok(BatchGetRound {
            items: output
                .responses
                .and_then(|mut responses| responses.remove(table)),
            unprocessed: output
                .unprocessed_keys
                .and_then(|mut unprocessed| unprocessed.remove(table))
                .map(|unprocessed| unprocessed.keys().to_vec())
                .unwrap_or_default(),
        })
    }
}

/// How unprocessed batch get keys are re-submitted.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

/// Fetch `keys` in chunks the service accepts.
///
/// Returns `None` when the first response for a chunk has no entry for the
/// table.
async fn batch_get_keys(
    sender: &dyn BatchGetSender,
    table: &str,
    keys: Vec<Item>,
    policy: RetryPolicy,
) -> AppResult<Option<Vec<Item>>> {
    let mut found = Vec::with_capacity(keys.len());
    for chunk in keys.chunks(BATCH_GET_MAX_KEYS) {
        match batch_get_chunk(sender, table, chunk.to_vec(), policy).await? {
            Some(items) => found.extend(items),
            None => return Ok(None),
        }
    }
    Ok(Some(found))
}

/// Fetch one chunk, re-submitting unprocessed keys with exponential backoff.
async fn batch_get_chunk(
    sender: &dyn BatchGetSender,
    table: &str,
    keys: Vec<Item>,
    policy: RetryPolicy,
) -> AppResult<Option<Vec<Item>>> {
    let mut found = Vec::with_capacity(keys.len());
    let mut pending = keys;
    let mut attempt: u32 = 0;

    loop {
        let round = sender.send(table, pending).await?;
        match round.items {
            Some(items) => found.extend(items),
            None if attempt == 0 => return Ok(None),
            // A throttled resubmission may come back with nothing for the table.
            None => {}
        }

        pending = round.unprocessed;
        if pending.is_empty() {
            return Ok(Some(found));
        }

        attempt += 1;
        if attempt > policy.max_retries {
            return Err(AppError::store(format!(
                "{} keys left unprocessed after {} retries",
                pending.len(),
                policy.max_retries
            )));
        }

        tracing::warn!(
            table,
            unprocessed = pending.len(),
            attempt,
            "Re-submitting unprocessed batch get keys"
        );
        tokio::time::sleep(policy.base_delay * (1 << attempt.min(6))).await;
    }
}

/// DynamoDB-backed store client.
#[derive(Clone)]
pub struct DynamoDbStore {
    client: Client,
    batch_get_max_retries: u32,
}

impl DynamoDbStore {
    /// Wrap an existing SDK client.
    pub fn new(client: Client, batch_get_max_retries: u32) -> Self {
        Self {
            client,
            batch_get_max_retries,
        }
    }

    /// Build a client from the default AWS provider chain plus overrides.
    pub async fn connect(config: &DynamoDbConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        let shared = loader.load().await;
        tracing::info!(endpoint = ?config.endpoint_url, "DynamoDB client configured");

        Self::new(Client::new(&shared), config.batch_get_max_retries)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.batch_get_max_retries,
            base_delay: BATCH_GET_BASE_DELAY,
        }
    }
}

fn page_from(items: Option<Vec<Item>>, last_key: Option<Item>) -> AppResult<ItemPage> {
    Ok(ItemPage {
        items: items
            .unwrap_or_default()
            .into_iter()
            .map(from_item)
            .collect::<AppResult<_>>()?,
        last_key: last_key.map(from_item).transpose()?,
    })
}

fn to_limit(limit: u32) -> i32 {
    i32::try_from(limit).unwrap_or(i32::MAX)
}

#[async_trait]
impl StoreClient for DynamoDbStore {
    async fn get_item(&self, request: GetItem) -> AppResult<Option<Document>> {
        tracing::debug!(table = %request.table, "GetItem");
        let output = self
            .client
            .get_item()
            .table_name(request.table)
            .set_key(Some(to_item(request.key)))
            .send()
            .await
            .map_err(DynamoDbError::from)?;

        output.item.map(from_item).transpose()
    }

    async fn put_item(&self, request: PutItem) -> AppResult<()> {
        tracing::debug!(table = %request.table, "PutItem");
        self.client
            .put_item()
            .table_name(request.table)
            .set_item(Some(to_item(request.item)))
            .send()
            .await
            .map_err(DynamoDbError::from)?;

        Ok(())
    }

    async fn delete_item(&self, request: DeleteItem) -> AppResult<Option<Document>> {
        tracing::debug!(table = %request.table, "DeleteItem");
        let output = self
            .client
            .delete_item()
            .table_name(request.table)
            .set_key(Some(to_item(request.key)))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(DynamoDbError::from)?;

        output.attributes.map(from_item).transpose()
    }

    async fn query(&self, request: QueryRequest) -> AppResult<ItemPage> {
        tracing::debug!(
            table = %request.table,
            index = %request.index,
            limit = request.limit,
            "Query"
        );
        let output = self
            .client
            .query()
            .table_name(request.table)
            .index_name(request.index)
            .key_condition_expression("#field = :value")
            .expression_attribute_names("#field", request.field)
            .expression_attribute_values(":value", AttributeValue::S(request.value))
            .limit(to_limit(request.limit))
            .set_exclusive_start_key(request.start_key.map(to_item))
            .send()
            .await
            .map_err(DynamoDbError::from)?;

        page_from(output.items, output.last_evaluated_key)
    }

    async fn scan(&self, request: ScanRequest) -> AppResult<ItemPage> {
        tracing::debug!(table = %request.table, limit = request.limit, "Scan");
        let output = self
            .client
            .scan()
            .table_name(request.table)
            .limit(to_limit(request.limit))
            .set_exclusive_start_key(request.start_key.map(to_item))
            .send()
            .await
            .map_err(DynamoDbError::from)?;

        page_from(output.items, output.last_evaluated_key)
    }

    async fn batch_get(&self, request: BatchGet) -> AppResult<BatchGetOutput> {
        tracing::debug!(table = %request.table, keys = request.keys.len(), "BatchGetItem");
        let keys: Vec<Item> = request.keys.into_iter().map(to_item).collect();
        let Some(found) =
            batch_get_keys(&self.client, &request.table, keys, self.retry_policy()).await?
        else {
            return Ok(BatchGetOutput { responses: None });
        };

        let items: Vec<Document> = found.into_iter().map(from_item).collect::<AppResult<_>>()?;
        Ok(BatchGetOutput {
            responses: Some(HashMap::from([(request.table, items)])),
        })
    }
}
