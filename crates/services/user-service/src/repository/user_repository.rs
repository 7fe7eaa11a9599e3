//! User repository backed by a document store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use common::{AppError, AppResult, UsersDbConfig};
use domain::{timestamp, DomainError, User, UserInput, UserPage, MAX_PAGE_SIZE};

use super::cursor::{decode_cursor, encode_cursor};
use crate::infra::store::{
    key_of, BatchGet, DeleteItem, GetItem, PutItem, QueryRequest, ScanRequest,
};
use crate::infra::{Document, StoreClient};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Primary key attribute of the user table.
pub const ID_ATTRIBUTE: &str = "id";

/// Partition attribute of the name index.
pub const NAME_ATTRIBUTE: &str = "name";

/// User repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Validate and store a new user
    async fn create_user(&self, input: UserInput) -> AppResult<User>;

    /// Merge the supplied fields into an existing user
    async fn update_user(&self, id: &str, input: UserInput) -> AppResult<User>;

    /// Delete a user, returning it as it was; `None` if it did not exist
    async fn delete_user(&self, id: &str) -> AppResult<Option<User>>;

    /// Find user by ID
    async fn get_user(&self, id: &str) -> AppResult<User>;

    /// List users, optionally restricted to an exact name
    async fn list_users(
        &self,
        query: Option<String>,
        limit: u32,
        cursor: Option<String>,
    ) -> AppResult<UserPage>;
}

/// Keys discovered by the first phase of a listing.
#[derive(Debug)]
struct KeyPage {
    ids: Vec<String>,
    last_key: Option<Document>,
}

/// Concrete implementation of UserRepository over a [`StoreClient`].
pub struct DocumentUserRepository {
    store: Arc<dyn StoreClient>,
    config: UsersDbConfig,
}

impl DocumentUserRepository {
    /// Create new repository instance
    pub fn new(store: Arc<dyn StoreClient>, config: UsersDbConfig) -> Self {
        Self { store, config }
    }

    fn table(&self) -> String {
        self.config.table_name.clone()
    }

    /// Load the stored document for `id` as is.
    async fn fetch_item(&self, id: &str) -> AppResult<Document> {
        let item = self
            .store
            .get_item(GetItem {
                table: self.table(),
                key: key_of(ID_ATTRIBUTE, id),
            })
            .await?
            .ok_or_else(|| DomainError::user_not_found(id))?;

        Ok(item)
    }

    async fn save(&self, item: Document) -> AppResult<()> {
        self.store
            .put_item(PutItem {
                table: self.table(),
                item,
            })
            .await
    }

    /// Phase one: find the ids of one page, by exact name or by scanning.
    async fn discover_keys(
        &self,
        query: Option<&str>,
        limit: u32,
        start_key: Option<Document>,
    ) -> AppResult<KeyPage> {
        // TODO: swap the exact-name index lookup for a full text search engine.
        let page = match query {
            Some(name) => {
                self.store
                    .query(QueryRequest {
                        table: self.table(),
                        index: self.config.name_index.clone(),
                        field: NAME_ATTRIBUTE.to_string(),
                        value: name.to_string(),
                        limit,
                        start_key,
                    })
                    .await?
            }
            None => {
                self.store
                    .scan(ScanRequest {
                        table: self.table(),
                        limit,
                        start_key,
                    })
                    .await?
            }
        };

        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let id = item
                .get(ID_ATTRIBUTE)
                .and_then(Value::as_str)
                .ok_or_else(|| AppError::internal("Listed item is missing its id"))?;
            if seen.insert(id) {
                ids.push(id.to_string());
            }
        }

        Ok(KeyPage {
            ids,
            last_key: page.last_key,
        })
    }

    /// Phase two: load full users for `ids`, keeping their order.
    async fn hydrate(&self, ids: &[String]) -> AppResult<Vec<User>> {
        let output = self
            .store
            .batch_get(BatchGet {
                table: self.table(),
                keys: ids.iter().map(|id| key_of(ID_ATTRIBUTE, id.as_str())).collect(),
            })
            .await?;

        let items = output
            .responses
            .and_then(|mut responses| responses.remove(&self.config.table_name))
            .ok_or_else(|| {
                tracing::error!(
                    table = %self.config.table_name,
                    "Batch get response has no entry for the users table"
                );
                AppError::internal("Unexpected batch get items result")
            })?;

        let mut by_id = items
            .into_iter()
            .map(|item| decode_user(item).map(|user| (user.id.clone(), user)))
            .collect::<AppResult<HashMap<_, _>>>()?;

        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.remove(id) {
                Some(user) => users.push(user),
                None => tracing::warn!(user_id = %id, "Listed user no longer exists"),
            }
        }
        Ok(users)
    }
}

fn encode_user(user: &User) -> AppResult<Document> {
    match serde_json::to_value(user)? {
        Value::Object(item) => Ok(item),
        _ => Err(AppError::internal("User did not serialize to a document")),
    }
}

fn decode_user(item: Document) -> AppResult<User> {
    Ok(serde_json::from_value(Value::Object(item))?)
}

#[async_trait]
impl UserRepository for DocumentUserRepository {
    async fn create_user(&self, input: UserInput) -> AppResult<User> {
        let new_user = input.validated_for_create()?;
        let user = User::create(Uuid::new_v4().to_string(), new_user, timestamp::now());

        self.save(encode_user(&user)?).await?;
        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }

    async fn update_user(&self, id: &str, input: UserInput) -> AppResult<User> {
        let changes = input.validated()?;

        // Read-modify-write without a condition: concurrent updates are last-writer-wins.
        let mut item = self.fetch_item(id).await?;
        let mut user = decode_user(item.clone())?;
        user.apply(changes, timestamp::now());

        // Attributes the user model does not know about are written back untouched.
        item.extend(encode_user(&user)?);
        self.save(item).await?;
        tracing::info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> AppResult<Option<User>> {
        let prior = self
            .store
            .delete_item(DeleteItem {
                table: self.table(),
                key: key_of(ID_ATTRIBUTE, id),
            })
            .await?;

        match prior {
            Some(item) => {
                tracing::info!(user_id = %id, "User deleted");
                decode_user(item).map(Some)
            }
            None => {
                tracing::debug!(user_id = %id, "Nothing to delete");
                Ok(None)
            }
        }
    }

    async fn get_user(&self, id: &str) -> AppResult<User> {
        decode_user(self.fetch_item(id).await?)
    }

    async fn list_users(
        &self,
        query: Option<String>,
        limit: u32,
        cursor: Option<String>,
    ) -> AppResult<UserPage> {
        if limit == 0 {
            return Err(AppError::validation("The limit must be greater than zero"));
        }
        let limit = limit.min(MAX_PAGE_SIZE);
        let start_key = cursor.as_deref().map(decode_cursor).transpose()?;
        let query = query.filter(|name| !name.is_empty());

        tracing::debug!(query = ?query, limit, "Listing users");
        let keys = self.discover_keys(query.as_deref(), limit, start_key).await?;
        let cursor = keys.last_key.as_ref().map(encode_cursor).transpose()?;

        if keys.ids.is_empty() {
            return Ok(UserPage {
                items: Vec::new(),
                cursor,
            });
        }

        let items = self.hydrate(&keys.ids).await?;
        Ok(UserPage { items, cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::store::{BatchGetOutput, ItemPage};
    use crate::infra::MockStoreClient;
    use serde_json::json;

    const TABLE: &str = "test-table";
    const INDEX: &str = "name-index";

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn repo(store: MockStoreClient) -> DocumentUserRepository {
        DocumentUserRepository::new(
            Arc::new(store),
            UsersDbConfig {
                table_name: TABLE.to_string(),
                name_index: INDEX.to_string(),
            },
        )
    }

    fn valid_input() -> UserInput {
        UserInput {
            name: Some("Test user".to_string()),
            address: Some("Brasilia, Brazil".to_string()),
            description: Some("Test description".to_string()),
            dob: Some("1995-09-03".to_string()),
        }
    }

    fn stored_user(id: &str, name: &str) -> Document {
        doc(json!({
            "id": id,
            "name": name,
            "address": "Rio de Janeiro, Brazil",
            "description": "Test description 2",
            "dob": "1995-09-04T00:00:00.000Z",
            "createdAt": "2021-05-01T17:52:48.299Z",
        }))
    }

    fn batch_output(items: Vec<Document>) -> BatchGetOutput {
        BatchGetOutput {
            responses: Some(HashMap::from([(TABLE.to_string(), items)])),
        }
    }

    // =========================================================================
    // create_user
    // =========================================================================

    #[tokio::test]
    async fn test_create_user_writes_and_returns_entity() {
        let mut store = MockStoreClient::new();
        store
            .expect_put_item()
            .withf(|req| {
                req.table == TABLE
                    && req.item["name"] == "Test user"
                    && req.item["address"] == "Brasilia, Brazil"
                    && req.item["description"] == "Test description"
                    && req.item["dob"] == "1995-09-03T00:00:00.000Z"
                    && req.item.contains_key("createdAt")
                    && !req.item.contains_key("updatedAt")
            })
            .times(1)
            .returning(|_| Ok(()));

        let user = repo(store).create_user(valid_input()).await.unwrap();

        assert!(Uuid::parse_str(&user.id).is_ok());
        assert_eq!(user.name, "Test user");
        assert_eq!(
            user.dob.map(|dob| timestamp::format(&dob)).as_deref(),
            Some("1995-09-03T00:00:00.000Z")
        );
        assert!(user.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_create_user_generates_distinct_ids() {
        let mut store = MockStoreClient::new();
        store.expect_put_item().times(2).returning(|_| Ok(()));
        let repository = repo(store);

        let first = repository.create_user(valid_input()).await.unwrap();
        let second = repository.create_user(valid_input()).await.unwrap();

        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_create_user_invalid_date_writes_nothing() {
        let mut store = MockStoreClient::new();
        store.expect_put_item().never();

        let input = UserInput {
            dob: Some("03-09-1995".to_string()),
            ..valid_input()
        };
        let err = repo(store).create_user(input).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(ref msg) if msg == "An invalid date of birth was provided"));
    }

    #[tokio::test]
    async fn test_create_user_missing_fields_in_order() {
        let cases = [
            (UserInput { name: None, ..valid_input() }, "The name must be specified"),
            (UserInput { dob: None, ..valid_input() }, "The date of birth must be specified"),
            (UserInput { address: None, ..valid_input() }, "The address must be specified"),
        ];

        for (input, expected) in cases {
            let mut store = MockStoreClient::new();
            store.expect_put_item().never();

            let err = repo(store).create_user(input).await.unwrap_err();
            assert_eq!(err.to_string(), expected);
        }
    }

    #[tokio::test]
    async fn test_create_user_propagates_store_failure() {
        let mut store = MockStoreClient::new();
        store
            .expect_put_item()
            .returning(|_| Err(AppError::store("throttled")));

        let err = repo(store).create_user(valid_input()).await.unwrap_err();
        assert!(matches!(err, AppError::Store(ref msg) if msg == "throttled"));
    }

    // =========================================================================
    // update_user
    // =========================================================================

    #[tokio::test]
    async fn test_update_user_merges_supplied_fields() {
        let mut store = MockStoreClient::new();
        store
            .expect_get_item()
            .withf(|req| req.table == TABLE && req.key == key_of("id", "1234"))
            .times(1)
            .returning(|_| Ok(Some(stored_user("1234", "A"))));
        store
            .expect_put_item()
            .withf(|req| {
                req.item["id"] == "1234"
                    && req.item["name"] == "C"
                    && req.item["address"] == "Rio de Janeiro, Brazil"
                    && req.item["dob"] == "1995-09-04T00:00:00.000Z"
                    && req.item["createdAt"] == "2021-05-01T17:52:48.299Z"
                    && req.item.contains_key("updatedAt")
            })
            .times(1)
            .returning(|_| Ok(()));

        let input = UserInput {
            name: Some("C".to_string()),
            ..Default::default()
        };
        let user = repo(store).update_user("1234", input).await.unwrap();

        assert_eq!(user.id, "1234");
        assert_eq!(user.name, "C");
        assert_eq!(user.address, "Rio de Janeiro, Brazil");
        assert_eq!(user.description.as_deref(), Some("Test description 2"));
        assert_eq!(timestamp::format(&user.created_at), "2021-05-01T17:52:48.299Z");
        assert!(user.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_update_user_keeps_unmodelled_attributes() {
        let mut store = MockStoreClient::new();
        store.expect_get_item().returning(|_| {
            let mut item = stored_user("1234", "A");
            item.insert("imageUrl".to_string(), json!("https://example.com/a.png"));
            Ok(Some(item))
        });
        store
            .expect_put_item()
            .withf(|req| {
                req.item["name"] == "C" && req.item["imageUrl"] == "https://example.com/a.png"
            })
            .times(1)
            .returning(|_| Ok(()));

        let input = UserInput {
            name: Some("C".to_string()),
            ..Default::default()
        };
        let user = repo(store).update_user("1234", input).await.unwrap();

        assert_eq!(user.name, "C");
    }

    #[tokio::test]
    async fn test_update_user_replaces_all_supplied_fields() {
        let mut store = MockStoreClient::new();
        store
            .expect_get_item()
            .returning(|_| Ok(Some(stored_user("12345", "Test user 2"))));
        store.expect_put_item().times(1).returning(|_| Ok(()));

        let user = repo(store).update_user("12345", valid_input()).await.unwrap();

        assert_eq!(user.name, "Test user");
        assert_eq!(user.address, "Brasilia, Brazil");
        assert_eq!(user.description.as_deref(), Some("Test description"));
        assert_eq!(
            user.dob.map(|dob| timestamp::format(&dob)).as_deref(),
            Some("1995-09-03T00:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn test_update_user_not_found_writes_nothing() {
        let mut store = MockStoreClient::new();
        store.expect_get_item().returning(|_| Ok(None));
        store.expect_put_item().never();

        let err = repo(store)
            .update_user("missing", valid_input())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Could not find user with id missing"));
    }

    #[tokio::test]
    async fn test_update_user_invalid_input_touches_nothing() {
        let mut store = MockStoreClient::new();
        store.expect_get_item().never();
        store.expect_put_item().never();

        let input = UserInput {
            name: Some("a".repeat(101)),
            ..Default::default()
        };
        let err = repo(store).update_user("1234", input).await.unwrap_err();

        assert_eq!(err.to_string(), "The name max length is 100 characters");
    }

    // =========================================================================
    // get_user / delete_user
    // =========================================================================

    #[tokio::test]
    async fn test_get_user_not_found_embeds_id() {
        let mut store = MockStoreClient::new();
        store.expect_get_item().returning(|_| Ok(None));

        let err = repo(store).get_user("42").await.unwrap_err();
        assert_eq!(err.to_string(), "Could not find user with id 42");
    }

    #[tokio::test]
    async fn test_get_user_rejects_malformed_item() {
        let mut store = MockStoreClient::new();
        store
            .expect_get_item()
            .returning(|_| Ok(Some(doc(json!({ "id": "1234" })))));

        let err = repo(store).get_user("1234").await.unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_delete_user_returns_prior_attributes() {
        let mut store = MockStoreClient::new();
        store
            .expect_delete_item()
            .withf(|req| req.table == TABLE && req.key == key_of("id", "1234"))
            .returning(|_| Ok(Some(stored_user("1234", "A"))));

        let user = repo(store).delete_user("1234").await.unwrap();
        assert_eq!(user.map(|u| u.name).as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_delete_user_missing_is_not_an_error() {
        let mut store = MockStoreClient::new();
        store.expect_delete_item().returning(|_| Ok(None));

        let user = repo(store).delete_user("missing").await.unwrap();
        assert!(user.is_none());
    }

    // =========================================================================
    // list_users
    // =========================================================================

    #[tokio::test]
    async fn test_list_users_by_name_keeps_index_order() {
        let last_key = doc(json!({ "id": "1", "name": "Test user" }));
        let expected_key = last_key.clone();

        let mut store = MockStoreClient::new();
        store
            .expect_query()
            .withf(|req| {
                req.table == TABLE
                    && req.index == INDEX
                    && req.field == "name"
                    && req.value == "Test user"
                    && req.limit == 10
                    && req.start_key.is_none()
            })
            .times(1)
            .returning(move |_| {
                Ok(ItemPage {
                    items: vec![
                        doc(json!({ "id": "2", "name": "Test user" })),
                        doc(json!({ "id": "1", "name": "Test user" })),
                    ],
                    last_key: Some(last_key.clone()),
                })
            });
        store
            .expect_batch_get()
            .withf(|req| req.table == TABLE && req.keys == vec![key_of("id", "2"), key_of("id", "1")])
            .times(1)
            .returning(|_| {
                Ok(batch_output(vec![
                    stored_user("1", "Test user"),
                    stored_user("2", "Test user"),
                ]))
            });
        store.expect_scan().never();

        let page = repo(store)
            .list_users(Some("Test user".to_string()), 10, None)
            .await
            .unwrap();

        let ids: Vec<_> = page.items.iter().map(|user| user.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        let cursor = page.cursor.expect("continuation expected");
        assert_eq!(decode_cursor(&cursor).unwrap(), expected_key);
    }

    #[tokio::test]
    async fn test_list_users_without_query_scans() {
        let mut store = MockStoreClient::new();
        store.expect_query().never();
        store
            .expect_scan()
            .withf(|req| req.table == TABLE && req.limit == 5)
            .times(1)
            .returning(|_| {
                Ok(ItemPage {
                    items: vec![stored_user("7", "Someone")],
                    last_key: None,
                })
            });
        store
            .expect_batch_get()
            .times(1)
            .returning(|_| Ok(batch_output(vec![stored_user("7", "Someone")])));

        let page = repo(store)
            .list_users(Some(String::new()), 5, None)
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert!(page.cursor.is_none());
    }

    #[tokio::test]
    async fn test_list_users_no_matches_skips_hydration() {
        let mut store = MockStoreClient::new();
        store
            .expect_query()
            .returning(|_| Ok(ItemPage::default()));
        store.expect_batch_get().never();

        let page = repo(store)
            .list_users(Some("Nobody".to_string()), 10, None)
            .await
            .unwrap();

        assert!(page.items.is_empty());
        assert!(page.cursor.is_none());
    }

    #[tokio::test]
    async fn test_list_users_resumes_from_cursor() {
        let start = doc(json!({ "id": "5" }));
        let cursor = encode_cursor(&start).unwrap();

        let mut store = MockStoreClient::new();
        store
            .expect_scan()
            .withf(move |req| req.start_key.as_ref() == Some(&start))
            .times(1)
            .returning(|_| Ok(ItemPage::default()));

        let page = repo(store).list_users(None, 10, Some(cursor)).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_list_users_invalid_cursor_touches_nothing() {
        let mut store = MockStoreClient::new();
        store.expect_scan().never();
        store.expect_query().never();

        let err = repo(store)
            .list_users(None, 10, Some("not a cursor".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_users_zero_limit_is_rejected() {
        let mut store = MockStoreClient::new();
        store.expect_scan().never();

        let err = repo(store).list_users(None, 0, None).await.unwrap_err();
        assert_eq!(err.to_string(), "The limit must be greater than zero");
    }

    #[tokio::test]
    async fn test_list_users_clamps_limit() {
        let mut store = MockStoreClient::new();
        store
            .expect_scan()
            .withf(|req| req.limit == MAX_PAGE_SIZE)
            .times(1)
            .returning(|_| Ok(ItemPage::default()));

        repo(store).list_users(None, 5_000, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_users_missing_table_response_is_internal() {
        let mut store = MockStoreClient::new();
        store.expect_scan().returning(|_| {
            Ok(ItemPage {
                items: vec![doc(json!({ "id": "1" }))],
                last_key: None,
            })
        });
        store
            .expect_batch_get()
            .returning(|_| Ok(BatchGetOutput { responses: None }));

        let err = repo(store).list_users(None, 10, None).await.unwrap_err();

        assert!(matches!(err, AppError::Internal(ref msg) if msg == "Unexpected batch get items result"));
        assert_eq!(err.user_message(), "An internal error occurred");
    }

    #[tokio::test]
    async fn test_list_users_skips_stale_and_duplicate_keys() {
        let mut store = MockStoreClient::new();
        store.expect_scan().returning(|_| {
            Ok(ItemPage {
                items: vec![
                    doc(json!({ "id": "1" })),
                    doc(json!({ "id": "gone" })),
                    doc(json!({ "id": "1" })),
                    doc(json!({ "id": "3" })),
                ],
                last_key: None,
            })
        });
        store
            .expect_batch_get()
            .withf(|req| {
                req.keys == vec![key_of("id", "1"), key_of("id", "gone"), key_of("id", "3")]
            })
            .returning(|_| {
                Ok(batch_output(vec![
                    stored_user("3", "C"),
                    stored_user("1", "A"),
                ]))
            });

        let page = repo(store).list_users(None, 10, None).await.unwrap();

        let ids: Vec<_> = page.items.iter().map(|user| user.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_list_users_projection_without_id_is_internal() {
        let mut store = MockStoreClient::new();
        store.expect_query().returning(|_| {
            Ok(ItemPage {
                items: vec![doc(json!({ "name": "Test user" }))],
                last_key: None,
            })
        });
        store.expect_batch_get().never();

        let err = repo(store)
            .list_users(Some("Test user".to_string()), 10, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
    }
}
