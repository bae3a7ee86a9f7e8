use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    bus::DataAccessError,
    core::error::BridgeResult,
    handler::{DynQueryHandler, ExecutionContext, HandlerDeps, QueryHandler},
    store::{SharedStore, Store, StoreError, StoredRecord},
};

use super::{decode_record, not_found};

pub const CREATE: &str = "users.create";
pub const GET: &str = "users.get";
pub const LIST: &str = "users.list";
pub const DELETE: &str = "users.delete";

const COLLECTION: &str = "users";

/// Plain user data returned across the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Stored document; the id lives in the key
#[derive(Debug, Deserialize)]
struct UserDocument {
    name: String,
    #[serde(default)]
    email: Option<String>,
}

fn to_dto(record: StoredRecord) -> Result<UserDto, DataAccessError> {
    let doc: UserDocument = decode_record(&record)?;
    Ok(UserDto {
        id: record.key,
        name: doc.name,
        email: doc.email,
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
}

pub struct UsersCreate {
    deps: HandlerDeps,
}

pub fn create_users_create_handler(deps: &HandlerDeps) -> BridgeResult<Arc<dyn DynQueryHandler>> {
    Ok(Arc::new(UsersCreate { deps: deps.clone() }))
}

#[async_trait]
impl QueryHandler for UsersCreate {
    type Input = CreateUser;
    type Output = StoredRecord;
    type Dto = UserDto;

    fn name(&self) -> &'static str {
        CREATE
    }

    async fn execute(
        &self,
        input: CreateUser,
        ctx: &ExecutionContext,
    ) -> Result<StoredRecord, StoreError> {
        ctx.checkpoint()?;
        let mut doc = json!({ "name": input.name });
        if let Some(email) = input.email {
            doc["email"] = Value::String(email);
        }
        self.deps
            .store
            .create(COLLECTION, &self.deps.next_id(), doc)
            .await
    }

    fn map(&self, record: StoredRecord) -> Result<UserDto, DataAccessError> {
        to_dto(record)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserId {
    #[validate(length(min = 1))]
    pub id: String,
}

pub struct UsersGet {
    store: SharedStore,
}

pub fn create_users_get_handler(deps: &HandlerDeps) -> BridgeResult<Arc<dyn DynQueryHandler>> {
    Ok(Arc::new(UsersGet {
        store: deps.store.clone(),
    }))
}

#[async_trait]
impl QueryHandler for UsersGet {
    type Input = UserId;
    type Output = StoredRecord;
    type Dto = UserDto;

    fn name(&self) -> &'static str {
        GET
    }

    async fn execute(&self, input: UserId, ctx: &ExecutionContext) -> Result<StoredRecord, StoreError> {
        ctx.checkpoint()?;
        self.store
            .get(COLLECTION, &input.id)
            .await?
            .ok_or_else(|| not_found(COLLECTION, &input.id))
    }

    fn map(&self, record: StoredRecord) -> Result<UserDto, DataAccessError> {
        to_dto(record)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListUsers {
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<usize>,
}

pub struct UsersList {
    store: SharedStore,
}

pub fn create_users_list_handler(deps: &HandlerDeps) -> BridgeResult<Arc<dyn DynQueryHandler>> {
    Ok(Arc::new(UsersList {
        store: deps.store.clone(),
    }))
}

#[async_trait]
impl QueryHandler for UsersList {
    type Input = ListUsers;
    type Output = Vec<StoredRecord>;
    type Dto = Vec<UserDto>;

    fn name(&self) -> &'static str {
        LIST
    }

    async fn execute(
        &self,
        input: ListUsers,
        ctx: &ExecutionContext,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        ctx.checkpoint()?;
        let mut records = self.store.list(COLLECTION).await?;
        if let Some(limit) = input.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn map(&self, records: Vec<StoredRecord>) -> Result<Vec<UserDto>, DataAccessError> {
        records.into_iter().map(to_dto).collect()
    }
}

pub struct UsersDelete {
    store: SharedStore,
}

pub fn create_users_delete_handler(deps: &HandlerDeps) -> BridgeResult<Arc<dyn DynQueryHandler>> {
    Ok(Arc::new(UsersDelete {
        store: deps.store.clone(),
    }))
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: String,
    pub deleted: bool,
}

#[async_trait]
impl QueryHandler for UsersDelete {
    type Input = UserId;
    type Output = (String, bool);
    type Dto = Deleted;

    fn name(&self) -> &'static str {
        DELETE
    }

    async fn execute(&self, input: UserId, ctx: &ExecutionContext) -> Result<(String, bool), StoreError> {
        ctx.checkpoint()?;
        let deleted = self.store.delete(COLLECTION, &input.id).await?;
        if !deleted {
            return Err(not_found(COLLECTION, &input.id));
        }
        Ok((input.id, deleted))
    }

    fn map(&self, (id, deleted): (String, bool)) -> Result<Deleted, DataAccessError> {
        Ok(Deleted { id, deleted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bus::DataAccessResult, core::error::ErrorCode, store::MemoryStore};

    fn deps() -> HandlerDeps {
        HandlerDeps::new(Arc::new(MemoryStore::new()))
            .with_id_generator(Arc::new(|| "u-1".to_string()))
    }

    #[tokio::test]
    async fn test_create_returns_plain_user() {
        let handler = create_users_create_handler(&deps()).unwrap();
        let result = handler
            .handle(json!({"name": "Ana"}), ExecutionContext::default())
            .await;
        assert_eq!(
            result,
            DataAccessResult::success(json!({"id": "u-1", "name": "Ana"}))
        );
    }

    #[tokio::test]
    async fn test_create_rejects_bad_email() {
        let handler = create_users_create_handler(&deps()).unwrap();
        let result = handler
            .handle(
                json!({"name": "Ana", "email": "not-an-email"}),
                ExecutionContext::default(),
            )
            .await;
        match result {
            DataAccessResult::Failure { error } => {
                assert_eq!(error.code, ErrorCode::ValidationError);
                assert_eq!(error.details.unwrap()["fields"], json!(["email"]));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_id_is_persistence_error() {
        let deps = deps();
        let handler = create_users_create_handler(&deps).unwrap();
        let ctx = ExecutionContext::default();
        assert!(handler.handle(json!({"name": "Ana"}), ctx).await.is_success());
        let second = handler.handle(json!({"name": "Bea"}), ctx).await;
        assert_eq!(second.error_code(), Some(ErrorCode::PersistenceError));
    }

    #[tokio::test]
    async fn test_get_list_delete() {
        let deps = deps();
        deps.store
            .put(COLLECTION, "b", json!({"name": "Bea", "email": "bea@example.com"}))
            .await
            .unwrap();
        deps.store
            .put(COLLECTION, "a", json!({"name": "Ana"}))
            .await
            .unwrap();
        let ctx = ExecutionContext::default();

        let get = create_users_get_handler(&deps).unwrap();
        assert_eq!(
            get.handle(json!({"id": "b"}), ctx).await,
            DataAccessResult::success(json!({"id": "b", "name": "Bea", "email": "bea@example.com"}))
        );
        assert_eq!(
            get.handle(json!({"id": "zzz"}), ctx).await.error_code(),
            Some(ErrorCode::NotFound)
        );

        let list = create_users_list_handler(&deps).unwrap();
        assert_eq!(
            list.handle(json!({"limit": 1}), ctx).await,
            DataAccessResult::success(json!([{"id": "a", "name": "Ana"}]))
        );
        assert_eq!(
            list.handle(json!({"limit": 0}), ctx).await.error_code(),
            Some(ErrorCode::ValidationError)
        );

        let delete = create_users_delete_handler(&deps).unwrap();
        assert_eq!(
            delete.handle(json!({"id": "a"}), ctx).await,
            DataAccessResult::success(json!({"id": "a", "deleted": true}))
        );
        assert_eq!(
            delete.handle(json!({"id": "a"}), ctx).await.error_code(),
            Some(ErrorCode::NotFound)
        );
    }
}
