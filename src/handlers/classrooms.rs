use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::{Validate, ValidationError};

use crate::{
    bus::DataAccessError,
    core::error::BridgeResult,
    handler::{DynQueryHandler, ExecutionContext, HandlerDeps, QueryHandler},
    store::{SharedStore, Store, StoreError, StoredRecord},
};

use super::{decode_record, not_found};

pub const CREATE: &str = "classrooms.create";
pub const GET: &str = "classrooms.get";

const COLLECTION: &str = "classrooms";

static CLASS_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]{1,32}$").expect("class id pattern is valid")
});

fn validate_class_id(id: &str) -> Result<(), ValidationError> {
    if CLASS_ID.is_match(id) {
        Ok(())
    } else {
        Err(ValidationError::new("class_id"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Member {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[serde(default)]
    pub role: MemberRole,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Teacher,
    #[default]
    Student,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomDto {
    pub class_id: String,
    pub title: String,
    pub members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
struct ClassroomDocument {
    title: String,
    #[serde(default)]
    members: Vec<Member>,
}

fn to_dto(record: StoredRecord) -> Result<ClassroomDto, DataAccessError> {
    let doc: ClassroomDocument = decode_record(&record)?;
    Ok(ClassroomDto {
        class_id: record.key,
        title: doc.title,
        members: doc.members,
    })
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassroom {
    #[validate(custom(function = "validate_class_id"))]
    pub class_id: String,
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[serde(default)]
    #[validate(nested)]
    pub members: Vec<Member>,
}

pub struct ClassroomsCreate {
    store: SharedStore,
}

pub fn create_classrooms_create_handler(
    deps: &HandlerDeps,
) -> BridgeResult<Arc<dyn DynQueryHandler>> {
    Ok(Arc::new(ClassroomsCreate {
        store: deps.store.clone(),
    }))
}

#[async_trait]
impl QueryHandler for ClassroomsCreate {
    type Input = CreateClassroom;
    type Output = StoredRecord;
    type Dto = ClassroomDto;

    fn name(&self) -> &'static str {
        CREATE
    }

    async fn execute(
        &self,
        input: CreateClassroom,
        ctx: &ExecutionContext,
    ) -> Result<StoredRecord, StoreError> {
        ctx.checkpoint()?;
        let members = serde_json::to_value(&input.members).map_err(StoreError::Serialization)?;
        self.store
            .create(
                COLLECTION,
                &input.class_id,
                json!({ "title": input.title, "members": members }),
            )
            .await
    }

    fn map(&self, record: StoredRecord) -> Result<ClassroomDto, DataAccessError> {
        to_dto(record)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetClassroom {
    #[validate(custom(function = "validate_class_id"))]
    pub class_id: String,
}

pub struct ClassroomsGet {
    store: SharedStore,
}

pub fn create_classrooms_get_handler(
    deps: &HandlerDeps,
) -> BridgeResult<Arc<dyn DynQueryHandler>> {
    Ok(Arc::new(ClassroomsGet {
        store: deps.store.clone(),
    }))
}

#[async_trait]
impl QueryHandler for ClassroomsGet {
    type Input = GetClassroom;
    type Output = StoredRecord;
    type Dto = ClassroomDto;

    fn name(&self) -> &'static str {
        GET
    }

    async fn execute(
        &self,
        input: GetClassroom,
        ctx: &ExecutionContext,
    ) -> Result<StoredRecord, StoreError> {
        ctx.checkpoint()?;
        self.store
            .get(COLLECTION, &input.class_id)
            .await?
            .ok_or_else(|| not_found(COLLECTION, &input.class_id))
    }

    fn map(&self, record: StoredRecord) -> Result<ClassroomDto, DataAccessError> {
        to_dto(record)
    }
}
