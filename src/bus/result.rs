//! Data access results returned by the query bus.
//!
//! Kept separate from the transport envelope: the bus speaks `payload`, the
//! transport speaks `data`, and neither layer depends on the other's shape.

use serde::{ser::SerializeStruct, Serialize, Serializer};
use serde_json::{json, Value};

use crate::{core::error::ErrorCode, store::StoreError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataAccessError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl DataAccessError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn handler_not_found(name: &str) -> Self {
        Self::new(
            ErrorCode::HandlerNotFound,
            format!("No query handler registered for '{name}'"),
        )
        .with_details(json!({ "query": name }))
    }

    pub fn validation(message: impl Into<String>, fields: Vec<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message).with_details(json!({ "fields": fields }))
    }

    /// Maps a store failure onto the wire taxonomy.
    ///
    /// Only `NOT_FOUND` and `DEADLINE_EXCEEDED` echo specifics; every other
    /// store failure gets a generic message. Callers log the original error.
    pub fn from_store(err: &StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, key } => Self::new(
                ErrorCode::NotFound,
                format!("Record not found: {collection}/{key}"),
            ),
            StoreError::Conflict { collection, key } => Self::new(
                ErrorCode::PersistenceError,
                "Persistence operation failed",
            )
            .with_details(json!({ "reason": "conflict", "collection": collection, "key": key })),
            StoreError::DeadlineExceeded => Self::new(
                ErrorCode::DeadlineExceeded,
                "Deadline exceeded before persistence completed",
            ),
            StoreError::Unavailable(_)
            | StoreError::Serialization(_)
            | StoreError::Backend(_) => {
                Self::new(ErrorCode::PersistenceError, "Persistence operation failed")
            }
        }
    }
}

/// Handler-internal result: `{success: true, payload} | {success: false, error}`
#[derive(Debug, Clone, PartialEq)]
pub enum DataAccessResult<T = Value> {
    Success { payload: T },
    Failure { error: DataAccessError },
}

impl<T> DataAccessResult<T> {
    pub fn success(payload: T) -> Self {
        DataAccessResult::Success { payload }
    }

    pub fn failure(error: DataAccessError) -> Self {
        DataAccessResult::Failure { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DataAccessResult::Success { .. })
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            DataAccessResult::Success { .. } => None,
            DataAccessResult::Failure { error } => Some(error.code),
        }
    }

    pub fn into_result(self) -> Result<T, DataAccessError> {
        match self {
            DataAccessResult::Success { payload } => Ok(payload),
            DataAccessResult::Failure { error } => Err(error),
        }
    }
}

impl<T> From<Result<T, DataAccessError>> for DataAccessResult<T> {
    fn from(result: Result<T, DataAccessError>) -> Self {
        match result {
            Ok(payload) => DataAccessResult::success(payload),
            Err(error) => DataAccessResult::failure(error),
        }
    }
}

impl<T: Serialize> Serialize for DataAccessResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DataAccessResult", 2)?;
        match self {
            DataAccessResult::Success { payload } => {
                state.serialize_field("success", &true)?;
                state.serialize_field("payload", payload)?;
            }
            DataAccessResult::Failure { error } => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}
