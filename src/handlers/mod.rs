//! Built-in query handlers.

pub mod classrooms;
pub mod users;

use log::error;
use serde::de::DeserializeOwned;

use crate::{
    bus::DataAccessError,
    core::error::ErrorCode,
    store::{StoreError, StoredRecord},
};

/// Decodes a stored document, reporting corrupt data as a persistence failure.
pub(crate) fn decode_record<T: DeserializeOwned>(
    record: &StoredRecord,
) -> Result<T, DataAccessError> {
    record.decode().map_err(|e| {
        error!(
            "Malformed record {}/{}: {}",
            record.collection, record.key, e
        );
        DataAccessError::new(ErrorCode::PersistenceError, "Persistence operation failed")
    })
}

pub(crate) fn not_found(collection: &str, key: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        key: key.to_string(),
    }
}
