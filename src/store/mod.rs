//! Persistence collaborators used by query handlers.
//!
//! A `Store` hands back `StoredRecord`s: the persistence-native shape carrying
//! key and revision metadata. Records deliberately do not implement
//! `Serialize`; handlers must map them to plain DTOs before results leave the
//! query bus.

pub mod etcd;
pub mod memory;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use etcd::EtcdStore;
pub use memory::MemoryStore;

/// A record as returned by the persistence layer
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub collection: String,
    pub key: String,
    /// Revision at which the record was created
    pub create_revision: i64,
    /// Revision of the last modification
    pub mod_revision: i64,
    pub value: Value,
}

impl StoredRecord {
    /// Decodes the stored document into a plain type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.value.clone()).map_err(StoreError::Serialization)
    }
}

#[derive(Debug)]
pub enum StoreError {
    /// No record under the requested key
    NotFound { collection: String, key: String },

    /// Create attempted on an existing key
    Conflict { collection: String, key: String },

    /// Backend could not be reached
    Unavailable(String),

    /// Stored bytes are not valid JSON for the expected type
    Serialization(serde_json::Error),

    /// The call deadline passed before the round trip
    DeadlineExceeded,

    /// Any other backend failure
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { collection, key } => {
                write!(f, "Record not found: {collection}/{key}")
            }
            StoreError::Conflict { collection, key } => {
                write!(f, "Record already exists: {collection}/{key}")
            }
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {msg}"),
            StoreError::Serialization(err) => write!(f, "Stored data is malformed: {err}"),
            StoreError::DeadlineExceeded => write!(f, "Deadline exceeded"),
            StoreError::Backend(msg) => write!(f, "Store backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

/// Async persistence interface shared by every handler
#[async_trait]
pub trait Store: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredRecord>, StoreError>;

    /// All records of a collection ordered by key
    async fn list(&self, collection: &str) -> Result<Vec<StoredRecord>, StoreError>;

    /// Inserts a new record, failing with `Conflict` if the key exists
    async fn create(
        &self,
        collection: &str,
        key: &str,
        value: Value,
    ) -> Result<StoredRecord, StoreError>;

    /// Inserts or replaces a record
    async fn put(&self, collection: &str, key: &str, value: Value)
        -> Result<StoredRecord, StoreError>;

    /// Removes a record, returning whether it existed
    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError>;
}

pub type SharedStore = Arc<dyn Store>;
