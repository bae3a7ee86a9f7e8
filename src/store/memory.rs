//! In-process store backed by a concurrent map.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use log::debug;
use serde_json::Value;

use super::{Store, StoreError, StoredRecord};

/// Memory store; revisions increase monotonically across all collections
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<(String, String), StoredRecord>,
    revision: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_revision(&self) -> i64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self
            .records
            .get(&(collection.to_string(), key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let mut records: Vec<StoredRecord> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn create(
        &self,
        collection: &str,
        key: &str,
        value: Value,
    ) -> Result<StoredRecord, StoreError> {
        match self.records.entry((collection.to_string(), key.to_string())) {
            Entry::Occupied(_) => Err(StoreError::Conflict {
                collection: collection.to_string(),
                key: key.to_string(),
            }),
            Entry::Vacant(vacant) => {
                let revision = self.next_revision();
                let record = StoredRecord {
                    collection: collection.to_string(),
                    key: key.to_string(),
                    create_revision: revision,
                    mod_revision: revision,
                    value,
                };
                debug!("Created {}/{} at revision {}", collection, key, revision);
                vacant.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        value: Value,
    ) -> Result<StoredRecord, StoreError> {
        let revision = self.next_revision();
        let mut entry = self
            .records
            .entry((collection.to_string(), key.to_string()))
            .or_insert_with(|| StoredRecord {
                collection: collection.to_string(),
                key: key.to_string(),
                create_revision: revision,
                mod_revision: revision,
                value: Value::Null,
            });
        entry.mod_revision = revision;
        entry.value = value;
        Ok(entry.value().clone())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .records
            .remove(&(collection.to_string(), key.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_create_get_and_conflict() {
        let store = MemoryStore::new();
        let created = store.create("users", "1", json!({"name": "Ana"})).await.unwrap();
        assert_eq!(created.create_revision, 1);
        assert_eq!(created.mod_revision, 1);

        let fetched = store.get("users", "1").await.unwrap().unwrap();
        assert_eq!(fetched, created);

        let err = store.create("users", "1", json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_put_keeps_create_revision() {
        let store = MemoryStore::new();
        store.put("users", "1", json!({"name": "Ana"})).await.unwrap();
        let updated = store.put("users", "1", json!({"name": "Bea"})).await.unwrap();
        assert_eq!(updated.create_revision, 1);
        assert_eq!(updated.mod_revision, 2);
        assert_eq!(updated.value["name"], "Bea");
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_ordered() {
        let store = MemoryStore::new();
        store.put("users", "b", json!(2)).await.unwrap();
        store.put("users", "a", json!(1)).await.unwrap();
        store.put("classrooms", "x", json!(3)).await.unwrap();

        let keys: Vec<String> = store
            .list("users")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store.put("users", "1", json!(1)).await.unwrap();
        assert!(store.delete("users", "1").await.unwrap());
        assert!(!store.delete("users", "1").await.unwrap());
        assert!(store.get("users", "1").await.unwrap().is_none());
    }
}
