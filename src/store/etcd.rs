//! etcd-backed store.
//!
//! Keys are laid out as `<prefix>/<collection>/<key>` with JSON values. The
//! client is created lazily and dropped after any failed round trip so that
//! the next call reconnects.

use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{
    Client, Compare, CompareOp, ConnectOptions, GetOptions, KeyValue, Txn, TxnOp,
};
use log::{error, info};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{Store, StoreError, StoredRecord};
use crate::config::Etcd;

pub struct EtcdStore {
    config: Etcd,
    client: Mutex<Option<Client>>,
}

impl EtcdStore {
    pub fn new(config: Etcd) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    async fn create_client(&self) -> Result<Client, etcd_client::Error> {
        let mut options = ConnectOptions::default();
        if let Some(timeout) = self.config.timeout {
            options = options.with_timeout(Duration::from_secs(timeout as u64));
        };
        if let Some(connect_timeout) = self.config.connect_timeout {
            options = options.with_connect_timeout(Duration::from_secs(connect_timeout as u64));
        };
        if let (Some(user), Some(password)) = (&self.config.user, &self.config.password) {
            options = options.with_user(user.clone(), password.clone());
        };

        Client::connect(self.config.host.clone(), Some(options)).await
    }

    /// Returns a handle to the shared client, connecting on first use
    async fn client(&self) -> Result<Client, StoreError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        info!("Creating new etcd client...");
        let client = self.create_client().await.map_err(|e| {
            error!("Failed to create etcd client: {:?}", e);
            StoreError::Unavailable(e.to_string())
        })?;
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Drops the cached client so the next call reconnects
    async fn reset(&self, err: etcd_client::Error) -> StoreError {
        error!("etcd operation failed: {:?}", err);
        *self.client.lock().await = None;
        StoreError::Backend(err.to_string())
    }

    fn collection_prefix(&self, collection: &str) -> String {
        format!("{}/{}/", self.config.prefix.trim_end_matches('/'), collection)
    }

    fn full_key(&self, collection: &str, key: &str) -> String {
        format!("{}{}", self.collection_prefix(collection), key)
    }

    fn encode(value: &Value) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value).map_err(StoreError::Serialization)
    }

    fn to_record(&self, collection: &str, kv: &KeyValue) -> Result<StoredRecord, StoreError> {
        let full_key = kv
            .key_str()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let key = full_key
            .strip_prefix(&self.collection_prefix(collection))
            .unwrap_or(full_key);
        let value = serde_json::from_slice(kv.value()).map_err(StoreError::Serialization)?;

        Ok(StoredRecord {
            collection: collection.to_string(),
            key: key.to_string(),
            create_revision: kv.create_revision(),
            mod_revision: kv.mod_revision(),
            value,
        })
    }
}

#[async_trait]
impl Store for EtcdStore {
    fn name(&self) -> &'static str {
        "etcd"
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        let mut client = self.client().await?;
        let response = match client.get(self.full_key(collection, key), None).await {
            Ok(response) => response,
            Err(e) => return Err(self.reset(e).await),
        };

        response
            .kvs()
            .first()
            .map(|kv| self.to_record(collection, kv))
            .transpose()
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let mut client = self.client().await?;
        let options = GetOptions::new().with_prefix();
        let response = match client
            .get(self.collection_prefix(collection), Some(options))
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(self.reset(e).await),
        };

        let mut records = response
            .kvs()
            .iter()
            .map(|kv| self.to_record(collection, kv))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn create(
        &self,
        collection: &str,
        key: &str,
        value: Value,
    ) -> Result<StoredRecord, StoreError> {
        let full_key = self.full_key(collection, key);
        let txn = Txn::new()
            .when([Compare::create_revision(
                full_key.clone(),
                CompareOp::Equal,
                0,
            )])
            .and_then([TxnOp::put(full_key, Self::encode(&value)?, None)]);

        let mut client = self.client().await?;
        let response = match client.txn(txn).await {
            Ok(response) => response,
            Err(e) => return Err(self.reset(e).await),
        };

        if !response.succeeded() {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }

        let revision = response.header().map(|h| h.revision()).unwrap_or_default();
        Ok(StoredRecord {
            collection: collection.to_string(),
            key: key.to_string(),
            create_revision: revision,
            mod_revision: revision,
            value,
        })
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        value: Value,
    ) -> Result<StoredRecord, StoreError> {
        let mut client = self.client().await?;
        if let Err(e) = client
            .put(self.full_key(collection, key), Self::encode(&value)?, None)
            .await
        {
            return Err(self.reset(e).await);
        }

        // Re-read to report both revisions.
        self.get(collection, key)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            })
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let mut client = self.client().await?;
        match client.delete(self.full_key(collection, key), None).await {
            Ok(response) => Ok(response.deleted() > 0),
            Err(e) => Err(self.reset(e).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn etcd_config(prefix: &str) -> Etcd {
        Etcd {
            host: vec!["127.0.0.1:2379".to_string()],
            prefix: prefix.to_string(),
            timeout: None,
            connect_timeout: None,
            user: None,
            password: None,
        }
    }

    #[test]
    fn test_key_layout() {
        let store = EtcdStore::new(etcd_config("/hostbridge/"));
        assert_eq!(store.collection_prefix("users"), "/hostbridge/users/");
        assert_eq!(store.full_key("users", "42"), "/hostbridge/users/42");
    }

    #[test]
    fn test_encode_is_json() {
        let bytes = EtcdStore::encode(&serde_json::json!({"name": "Ana"})).unwrap();
        assert_eq!(bytes, br#"{"name":"Ana"}"#.to_vec());
    }
}
