//! Named query dispatch.
//!
//! The bus owns one handler per query name. `execute` never panics and never
//! returns a bare error: unknown names become `HANDLER_NOT_FOUND` results.

pub mod result;

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, info};
use serde_json::Value;

use crate::{
    core::error::{BridgeError, BridgeResult},
    handler::{builtin_handlers, DynQueryHandler, ExecutionContext, HandlerDeps},
};

pub use result::{DataAccessError, DataAccessResult};

pub struct QueryBus {
    handlers: HashMap<&'static str, Arc<dyn DynQueryHandler>>,
}

impl QueryBus {
    /// Builds a bus from already-instantiated handlers.
    ///
    /// # Errors
    /// Returns `BridgeError::DuplicateHandler` if two handlers share a name.
    pub fn new(handlers: Vec<Arc<dyn DynQueryHandler>>) -> BridgeResult<Self> {
        let mut map = HashMap::with_capacity(handlers.len());
        for handler in handlers {
            let name = handler.name();
            if map.insert(name, handler).is_some() {
                return Err(BridgeError::DuplicateHandler(name.to_string()));
            }
            debug!("Registered query handler {}", name);
        }
        Ok(Self { handlers: map })
    }

    /// Builds a bus over the built-in handler set.
    pub fn from_deps(deps: &HandlerDeps) -> BridgeResult<Self> {
        Self::new(builtin_handlers(deps)?)
    }

    pub async fn execute(&self, name: &str, params: Value) -> DataAccessResult<Value> {
        self.execute_with_deadline(name, params, None).await
    }

    pub async fn execute_with_timeout(
        &self,
        name: &str,
        params: Value,
        timeout: Duration,
    ) -> DataAccessResult<Value> {
        self.execute_with_deadline(name, params, Some(Instant::now() + timeout))
            .await
    }

    pub async fn execute_with_deadline(
        &self,
        name: &str,
        params: Value,
        deadline: Option<Instant>,
    ) -> DataAccessResult<Value> {
        let started = Instant::now();

        let result = match self.handlers.get(name) {
            Some(handler) => handler.handle(params, ExecutionContext::new(deadline)).await,
            None => DataAccessResult::failure(DataAccessError::handler_not_found(name)),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let success = result.is_success();
        let code = result.error_code().map(|c| c.as_str()).unwrap_or("OK");
        info!(query = name, success = success, code = code, elapsed_ms = elapsed_ms; "query executed");

        result
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered query names, sorted
    pub fn handler_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{core::error::ErrorCode, handlers::users, store::MemoryStore};

    fn bus() -> QueryBus {
        let deps = HandlerDeps::new(Arc::new(MemoryStore::new()))
            .with_id_generator(Arc::new(|| "generated".to_string()));
        QueryBus::from_deps(&deps).unwrap()
    }

    #[tokio::test]
    async fn test_execute_users_create() {
        let result = bus().execute("users.create", json!({"name": "Ana"})).await;
        assert_eq!(
            result,
            DataAccessResult::success(json!({"id": "generated", "name": "Ana"}))
        );
    }

    #[tokio::test]
    async fn test_unknown_query_is_handler_not_found() {
        let result = bus().execute("nope.nothing", json!({})).await;
        match result {
            DataAccessResult::Failure { error } => {
                assert_eq!(error.code, ErrorCode::HandlerNotFound);
                assert_eq!(error.details, Some(json!({"query": "nope.nothing"})));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expired_timeout_is_deadline_exceeded() {
        let result = bus()
            .execute_with_timeout("users.list", json!({}), Duration::ZERO)
            .await;
        assert_eq!(result.error_code(), Some(ErrorCode::DeadlineExceeded));
    }

    #[test]
    fn test_duplicate_handler_names_rejected() {
        let deps = HandlerDeps::new(Arc::new(MemoryStore::new()));
        let handlers = vec![
            users::create_users_get_handler(&deps).unwrap(),
            users::create_users_get_handler(&deps).unwrap(),
        ];
        match QueryBus::new(handlers) {
            Err(BridgeError::DuplicateHandler(name)) => assert_eq!(name, "users.get"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("duplicate handler accepted"),
        }
    }

    #[test]
    fn test_handler_names_sorted() {
        let bus = bus();
        assert_eq!(
            bus.handler_names(),
            vec![
                "classrooms.create",
                "classrooms.get",
                "users.create",
                "users.delete",
                "users.get",
                "users.list"
            ]
        );
        assert!(bus.contains("users.get"));
        assert!(!bus.contains("users"));
    }
}
