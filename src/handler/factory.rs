//! Handler construction at startup.
//!
//! Handlers are built from an explicit, ordered list of constructor functions
//! that each receive the same dependency bundle. Construction is fail-fast: an
//! incomplete handler set would leave the bus silently unable to serve some
//! queries, so the first failure aborts startup.

use std::sync::Arc;

use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use uuid::Uuid;

use super::DynQueryHandler;
use crate::{
    core::error::{BridgeError, BridgeResult},
    handlers::{classrooms, users},
    store::SharedStore,
};

/// Generates record identifiers
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Dependencies threaded into every handler constructor
#[derive(Clone)]
pub struct HandlerDeps {
    pub store: SharedStore,
    pub ids: IdGenerator,
}

impl HandlerDeps {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            ids: Arc::new(|| Uuid::new_v4().to_string()),
        }
    }

    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn next_id(&self) -> String {
        (self.ids)()
    }
}

/// Handler factory function type
pub type HandlerCreateFn = fn(&HandlerDeps) -> BridgeResult<Arc<dyn DynQueryHandler>>;

/// Ordered registry of built-in handler constructors keyed by query name.
static HANDLER_BUILDER_REGISTRY: Lazy<Vec<(&'static str, HandlerCreateFn)>> = Lazy::new(|| {
    let builders: Vec<(&'static str, HandlerCreateFn)> = vec![
        (users::CREATE, users::create_users_create_handler),
        (users::GET, users::create_users_get_handler),
        (users::LIST, users::create_users_list_handler),
        (users::DELETE, users::create_users_delete_handler),
        (classrooms::CREATE, classrooms::create_classrooms_create_handler),
        (classrooms::GET, classrooms::create_classrooms_get_handler),
    ];
    builders
});

/// Instantiates every handler in `builders`, in order.
///
/// # Errors
/// Returns `BridgeError::Instantiation` for the first constructor that fails.
pub fn instantiate_handlers(
    builders: &[(&'static str, HandlerCreateFn)],
    deps: &HandlerDeps,
) -> BridgeResult<Vec<Arc<dyn DynQueryHandler>>> {
    let mut handlers = Vec::with_capacity(builders.len());

    for (name, build) in builders {
        let handler = build(deps).map_err(|e| {
            error!("Failed to instantiate query handler {}: {}", name, e);
            match e {
                err @ BridgeError::Instantiation { .. } => err,
                other => BridgeError::Instantiation {
                    handler: name.to_string(),
                    reason: other.to_string(),
                },
            }
        })?;

        if handler.name() != *name {
            warn!(
                "Query handler registered as {} reports name {}",
                name,
                handler.name()
            );
        }
        debug!("Instantiated query handler {}", name);
        handlers.push(handler);
    }

    info!("Instantiated {} query handlers", handlers.len());
    Ok(handlers)
}

/// Instantiates the built-in handler set.
pub fn builtin_handlers(deps: &HandlerDeps) -> BridgeResult<Vec<Arc<dyn DynQueryHandler>>> {
    instantiate_handlers(&HANDLER_BUILDER_REGISTRY, deps)
}

/// Names of the built-in queries in registration order
pub fn builtin_query_names() -> Vec<&'static str> {
    HANDLER_BUILDER_REGISTRY.iter().map(|(name, _)| *name).collect()
}
