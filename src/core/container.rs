//! Startup wiring
//!
//! The container owns every long-lived component. It is built once from the
//! configuration; afterwards the bus and router are shared read-only.

use std::{sync::Arc, time::Duration};

use log::info;

use super::error::BridgeResult;
use crate::{
    api,
    bus::QueryBus,
    config::{Config, StoreBackend},
    config_error,
    handler::HandlerDeps,
    store::{EtcdStore, MemoryStore, SharedStore, Store},
    transport::{ChannelServer, IpcRouter},
};

pub struct ServiceContainer {
    config: Config,
    store: SharedStore,
    bus: Arc<QueryBus>,
    router: Arc<IpcRouter>,
}

impl ServiceContainer {
    /// Builds the container with the store selected in `config`.
    pub fn build(config: Config) -> BridgeResult<Self> {
        let store = build_store(&config)?;
        Self::with_deps(config, HandlerDeps::new(store))
    }

    /// Builds the container around explicit handler dependencies.
    pub fn with_deps(config: Config, deps: HandlerDeps) -> BridgeResult<Self> {
        let bus = Arc::new(QueryBus::from_deps(&deps)?);

        let mut router = IpcRouter::new().with_default_timeout(
            config.transport.call_timeout_ms.map(Duration::from_millis),
        );
        api::register_routes(&mut router, bus.clone())?;

        info!(
            "Loaded {} routes and {} query handlers on {} store",
            router.len(),
            bus.len(),
            deps.store.name()
        );

        Ok(Self {
            config,
            store: deps.store,
            bus,
            router: Arc::new(router),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn bus(&self) -> Arc<QueryBus> {
        self.bus.clone()
    }

    pub fn router(&self) -> Arc<IpcRouter> {
        self.router.clone()
    }

    /// Channel server configured from the transport section
    pub fn channel_server(&self) -> ChannelServer {
        ChannelServer::from_config(self.router(), &self.config.transport)
    }
}

fn build_store(config: &Config) -> BridgeResult<SharedStore> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Etcd => {
            let etcd = config
                .store
                .etcd
                .clone()
                .ok_or_else(|| config_error!("store.etcd is required for the etcd backend"))?;
            Ok(Arc::new(EtcdStore::new(etcd)))
        }
    }
}
