//! Application state shared by the CLI and the tool server.

use std::sync::Arc;

use common::config::AppConfig;
use common::errors::AppResult;
use query_engine::{AdapterRegistry, Dispatcher};
use registry::{ConnectionService, ConnectionStore, SqliteConnectionStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub connections: ConnectionService,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Opens the registry named by the config and wires the default adapters.
    pub async fn open(config: AppConfig) -> AppResult<Self> {
        let store: Arc<dyn ConnectionStore> = Arc::new(SqliteConnectionStore::open(&config.registry_url).await?);
        let adapters = AdapterRegistry::with_defaults(config.connect_timeout());
        Ok(Self::with_parts(config, store, adapters))
    }

    pub fn with_parts(config: AppConfig, store: Arc<dyn ConnectionStore>, adapters: AdapterRegistry) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&store), Arc::new(adapters), config.query_timeout());
        Self {
            connections: ConnectionService::new(store),
            dispatcher: Arc::new(dispatcher),
            config,
        }
    }
}
