//! Catalog cache server — disk store, query translator, remote client,
//! cache core, graph walker, owner resolver, cloner, MITM proxy, and the
//! PDP handler contract.
//!
//! - **`storedb`** ([`storedb`]): the SQLite-backed Disk Store.
//! - **`query`** ([`query`]): the Query Translator.
//! - **`remote`** ([`remote`]): the Remote Client.
//! - **`cache`** ([`cache`]): Cache Core, Graph Walker, Owner Resolver, Cloner.
//! - **`proxy`** ([`proxy`]): the intercepting MITM proxy.
//! - **`pdp`** ([`pdp`]): the PDP handler contract (policy hook traits).
//! - **`config`** ([`config`]): top-level server configuration wiring the
//!   above together for a selected [`catalog_core::Environment`].
//! - **`error`** ([`error`]): module-local error types.

pub mod cache;
pub mod config;
pub mod error;
pub mod pdp;
pub mod proxy;
pub mod query;
pub mod remote;
pub mod storedb;

use std::sync::Arc;

pub use cache::{CacheCore, Cloner, GraphWalker, OwnerResolver, RetrieveMode, RetrieveOutcome};
pub use config::{ProxyConfigSettings, ServerConfig};
pub use remote::{RemoteClient, RemoteFetch, RemotePathTable};
pub use storedb::{DiskStore, SqliteDiskStore};

use catalog_core::ResourceType;

/// Ties the Disk Store, Remote Client, and Cache Core together behind the
/// resolved [`ServerConfig`] — the assembly point a binary front-end
/// constructs once at startup and shares via `Arc` across request tasks,
/// the way `NetworkModule::new` allocates shared state before `start`/`serve`.
pub struct CatalogApp {
    pub core: Arc<CacheCore>,
    pub cloner: Arc<Cloner>,
    config: ServerConfig,
}

impl CatalogApp {
    /// Opens the Disk Store at `config.db_path`, builds a `RemoteClient`
    /// from the resolved path table, and assembles the Cache Core and
    /// Cloner around them.
    pub async fn build(config: ServerConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn DiskStore> = Arc::new(
            SqliteDiskStore::connect(&config.db_path.to_string_lossy()).await?,
        );
        let remote: Arc<dyn RemoteFetch> = Arc::new(RemoteClient::new(config.remote_path_table())?);
        let core = Arc::new(CacheCore::new(store, Arc::clone(&remote), config.cache.clone()));

        let resource_types: Vec<ResourceType> = config
            .cache
            .kebab_types
            .resource_types()
            .into_iter()
            .map(|name| ResourceType::from_camel_case(&name))
            .collect();
        let cloner = Arc::new(Cloner::new(Arc::clone(&core), remote, resource_types));

        Ok(CatalogApp { core, cloner, config })
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Initializes the `tracing` subscriber from `RUST_LOG` (default `info`),
/// the way every binary front-end in this workspace starts up.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
