//! Top-level server configuration, tying the cache core, remote path table,
//! and MITM proxy settings to a selected deployment environment.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use catalog_core::{CacheConfig, Environment};

use crate::proxy::ProxyConfig;
use crate::remote::RemotePathTable;

/// Top-level configuration for the catalog cache server: the store,
/// remote, and proxy stack assembled from one selected environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub environment: Environment,
    pub db_path: PathBuf,
    pub cache: CacheConfig,
    pub proxy: ProxyConfigSettings,
    pub request_timeout: Duration,
}

/// Proxy-specific settings that aren't already owned by `CacheConfig`.
#[derive(Debug, Clone)]
pub struct ProxyConfigSettings {
    pub listen_host: String,
    pub listen_port: u16,
    pub proxy_username: String,
    pub proxy_password: String,
    pub catalog_path_prefixes: Vec<String>,
    pub pdp_base_url: String,
}

impl ServerConfig {
    /// Resolves a complete configuration for `environment`, wiring the
    /// environment's base URL and MITM allow-list into `CacheConfig` and
    /// `ProxyConfig`.
    #[must_use]
    pub fn resolve(environment: Environment, cache: CacheConfig, proxy: ProxyConfigSettings) -> Self {
        let env_config = environment.resolve();
        ServerConfig {
            environment,
            db_path: PathBuf::from(env_config.db_path),
            cache,
            proxy,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Builds the `ProxyConfig` the MITM proxy needs from this server
    /// configuration and the environment's resolved allow-list.
    #[must_use]
    pub fn proxy_config(&self) -> ProxyConfig {
        let env_config = self.environment.resolve();
        ProxyConfig {
            proxy_username: self.proxy.proxy_username.clone(),
            proxy_password: self.proxy.proxy_password.clone(),
            target_allow_list: env_config.mitm_allow_list.into_iter().collect::<HashSet<_>>(),
            catalog_path_prefixes: self.proxy.catalog_path_prefixes.clone(),
            pdp_base_url: self.proxy.pdp_base_url.clone(),
        }
    }

    /// Builds the `RemotePathTable` for this server's registered resource
    /// types, rooted at the environment's base URL.
    #[must_use]
    pub fn remote_path_table(&self) -> RemotePathTable {
        let env_config = self.environment.resolve();
        let mut table = RemotePathTable::from_entries(Vec::new());
        for resource_type in &self.cache.kebab_types.resource_types() {
            table.insert(
                resource_type.clone(),
                crate::remote::PathEntry {
                    host: env_config.base_url.clone(),
                    path_prefix: format!("/{resource_type}"),
                },
            );
        }
        table
    }
}
