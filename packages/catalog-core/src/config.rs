//! Process-wide constants and configuration values threaded through the
//! cache ("expose them through an immutable configuration value",
//! not globals).

use serde::{Deserialize, Serialize};

use crate::resource_type::KebabTypeTable;

/// The fixed DID and display name identifying the ecosystem operator; used
/// as the forced owner for every `category` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcosystemOperator {
    pub did: String,
    pub name: String,
}

impl EcosystemOperator {
    #[must_use]
    pub fn new(did: impl Into<String>, name: impl Into<String>) -> Self {
        EcosystemOperator {
            did: did.into(),
            name: name.into(),
        }
    }
}

/// Named runtime environments: each resolves to a base URL, a
/// database filename, and an allow-list of hosts the MITM proxy intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Local,
}

/// The concrete settings a given [`Environment`] resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub base_url: String,
    pub db_path: String,
    pub mitm_allow_list: Vec<String>,
}

impl Environment {
    #[must_use]
    pub fn resolve(self) -> EnvironmentConfig {
        match self {
            Environment::Production => EnvironmentConfig {
                base_url: "https://catalog.prod.example.org".to_string(),
                db_path: "catalog-prod.db".to_string(),
                mitm_allow_list: vec!["catalog.prod.example.org".to_string()],
            },
            Environment::Staging => EnvironmentConfig {
                base_url: "https://catalog.staging.example.org".to_string(),
                db_path: "catalog-staging.db".to_string(),
                mitm_allow_list: vec!["catalog.staging.example.org".to_string()],
            },
            Environment::Local => EnvironmentConfig {
                base_url: "http://localhost:8080".to_string(),
                db_path: "catalog-local.db".to_string(),
                mitm_allow_list: vec!["localhost".to_string()],
            },
        }
    }
}

/// The immutable configuration value threaded through the whole cache:
/// ecosystem operator identity, the kebab-type table, and the cache-wide
/// tunables.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub operator: EcosystemOperator,
    pub kebab_types: KebabTypeTable,
    /// Age threshold beyond which a cache entry must be revalidated;
    /// default 3600.
    pub max_freshness_seconds: i64,
    /// Page size used by the cloner's `FetchList` loop; default 100.
    pub clone_page_size: u32,
}

impl CacheConfig {
    /// Builds a config for a given operator identity, with the default
    /// kebab-type table and tunables.
    #[must_use]
    pub fn new(operator: EcosystemOperator) -> Self {
        CacheConfig {
            operator,
            kebab_types: KebabTypeTable::default_table(),
            max_freshness_seconds: 3600,
            clone_page_size: 100,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::new(EcosystemOperator::new("did:elsi:VATEU-OPERATOR", "DOME Operator"))
    }
}
