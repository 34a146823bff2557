//! Catalog cache core -- the object model, canonical hashing, DID/URN
//! helpers, shared configuration types, and the crate-wide error taxonomy.
//!
//! - **`object`** ([`object`]): `CatalogObject`, the unit of caching, and its
//!   construction-time invariants.
//! - **`value`** ([`value`]): the recursive `Value` JSON variant behind
//!   `CatalogObject::content_map`.
//! - **`hash`** ([`hash`]): canonical JSON serialization and SHA-256 content
//!   hashing.
//! - **`did`** ([`did`]): `did:elsi:` identifier normalization.
//! - **`resource_type`** ([`resource_type`]): the TMForum resource type enum
//!   and the kebab-type table.
//! - **`config`** ([`config`]): ecosystem operator constants, environment
//!   selection, and the cache-wide config value.
//! - **`error`** ([`error`]): the crate-wide error taxonomy.
//!
//! This crate has no I/O — everything that touches a network socket or the
//! filesystem lives in `catalog-server`.

pub mod config;
pub mod did;
pub mod error;
pub mod hash;
pub mod object;
pub mod resource_type;
pub mod value;

pub use config::{CacheConfig, EcosystemOperator, Environment, EnvironmentConfig};
pub use error::CatalogError;
pub use object::{CatalogObject, OwnerHints};
pub use resource_type::{KebabTypeTable, ResourceType};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        let config = CacheConfig::default();
        assert_eq!(config.max_freshness_seconds, 3600);
    }

    #[test]
    fn reexports_accessible() {
        let _ = Value::Null;
        let _ = ResourceType::Catalog;
        let _ = Environment::Local.resolve();
        let _ = EcosystemOperator::new("did:elsi:x", "x");
        let _ = KebabTypeTable::default_table();
    }
}
