//! Cache Core: orchestrates local lookup, freshness check,
//! remote refresh, and upsert under a transaction.

pub mod cloner;
pub mod resolver;
pub mod walker;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use catalog_core::{CacheConfig, CatalogError, CatalogObject, OwnerHints};

use crate::error::StoreError;
use crate::remote::RemoteFetch;
use crate::storedb::DiskStore;

pub use cloner::Cloner;
pub use resolver::OwnerResolver;
pub use walker::GraphWalker;

/// Whether `RetrieveOrUpdate` is allowed to fall through to the Remote
/// Client on a cache miss or stale entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveMode {
    LocalOnly,
    LocalOrRemote,
}

/// The outcome of a `RetrieveOrUpdate` call: the object plus whether it was
/// served from the local store without a remote round-trip.
#[derive(Debug, Clone)]
pub struct RetrieveOutcome {
    pub object: CatalogObject,
    pub local: bool,
}

/// Orchestrates the Disk Store and Remote Client behind a single entry
/// point, `retrieve_or_update`. Shared across request tasks behind an
/// `Arc`, the same way the shutdown controller and connection registries
/// are shared.
pub struct CacheCore {
    store: Arc<dyn DiskStore>,
    remote: Arc<dyn RemoteFetch>,
    config: CacheConfig,
    refresh_count: AtomicU64,
}

impl CacheCore {
    #[must_use]
    pub fn new(store: Arc<dyn DiskStore>, remote: Arc<dyn RemoteFetch>, config: CacheConfig) -> Self {
        CacheCore {
            store,
            remote,
            config,
            refresh_count: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DiskStore> {
        &self.store
    }

    /// Advisory refresh counter, incremented with relaxed ordering; not
    /// part of any correctness invariant.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    /// The `RetrieveOrUpdate` contract.
    pub async fn retrieve_or_update(
        &self,
        id: &str,
        resource_type: &str,
        hints: &OwnerHints,
        mode: RetrieveMode,
        now: i64,
    ) -> Result<RetrieveOutcome, CatalogError> {
        match self.store.retrieve(id, resource_type, None).await {
            Ok(mut object) => {
                let age = now - object.updated;
                if age < self.config.max_freshness_seconds {
                    if self.patch_owner_hints_if_missing(&mut object, hints, now).await? {
                        tracing::debug!(id, resource_type, "patched owner hints on fresh local object");
                    }
                    Ok(RetrieveOutcome { object, local: true })
                } else {
                    self.refresh_count.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("catalog_cache_stale_refreshes_total", "resourceType" => resource_type.to_string()).increment(1);
                    self.refresh_from_remote(id, resource_type, hints, now).await
                }
            }
            Err(StoreError::RowNotFound { .. }) => match mode {
                RetrieveMode::LocalOnly => Err(CatalogError::not_found(resource_type, id)),
                RetrieveMode::LocalOrRemote => self.refresh_from_remote(id, resource_type, hints, now).await,
            },
            Err(other) => Err(other.into()),
        }
    }

    async fn patch_owner_hints_if_missing(
        &self,
        object: &mut CatalogObject,
        hints: &OwnerHints,
        now: i64,
    ) -> Result<bool, CatalogError> {
        if object.seller.is_empty() && hints.seller_did.is_some() {
            object.apply_owner_hints(hints);
            object.recompute_content();
            self.store
                .upsert(object, self.config.max_freshness_seconds, now)
                .await
                .map_err(CatalogError::from)?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn refresh_from_remote(
        &self,
        id: &str,
        resource_type: &str,
        hints: &OwnerHints,
        now: i64,
    ) -> Result<RetrieveOutcome, CatalogError> {
        let remote_value = self
            .remote
            .fetch_one(id, resource_type)
            .await
            .map_err(CatalogError::from)?;

        let declared = catalog_core::ResourceType::from_camel_case(resource_type);
        let mut object =
            CatalogObject::from_upstream(remote_value, Some(&declared), &self.config.kebab_types, now)?;

        if object.seller.is_empty() {
            object.apply_owner_hints(hints);
        }
        if object.resource_type == catalog_core::ResourceType::Category {
            object.force_operator_ownership(&self.config.operator);
        }
        object.recompute_content();

        self.store
            .upsert(&object, self.config.max_freshness_seconds, now)
            .await
            .map_err(CatalogError::from)?;

        metrics::counter!("catalog_cache_remote_fetches_total", "resourceType" => resource_type.to_string()).increment(1);
        Ok(RetrieveOutcome { object, local: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;
    use crate::storedb::sqlite::SqliteDiskStore;
    use async_trait::async_trait;
    use catalog_core::Value;
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;

    struct StubRemote {
        body: Value,
        calls: StdMutex<u32>,
    }

    #[async_trait]
    impl RemoteFetch for StubRemote {
        async fn fetch_one(&self, _id: &str, _resource_type: &str) -> Result<Value, RemoteError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.body.clone())
        }

        async fn fetch_list_page(
            &self,
            _resource_type: &str,
            _limit: u32,
            _offset: u32,
            _query: &crate::query::FilterParams,
        ) -> Result<Vec<Value>, RemoteError> {
            Ok(Vec::new())
        }

        async fn post_create(
            &self,
            _resource_type: &str,
            _body: &Value,
            _bearer_token: &str,
        ) -> Result<Value, RemoteError> {
            Ok(Value::Null)
        }
    }

    fn offering_body(id: &str) -> Value {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), Value::String(id.to_string()));
        map.insert("href".to_string(), Value::String(id.to_string()));
        map.insert("@type".to_string(), Value::String("productOffering".to_string()));
        Value::Object(map)
    }

    async fn test_core(body: Value) -> (CacheCore, Arc<StubRemote>) {
        let store = Arc::new(SqliteDiskStore::connect_in_memory().await.unwrap());
        let remote = Arc::new(StubRemote { body, calls: StdMutex::new(0) });
        let config = CacheConfig::default();
        (CacheCore::new(store, remote.clone(), config), remote)
    }

    #[tokio::test]
    async fn cold_fetch_then_fresh_hit() {
        let id = "urn:ngsi-ld:product-offering:abc";
        let (core, remote) = test_core(offering_body(id)).await;

        let first = core
            .retrieve_or_update(id, "productOffering", &OwnerHints::default(), RetrieveMode::LocalOrRemote, 1_000)
            .await
            .unwrap();
        assert!(!first.local);

        let second = core
            .retrieve_or_update(id, "productOffering", &OwnerHints::default(), RetrieveMode::LocalOrRemote, 1_010)
            .await
            .unwrap();
        assert!(second.local);
        assert_eq!(second.object.hash, first.object.hash);
        assert_eq!(*remote.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn local_only_miss_is_not_found() {
        let (core, _remote) = test_core(offering_body("urn:ngsi-ld:product-offering:x")).await;
        let err = core
            .retrieve_or_update(
                "urn:ngsi-ld:product-offering:missing",
                "productOffering",
                &OwnerHints::default(),
                RetrieveMode::LocalOnly,
                0,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
    }

    #[tokio::test]
    async fn stale_entry_triggers_refresh() {
        let id = "urn:ngsi-ld:product-offering:stale";
        let (core, remote) = test_core(offering_body(id)).await;

        core.retrieve_or_update(id, "productOffering", &OwnerHints::default(), RetrieveMode::LocalOrRemote, 0)
            .await
            .unwrap();

        let far_future = core.config.max_freshness_seconds + 10;
        let outcome = core
            .retrieve_or_update(id, "productOffering", &OwnerHints::default(), RetrieveMode::LocalOrRemote, far_future)
            .await
            .unwrap();

        assert!(!outcome.local);
        assert_eq!(*remote.calls.lock().unwrap(), 2);
        assert_eq!(core.refresh_count(), 1);
    }
}
