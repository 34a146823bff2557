//! Cloner: top-level orchestration of a full sync.

use std::collections::HashSet;
use std::sync::Arc;

use catalog_core::{CatalogError, CatalogObject, OwnerHints, ResourceType};
use tokio::sync::Mutex;

use crate::query::FilterParams;
use crate::remote::RemoteFetch;

use super::{CacheCore, GraphWalker, OwnerResolver, RetrieveMode};

/// Orchestrates full-graph syncs. A per-cache mutex serializes cloning runs
/// so the connection pool stays usable by foreground reads
/// and the walker's `visited` set stays race-free.
pub struct Cloner {
    core: Arc<CacheCore>,
    remote: Arc<dyn RemoteFetch>,
    resource_types: Vec<ResourceType>,
    run_lock: Mutex<()>,
}

impl Cloner {
    #[must_use]
    pub fn new(core: Arc<CacheCore>, remote: Arc<dyn RemoteFetch>, resource_types: Vec<ResourceType>) -> Self {
        Cloner {
            core,
            remote,
            resource_types,
            run_lock: Mutex::new(()),
        }
    }

    /// `CloneAllResourceTypes`: iterate over the known resource-type
    /// catalog and clone each. A failure cloning one type is logged and
    /// does not stop the run for the others.
    pub async fn clone_all_resource_types(&self, now: i64) -> u64 {
        let _guard = self.run_lock.lock().await;
        let mut total = 0;
        for resource_type in self.resource_types.clone() {
            match self.clone_resource_type_locked(&resource_type, now).await {
                Ok(count) => {
                    total += count;
                    tracing::info!(resource_type = %resource_type, count, "cloned resource type");
                }
                Err(err) => {
                    tracing::warn!(resource_type = %resource_type, error = %err, "resource type clone failed");
                }
            }
        }
        total
    }

    /// `CloneResourceType`: pages through a resource type's listing with
    /// `limit=100`, increasing `offset`, until a short or empty page. Errors
    /// on a page terminate the loop for this type only.
    pub async fn clone_resource_type(&self, resource_type: &ResourceType, now: i64) -> Result<u64, CatalogError> {
        let _guard = self.run_lock.lock().await;
        self.clone_resource_type_locked(resource_type, now).await
    }

    async fn clone_resource_type_locked(&self, resource_type: &ResourceType, now: i64) -> Result<u64, CatalogError> {
        let limit = self.core.config().clone_page_size;
        let mut offset: u32 = 0;
        let mut count: u64 = 0;
        let empty_query = FilterParams::new();

        loop {
            let page = match self.fetch_page(resource_type, limit, offset, &empty_query).await {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(resource_type = %resource_type, offset, error = %err, "clone page failed, stopping this type");
                    break;
                }
            };

            if page.is_empty() {
                break;
            }

            for item in &page {
                match self.upsert_cloned_object(resource_type, item.clone(), now).await {
                    Ok(()) => {
                        count += 1;
                        metrics::counter!("catalog_cloner_objects_total", "resourceType" => resource_type.as_str().to_string()).increment(1);
                    }
                    Err(err) => {
                        tracing::warn!(resource_type = %resource_type, error = %err, "failed to cache cloned object");
                    }
                }
            }

            if (page.len() as u32) < limit {
                break;
            }
            offset += limit;
        }

        Ok(count)
    }

    async fn fetch_page(
        &self,
        resource_type: &ResourceType,
        limit: u32,
        offset: u32,
        query: &FilterParams,
    ) -> Result<Vec<catalog_core::Value>, CatalogError> {
        self.remote
            .fetch_list_page(resource_type.as_str(), limit, offset, query)
            .await
            .map_err(CatalogError::from)
    }

    async fn upsert_cloned_object(
        &self,
        resource_type: &ResourceType,
        body: catalog_core::Value,
        now: i64,
    ) -> Result<(), CatalogError> {
        let mut object = CatalogObject::from_upstream(
            body,
            Some(resource_type),
            &self.core.config().kebab_types,
            now,
        )?;

        let resolver = OwnerResolver::new(&self.core);
        resolver.process_related_parties(&mut object, now).await?;
        if *resource_type == ResourceType::ProductOffering {
            resolver.resolve_product_offering_seller(&mut object, now).await?;
        }

        self.core
            .store()
            .upsert(&object, self.core.config().max_freshness_seconds, now)
            .await
            .map_err(CatalogError::from)?;
        Ok(())
    }

    /// `CloneOneObject`: `RetrieveOrUpdate`, run type-specific resolver
    /// fixes, then walk its content to pull sub-references transitively.
    pub async fn clone_one_object(&self, id: &str, resource_type: &ResourceType, now: i64) -> Result<(), CatalogError> {
        let _guard = self.run_lock.lock().await;

        let outcome = self
            .core
            .retrieve_or_update(id, resource_type.as_str(), &OwnerHints::default(), RetrieveMode::LocalOrRemote, now)
            .await?;
        let mut object = outcome.object;

        let resolver = OwnerResolver::new(&self.core);
        resolver.process_related_parties(&mut object, now).await?;
        if *resource_type == ResourceType::ProductOffering {
            resolver.resolve_product_offering_seller(&mut object, now).await?;
        }
        self.core
            .store()
            .upsert(&object, self.core.config().max_freshness_seconds, now)
            .await
            .map_err(CatalogError::from)?;

        let walker = GraphWalker::new(&self.core);
        let mut visited: HashSet<String> = HashSet::from([object.id.clone()]);
        walker
            .walk(&object.content_map, &OwnerHints::default(), &mut visited, now)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;
    use crate::storedb::sqlite::SqliteDiskStore;
    use async_trait::async_trait;
    use catalog_core::CacheConfig;
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;

    struct PagedRemote {
        pages: StdMutex<Vec<Vec<catalog_core::Value>>>,
    }

    #[async_trait]
    impl RemoteFetch for PagedRemote {
        async fn fetch_one(&self, _id: &str, _resource_type: &str) -> Result<catalog_core::Value, RemoteError> {
            Ok(catalog_core::Value::Null)
        }

        async fn fetch_list_page(
            &self,
            _resource_type: &str,
            _limit: u32,
            _offset: u32,
            _query: &FilterParams,
        ) -> Result<Vec<catalog_core::Value>, RemoteError> {
            let mut pages = self.pages.lock().unwrap();
            Ok(if pages.is_empty() { Vec::new() } else { pages.remove(0) })
        }

        async fn post_create(
            &self,
            _resource_type: &str,
            _body: &catalog_core::Value,
            _bearer_token: &str,
        ) -> Result<catalog_core::Value, RemoteError> {
            Ok(catalog_core::Value::Null)
        }
    }

    fn offering(id: &str) -> catalog_core::Value {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), catalog_core::Value::String(id.to_string()));
        map.insert("href".to_string(), catalog_core::Value::String(id.to_string()));
        map.insert(
            "@type".to_string(),
            catalog_core::Value::String("productOffering".to_string()),
        );
        catalog_core::Value::Object(map)
    }

    #[tokio::test]
    async fn clone_resource_type_stops_on_short_page() {
        let store = Arc::new(SqliteDiskStore::connect_in_memory().await.unwrap());
        let page = vec![offering("urn:ngsi-ld:product-offering:1"), offering("urn:ngsi-ld:product-offering:2")];
        let remote = Arc::new(PagedRemote {
            pages: StdMutex::new(vec![page]),
        });
        let core = Arc::new(CacheCore::new(store, remote.clone(), CacheConfig::default()));
        let cloner = Cloner::new(core, remote, vec![ResourceType::ProductOffering]);

        let count = cloner
            .clone_resource_type(&ResourceType::ProductOffering, 0)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn clone_all_resource_types_tolerates_per_type_errors() {
        let store = Arc::new(SqliteDiskStore::connect_in_memory().await.unwrap());
        let remote = Arc::new(PagedRemote { pages: StdMutex::new(Vec::new()) });
        let core = Arc::new(CacheCore::new(store, remote.clone(), CacheConfig::default()));
        let cloner = Cloner::new(
            core,
            remote,
            vec![ResourceType::ProductOffering, ResourceType::Catalog],
        );

        let total = cloner.clone_all_resource_types(0).await;
        assert_eq!(total, 0);
    }
}
