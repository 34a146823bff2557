//! Graph Walker: recursively visits an object's map/array
//! structure, follows embedded `href` references, avoids cycles, and
//! invokes the Cache Core per visited node.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use catalog_core::{CatalogError, OwnerHints, Value};

use super::{CacheCore, RetrieveMode};

/// Walks a `contentMap` tree, following `href`-bearing nested objects as
/// references to other cached objects. Single-threaded per cloning run —
/// the caller (the [`super::Cloner`]) is responsible for serializing runs
/// with its mutex so `visited` stays race-free.
pub struct GraphWalker<'a> {
    core: &'a CacheCore,
}

impl<'a> GraphWalker<'a> {
    #[must_use]
    pub fn new(core: &'a CacheCore) -> Self {
        GraphWalker { core }
    }

    /// Walks `root`, marking every visited URN in `visited`. Cycle-safe:
    /// marking-before-recurse on the href suffices because every reference
    /// is a URN resolvable to exactly one object.
    pub async fn walk(
        &self,
        root: &Value,
        hints: &OwnerHints,
        visited: &mut HashSet<String>,
        now: i64,
    ) -> Result<(), CatalogError> {
        self.walk_node(root, hints, visited, now).await
    }

    fn walk_node<'b>(
        &'b self,
        node: &'b Value,
        hints: &'b OwnerHints,
        visited: &'b mut HashSet<String>,
        now: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), CatalogError>> + 'b>> {
        Box::pin(async move {
            match node {
                Value::Object(map) => {
                    if let Some(Value::String(href)) = map.get("href") {
                        if !visited.contains(href.as_str()) {
                            visited.insert(href.clone());
                            let resource_type = referred_type(map).unwrap_or_default();
                            match self
                                .core
                                .retrieve_or_update(href, &resource_type, hints, RetrieveMode::LocalOrRemote, now)
                                .await
                            {
                                Ok(outcome) => {
                                    self.walk_node(&outcome.object.content_map.clone(), hints, visited, now)
                                        .await?;
                                }
                                Err(err) => {
                                    tracing::warn!(href = %href, error = %err, "graph walker: failed to resolve reference");
                                }
                            }
                        }
                    }
                    for value in map.values() {
                        self.walk_node(value, hints, visited, now).await?;
                    }
                    Ok(())
                }
                Value::Array(items) => {
                    for item in items {
                        self.walk_node(item, hints, visited, now).await?;
                    }
                    Ok(())
                }
                _ => Ok(()),
            }
        })
    }
}

fn referred_type(map: &std::collections::BTreeMap<String, Value>) -> Option<String> {
    map.get("@referredType")
        .or_else(|| map.get("@type"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;
    use crate::storedb::sqlite::SqliteDiskStore;
    use async_trait::async_trait;
    use catalog_core::CacheConfig;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct LoopRemote;

    #[async_trait]
    impl crate::remote::RemoteFetch for LoopRemote {
        async fn fetch_one(&self, id: &str, _resource_type: &str) -> Result<Value, RemoteError> {
            let (this, other) = if id.ends_with('a') {
                ("a", "b")
            } else {
                ("b", "a")
            };
            let mut other_ref = BTreeMap::new();
            other_ref.insert(
                "href".to_string(),
                Value::String(format!("urn:ngsi-ld:catalog:{other}")),
            );
            other_ref.insert("@referredType".to_string(), Value::String("catalog".to_string()));

            let mut body = BTreeMap::new();
            body.insert("id".to_string(), Value::String(format!("urn:ngsi-ld:catalog:{this}")));
            body.insert("href".to_string(), Value::String(format!("urn:ngsi-ld:catalog:{this}")));
            body.insert("@type".to_string(), Value::String("catalog".to_string()));
            body.insert("ref".to_string(), Value::Object(other_ref));
            Ok(Value::Object(body))
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

    #[tokio::test]
    async fn cycle_visits_each_urn_once() {
        let store = Arc::new(SqliteDiskStore::connect_in_memory().await.unwrap());
        let remote = Arc::new(LoopRemote);
        let core = CacheCore::new(store, remote, CacheConfig::default());

        let mut body = BTreeMap::new();
        body.insert(
            "href".to_string(),
            Value::String("urn:ngsi-ld:catalog:a".to_string()),
        );
        body.insert("@referredType".to_string(), Value::String("catalog".to_string()));
        let root = Value::Object(body);

        let walker = GraphWalker::new(&core);
        let mut visited = std::collections::HashSet::new();
        walker.walk(&root, &OwnerHints::default(), &mut visited, 0).await.unwrap();

        assert_eq!(visited.len(), 2);
        assert!(visited.contains("urn:ngsi-ld:catalog:a"));
        assert!(visited.contains("urn:ngsi-ld:catalog:b"));
    }

    #[tokio::test]
    async fn scalar_fields_are_not_followed() {
        let store = Arc::new(SqliteDiskStore::connect_in_memory().await.unwrap());
        let remote = Arc::new(LoopRemote);
        let core = CacheCore::new(store, remote, CacheConfig::default());

        let mut body = BTreeMap::new();
        body.insert("href".to_string(), Value::String("not-followed-because-not-object".to_string()));
        let root = Value::Array(vec![Value::String("href".to_string()), Value::Object(BTreeMap::new())]);
        let _ = body;

        let walker = GraphWalker::new(&core);
        let mut visited = std::collections::HashSet::new();
        walker.walk(&root, &OwnerHints::default(), &mut visited, 0).await.unwrap();
        assert!(visited.is_empty());
    }
}
