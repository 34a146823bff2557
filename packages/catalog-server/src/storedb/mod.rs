//! Disk Store: a single-table embedded relational store holding
//! every cached object keyed by (`id`, `resourceType`, `version`).

pub mod sqlite;

use async_trait::async_trait;

use catalog_core::CatalogObject;

use crate::error::StoreError;
use crate::query::BoundQuery;

pub use sqlite::SqliteDiskStore;

/// Result of a point lookup used before insert/update (`Exists`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsResult {
    pub exists: bool,
    pub hash: Option<[u8; 32]>,
    pub freshness_seconds: Option<i64>,
}

impl ExistsResult {
    #[must_use]
    pub fn absent() -> Self {
        ExistsResult {
            exists: false,
            hash: None,
            freshness_seconds: None,
        }
    }
}

/// What `Upsert` actually did, so the Cache Core can decide whether to bump
/// its refresh counter or short-circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Row existed, was fresh, and the new content hashed the same —
    /// no write occurred.
    Unchanged,
}

/// The Disk Store contract. Every mutating operation composes under a
/// save-point (nested transaction) so the Cache Core can chain multiple
/// mutations atomically ("transactional composition").
#[async_trait]
pub trait DiskStore: Send + Sync {
    async fn exists(
        &self,
        id: &str,
        resource_type: &str,
        version: &str,
        now: i64,
    ) -> Result<ExistsResult, StoreError>;

    /// Retrieves the row for `(id, resourceType, version)`. If `version` is
    /// `None`, returns the row with the lexicographically largest version
    /// for that `(id, resourceType)`.
    async fn retrieve(
        &self,
        id: &str,
        resource_type: &str,
        version: Option<&str>,
    ) -> Result<CatalogObject, StoreError>;

    /// Populates all columns, sets `created = updated = now`. Fails on
    /// primary-key conflict.
    async fn insert(&self, object: &CatalogObject) -> Result<(), StoreError>;

    /// Updates all non-key columns and bumps `updated = now`. Fails if the
    /// row does not exist.
    async fn update(&self, object: &CatalogObject, now: i64) -> Result<(), StoreError>;

    /// Atomic insert-or-update with hash-and-freshness-aware
    /// short-circuiting.
    async fn upsert(
        &self,
        object: &CatalogObject,
        max_freshness_seconds: i64,
        now: i64,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Runs a translated, bound `SELECT` and returns every matching row.
    async fn query_list(&self, query: &BoundQuery) -> Result<Vec<CatalogObject>, StoreError>;

    /// Drops and recreates the table, reclaiming its space.
    async fn drop_all(&self) -> Result<(), StoreError>;
}
