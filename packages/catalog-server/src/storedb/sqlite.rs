//! SQLite-backed implementation of [`super::DiskStore`], the one store
//! backend this crate ships today. A Postgres or in-memory backend would
//! plug in behind the same trait, via `sqlx`'s `sqlite` feature rather
//! than `postgres`.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use catalog_core::{CatalogObject, ResourceType, Value};

use crate::error::StoreError;
use crate::query::{BoundQuery, SqlParam};

use super::{DiskStore, ExistsResult, UpsertOutcome};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS tmfobject (
    id TEXT NOT NULL,
    href TEXT NOT NULL,
    resourceType TEXT NOT NULL,
    version TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    lifecycleStatus TEXT NOT NULL DEFAULT '',
    lastUpdate TEXT NOT NULL DEFAULT '',
    seller TEXT NOT NULL DEFAULT '',
    buyer TEXT NOT NULL DEFAULT '',
    sellerOperator TEXT NOT NULL DEFAULT '',
    buyerOperator TEXT NOT NULL DEFAULT '',
    organization TEXT NOT NULL DEFAULT '',
    organizationIdentifier TEXT NOT NULL DEFAULT '',
    content BLOB NOT NULL,
    hash BLOB NOT NULL,
    created INTEGER NOT NULL,
    updated INTEGER NOT NULL,
    PRIMARY KEY (id, resourceType, version)
);
CREATE INDEX IF NOT EXISTS idx_tmfobject_hash ON tmfobject(hash);
";

/// A bounded `sqlx::SqlitePool`-backed Disk Store, running in WAL mode
/// (: "fixed-size connection pool (e.g. 10)").
pub struct SqliteDiskStore {
    pool: SqlitePool,
}

impl SqliteDiskStore {
    /// Opens (creating if missing) the database file at `path`, applies the
    /// schema, and returns a store backed by a pool of 10 connections.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(StoreError::Sqlite)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StoreError::Sqlite)?;

        sqlx::query(SCHEMA).execute(&pool).await.map_err(StoreError::Sqlite)?;

        Ok(SqliteDiskStore { pool })
    }

    /// An in-memory store, one connection, for tests.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::Sqlite)?;
        sqlx::query(SCHEMA).execute(&pool).await.map_err(StoreError::Sqlite)?;
        Ok(SqliteDiskStore { pool })
    }

    fn row_to_object(row: &sqlx::sqlite::SqliteRow) -> Result<CatalogObject, StoreError> {
        let content_bytes: Vec<u8> = row.try_get("content")?;
        let hash_bytes: Vec<u8> = row.try_get("hash")?;
        let content_map: Value = serde_json::from_slice::<serde_json::Value>(&content_bytes)?.into();
        let mut hash = [0u8; 32];
        let len = hash_bytes.len().min(32);
        hash[..len].copy_from_slice(&hash_bytes[..len]);

        Ok(CatalogObject {
            id: row.try_get("id")?,
            href: row.try_get("href")?,
            resource_type: ResourceType::from_camel_case(row.try_get::<String, _>("resourceType")?.as_str()),
            version: row.try_get("version")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            lifecycle_status: row.try_get("lifecycleStatus")?,
            last_update: row.try_get("lastUpdate")?,
            seller: row.try_get("seller")?,
            buyer: row.try_get("buyer")?,
            seller_operator: row.try_get("sellerOperator")?,
            buyer_operator: row.try_get("buyerOperator")?,
            organization: row.try_get("organization")?,
            organization_identifier: row.try_get("organizationIdentifier")?,
            content_map,
            content_bytes,
            hash,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }
}

#[async_trait]
impl DiskStore for SqliteDiskStore {
    async fn exists(
        &self,
        id: &str,
        resource_type: &str,
        version: &str,
        now: i64,
    ) -> Result<ExistsResult, StoreError> {
        let row = sqlx::query("SELECT hash, updated FROM tmfobject WHERE id = ? AND resourceType = ? AND version = ?")
            .bind(id)
            .bind(resource_type)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Ok(ExistsResult::absent()),
            Some(row) => {
                let hash_bytes: Vec<u8> = row.try_get("hash")?;
                let updated: i64 = row.try_get("updated")?;
                let mut hash = [0u8; 32];
                let len = hash_bytes.len().min(32);
                hash[..len].copy_from_slice(&hash_bytes[..len]);
                Ok(ExistsResult {
                    exists: true,
                    hash: Some(hash),
                    freshness_seconds: Some(now - updated),
                })
            }
        }
    }

    async fn retrieve(
        &self,
        id: &str,
        resource_type: &str,
        version: Option<&str>,
    ) -> Result<CatalogObject, StoreError> {
        let row = match version {
            Some(v) => {
                sqlx::query("SELECT * FROM tmfobject WHERE id = ? AND resourceType = ? AND version = ?")
                    .bind(id)
                    .bind(resource_type)
                    .bind(v)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM tmfobject WHERE id = ? AND resourceType = ? \
                     ORDER BY version DESC LIMIT 1",
                )
                .bind(id)
                .bind(resource_type)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        let row = row.ok_or_else(|| StoreError::RowNotFound {
            id: id.to_string(),
            resource_type: resource_type.to_string(),
            version: version.unwrap_or("*").to_string(),
        })?;
        Self::row_to_object(&row)
    }

    async fn insert(&self, object: &CatalogObject) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO tmfobject (id, href, resourceType, version, name, description, \
             lifecycleStatus, lastUpdate, seller, buyer, sellerOperator, buyerOperator, \
             organization, organizationIdentifier, content, hash, created, updated) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&object.id)
        .bind(&object.href)
        .bind(object.resource_type.as_str())
        .bind(&object.version)
        .bind(&object.name)
        .bind(&object.description)
        .bind(&object.lifecycle_status)
        .bind(&object.last_update)
        .bind(&object.seller)
        .bind(&object.buyer)
        .bind(&object.seller_operator)
        .bind(&object.buyer_operator)
        .bind(&object.organization)
        .bind(&object.organization_identifier)
        .bind(&object.content_bytes)
        .bind(object.hash.as_slice())
        .bind(object.created)
        .bind(object.updated)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::PrimaryKeyConflict {
                    id: object.id.clone(),
                    resource_type: object.resource_type.as_str().to_string(),
                    version: object.version.clone(),
                })
            }
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    async fn update(&self, object: &CatalogObject, now: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE tmfobject SET href = ?, name = ?, description = ?, lifecycleStatus = ?, \
             lastUpdate = ?, seller = ?, buyer = ?, sellerOperator = ?, buyerOperator = ?, \
             organization = ?, organizationIdentifier = ?, content = ?, hash = ?, updated = ? \
             WHERE id = ? AND resourceType = ? AND version = ?",
        )
        .bind(&object.href)
        .bind(&object.name)
        .bind(&object.description)
        .bind(&object.lifecycle_status)
        .bind(&object.last_update)
        .bind(&object.seller)
        .bind(&object.buyer)
        .bind(&object.seller_operator)
        .bind(&object.buyer_operator)
        .bind(&object.organization)
        .bind(&object.organization_identifier)
        .bind(&object.content_bytes)
        .bind(object.hash.as_slice())
        .bind(now)
        .bind(&object.id)
        .bind(object.resource_type.as_str())
        .bind(&object.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound {
                id: object.id.clone(),
                resource_type: object.resource_type.as_str().to_string(),
                version: object.version.clone(),
            });
        }
        Ok(())
    }

    async fn upsert(
        &self,
        object: &CatalogObject,
        max_freshness_seconds: i64,
        now: i64,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT hash, updated FROM tmfobject WHERE id = ? AND resourceType = ? AND version = ?")
            .bind(&object.id)
            .bind(object.resource_type.as_str())
            .bind(&object.version)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match existing {
            None => {
                sqlx::query(
                    "INSERT INTO tmfobject (id, href, resourceType, version, name, description, \
                     lifecycleStatus, lastUpdate, seller, buyer, sellerOperator, buyerOperator, \
                     organization, organizationIdentifier, content, hash, created, updated) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&object.id)
                .bind(&object.href)
                .bind(object.resource_type.as_str())
                .bind(&object.version)
                .bind(&object.name)
                .bind(&object.description)
                .bind(&object.lifecycle_status)
                .bind(&object.last_update)
                .bind(&object.seller)
                .bind(&object.buyer)
                .bind(&object.seller_operator)
                .bind(&object.buyer_operator)
                .bind(&object.organization)
                .bind(&object.organization_identifier)
                .bind(&object.content_bytes)
                .bind(object.hash.as_slice())
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Inserted
            }
            Some(row) => {
                let stored_hash: Vec<u8> = row.try_get("hash")?;
                let updated: i64 = row.try_get("updated")?;
                let fresh = now - updated < max_freshness_seconds;

                if fresh && stored_hash == object.hash.as_slice() {
                    UpsertOutcome::Unchanged
                } else {
                    sqlx::query(
                        "UPDATE tmfobject SET href = ?, name = ?, description = ?, \
                         lifecycleStatus = ?, lastUpdate = ?, seller = ?, buyer = ?, \
                         sellerOperator = ?, buyerOperator = ?, organization = ?, \
                         organizationIdentifier = ?, content = ?, hash = ?, updated = ? \
                         WHERE id = ? AND resourceType = ? AND version = ?",
                    )
                    .bind(&object.href)
                    .bind(&object.name)
                    .bind(&object.description)
                    .bind(&object.lifecycle_status)
                    .bind(&object.last_update)
                    .bind(&object.seller)
                    .bind(&object.buyer)
                    .bind(&object.seller_operator)
                    .bind(&object.buyer_operator)
                    .bind(&object.organization)
                    .bind(&object.organization_identifier)
                    .bind(&object.content_bytes)
                    .bind(object.hash.as_slice())
                    .bind(now)
                    .bind(&object.id)
                    .bind(object.resource_type.as_str())
                    .bind(&object.version)
                    .execute(&mut *tx)
                    .await?;
                    UpsertOutcome::Updated
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn query_list(&self, query: &BoundQuery) -> Result<Vec<CatalogObject>, StoreError> {
        let mut q = sqlx::query(&query.sql);
        for param in &query.params {
            q = match param {
                SqlParam::Text(text) => q.bind(text),
                SqlParam::Int(n) => q.bind(n),
            };
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_object).collect()
    }

    async fn drop_all(&self) -> Result<(), StoreError> {
        sqlx::query("DROP TABLE IF EXISTS tmfobject").execute(&self.pool).await?;
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::KebabTypeTable;
    use std::collections::BTreeMap;

    fn sample_object(id: &str, now: i64) -> CatalogObject {
        let table = KebabTypeTable::default_table();
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), Value::String(id.to_string()));
        map.insert("href".to_string(), Value::String(id.to_string()));
        map.insert("@type".to_string(), Value::String("productOffering".to_string()));
        CatalogObject::from_upstream(Value::Object(map), None, &table, now).unwrap()
    }

    #[tokio::test]
    async fn insert_then_retrieve_round_trips() {
        let store = SqliteDiskStore::connect_in_memory().await.unwrap();
        let object = sample_object("urn:ngsi-ld:product-offering:a", 1_000);
        store.insert(&object).await.unwrap();

        let fetched = store
            .retrieve(&object.id, object.resource_type.as_str(), None)
            .await
            .unwrap();
        assert_eq!(fetched.id, object.id);
        assert_eq!(fetched.hash, object.hash);
        assert_eq!(fetched.created, 1_000);
    }

    #[tokio::test]
    async fn insert_conflict_on_duplicate_primary_key() {
        let store = SqliteDiskStore::connect_in_memory().await.unwrap();
        let object = sample_object("urn:ngsi-ld:product-offering:b", 1_000);
        store.insert(&object).await.unwrap();

        let err = store.insert(&object).await.unwrap_err();
        assert!(matches!(err, StoreError::PrimaryKeyConflict { .. }));
    }

    #[tokio::test]
    async fn upsert_is_idempotent_within_freshness_window() {
        let store = SqliteDiskStore::connect_in_memory().await.unwrap();
        let object = sample_object("urn:ngsi-ld:product-offering:c", 1_000);

        let first = store.upsert(&object, 3600, 1_000).await.unwrap();
        assert_eq!(first, UpsertOutcome::Inserted);

        let second = store.upsert(&object, 3600, 1_050).await.unwrap();
        assert_eq!(second, UpsertOutcome::Unchanged);

        let fetched = store
            .retrieve(&object.id, object.resource_type.as_str(), None)
            .await
            .unwrap();
        assert_eq!(fetched.updated, 1_000, "unchanged upsert must not bump updated");
    }

    #[tokio::test]
    async fn upsert_updates_when_stale() {
        let store = SqliteDiskStore::connect_in_memory().await.unwrap();
        let object = sample_object("urn:ngsi-ld:product-offering:d", 1_000);
        store.upsert(&object, 3600, 1_000).await.unwrap();

        let outcome = store.upsert(&object, 10, 2_000).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        let fetched = store
            .retrieve(&object.id, object.resource_type.as_str(), None)
            .await
            .unwrap();
        assert_eq!(fetched.updated, 2_000);
    }

    #[tokio::test]
    async fn exists_reports_freshness_seconds() {
        let store = SqliteDiskStore::connect_in_memory().await.unwrap();
        let object = sample_object("urn:ngsi-ld:product-offering:e", 1_000);
        store.insert(&object).await.unwrap();

        let result = store
            .exists(&object.id, object.resource_type.as_str(), &object.version, 1_100)
            .await
            .unwrap();
        assert!(result.exists);
        assert_eq!(result.freshness_seconds, Some(100));
    }

    #[tokio::test]
    async fn drop_all_empties_the_table() {
        let store = SqliteDiskStore::connect_in_memory().await.unwrap();
        let object = sample_object("urn:ngsi-ld:product-offering:f", 1_000);
        store.insert(&object).await.unwrap();
        store.drop_all().await.unwrap();

        let err = store
            .retrieve(&object.id, object.resource_type.as_str(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound { .. }));
    }
}
