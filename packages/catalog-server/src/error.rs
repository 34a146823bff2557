//! Module-local error types that convert into [`catalog_core::CatalogError`]
//! at the boundary where a caller needs the crate-wide taxonomy, staying
//! module-local until something downstream needs to classify them.

use catalog_core::CatalogError;
use thiserror::Error;

/// Errors from the Disk Store (`storedb`).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found for ({id}, {resource_type}, {version})")]
    RowNotFound {
        id: String,
        resource_type: String,
        version: String,
    },
    #[error("primary key conflict on ({id}, {resource_type}, {version})")]
    PrimaryKeyConflict {
        id: String,
        resource_type: String,
        version: String,
    },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("content decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<StoreError> for CatalogError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::RowNotFound {
                id, resource_type, ..
            } => CatalogError::not_found(resource_type, id),
            StoreError::PrimaryKeyConflict {
                id,
                resource_type,
                version,
            } => CatalogError::IntegrityConflict {
                id,
                resource_type,
                version,
            },
            other => CatalogError::Store(anyhow::Error::new(other)),
        }
    }
}

/// Errors from the Remote Client.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport failure calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("upstream rejected {url} with status {status}: {body_snippet}")]
    Rejected {
        url: String,
        status: u16,
        body_snippet: String,
    },
    #[error("upstream redirected {url} to {location}")]
    Redirected { url: String, location: String },
    #[error("malformed body from {url}: {reason}")]
    MalformedBody { url: String, reason: String },
}

impl From<RemoteError> for CatalogError {
    fn from(value: RemoteError) -> Self {
        match value {
            RemoteError::Transport { url, source } => CatalogError::TransportFailure {
                url,
                source: anyhow::Error::new(source),
            },
            RemoteError::Rejected {
                url,
                status,
                body_snippet,
            } => CatalogError::UpstreamRejection {
                url,
                status,
                body_snippet,
            },
            RemoteError::Redirected { url, location } => CatalogError::UpstreamRejection {
                url,
                status: 0,
                body_snippet: format!("redirected to {location}"),
            },
            RemoteError::MalformedBody { url, reason } => {
                CatalogError::schema_violation(url, reason)
            }
        }
    }
}
