//! Crate-wide error taxonomy.
//!
//! Each recognizable failure mode is its own `thiserror` variant rather
//! than a separate type per kind — terse messages carrying just enough
//! structured context (URL, resource, id) to log and to match on in tests.

use thiserror::Error;

/// Errors surfaced by the catalog cache and its collaborators.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No row for the requested key in the cache. Cache Core may promote
    /// this to a remote fetch (`LocalOrRemote`) or surface it (`LocalOnly`).
    #[error("not found: {resource_type} {id}")]
    NotFound { resource_type: String, id: String },

    /// Network error reaching upstream. Recovered by returning partial
    /// results where the loop structure allows (list fetch), surfaced
    /// otherwise.
    #[error("transport failure calling {url}: {source}")]
    TransportFailure {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// Upstream responded with a status > 299. Always surfaced with status
    /// and a body snippet; never retried automatically.
    #[error("upstream rejected {url} with status {status}: {body_snippet}")]
    UpstreamRejection {
        url: String,
        status: u16,
        body_snippet: String,
    },

    /// Missing `id`/`href`, prefix mismatch, or `@type`/path disagreement.
    /// Surfaced at construction time; no partial object is ever cached.
    #[error("schema violation for {id}: {reason}")]
    SchemaViolation { id: String, reason: String },

    /// Primary-key violation on insert; indicates a concurrent insert race.
    /// Callers may retry via upsert semantics.
    #[error("integrity conflict on ({id}, {resource_type}, {version})")]
    IntegrityConflict {
        id: String,
        resource_type: String,
        version: String,
    },

    /// Denied by the policy hook. Surfaced as an HTTP 401/403 at the PDP
    /// layer; never alters cache state.
    #[error("authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    /// A store-level error that does not fit the taxonomy above (pool
    /// exhaustion, migration failure, I/O on the database file).
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl CatalogError {
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        CatalogError::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn schema_violation(id: impl Into<String>, reason: impl Into<String>) -> Self {
        CatalogError::SchemaViolation {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// `true` for errors a caller may reasonably retry (vs. ones that are
    /// definitive, like `SchemaViolation` or `UpstreamRejection`).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::TransportFailure { .. } | CatalogError::IntegrityConflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_with_context() {
        let err = CatalogError::not_found("productOffering", "urn:ngsi-ld:product-offering:abc");
        assert_eq!(
            err.to_string(),
            "not found: productOffering urn:ngsi-ld:product-offering:abc"
        );
    }

    #[test]
    fn retryable_classification() {
        assert!(CatalogError::IntegrityConflict {
            id: "x".into(),
            resource_type: "y".into(),
            version: "0.1".into(),
        }
        .is_retryable());
        assert!(!CatalogError::SchemaViolation {
            id: "x".into(),
            reason: "missing id".into(),
        }
        .is_retryable());
    }
}
