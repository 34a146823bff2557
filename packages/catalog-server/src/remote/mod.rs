//! Remote Client: fetches objects from the upstream TMForum
//! catalog API over HTTP.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use catalog_core::Value;

use crate::error::RemoteError;
use crate::query::FilterParams;

/// Where a resource type lives upstream: `<host><path_prefix>/<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub host: String,
    pub path_prefix: String,
}

/// The static resource-type -> (host, path prefix) table.
#[derive(Debug, Clone, Default)]
pub struct RemotePathTable {
    entries: HashMap<String, PathEntry>,
}

impl RemotePathTable {
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (String, PathEntry)>) -> Self {
        RemotePathTable {
            entries: entries.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn resolve(&self, resource_type: &str) -> Option<&PathEntry> {
        self.entries.get(resource_type)
    }

    pub fn insert(&mut self, resource_type: impl Into<String>, entry: PathEntry) {
        self.entries.insert(resource_type.into(), entry);
    }

    /// All resource types with a registered path, for `CloneAllResourceTypes`.
    #[must_use]
    pub fn resource_types(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

/// The Remote Client's contract, as a trait so the Cache Core and Cloner can
/// be tested against an in-memory double instead of a real HTTP server.
#[async_trait]
pub trait RemoteFetch: Send + Sync {
    async fn fetch_one(&self, id: &str, resource_type: &str) -> Result<Value, RemoteError>;

    /// Fetches one page of a resource-type listing. Returns however many
    /// objects the upstream returned for this page (possibly fewer than
    /// `limit`, which the caller reads as "last page").
    async fn fetch_list_page(
        &self,
        resource_type: &str,
        limit: u32,
        offset: u32,
        query: &FilterParams,
    ) -> Result<Vec<Value>, RemoteError>;

    async fn post_create(
        &self,
        resource_type: &str,
        body: &Value,
        bearer_token: &str,
    ) -> Result<Value, RemoteError>;
}

/// A `reqwest`-backed [`RemoteFetch`]. Single shared client, 10-second
/// timeout, redirects disabled ("a redirect is a hard error
/// distinguishable from transport failure").
pub struct RemoteClient {
    client: reqwest::Client,
    paths: RemotePathTable,
}

impl RemoteClient {
    pub fn new(paths: RemotePathTable) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|source| RemoteError::Transport {
                url: String::new(),
                source,
            })?;
        Ok(RemoteClient { client, paths })
    }

    fn object_url(&self, resource_type: &str, id: &str) -> Result<String, RemoteError> {
        let entry = self.resolve(resource_type)?;
        Ok(format!("{}{}/{}", entry.host, entry.path_prefix, id))
    }

    fn list_url(&self, resource_type: &str) -> Result<String, RemoteError> {
        let entry = self.resolve(resource_type)?;
        Ok(format!("{}{}", entry.host, entry.path_prefix))
    }

    fn resolve(&self, resource_type: &str) -> Result<&PathEntry, RemoteError> {
        self.paths.resolve(resource_type).ok_or_else(|| RemoteError::MalformedBody {
            url: resource_type.to_string(),
            reason: "no path table entry for resource type".to_string(),
        })
    }

    fn validate_body_shape(url: &str, body: &str) -> Result<(), RemoteError> {
        match body.trim_start().chars().next() {
            Some('{') | Some('[') => Ok(()),
            _ => Err(RemoteError::MalformedBody {
                url: url.to_string(),
                reason: "body does not begin with '{' or '['".to_string(),
            }),
        }
    }
}

#[async_trait]
impl RemoteFetch for RemoteClient {
    async fn fetch_one(&self, id: &str, resource_type: &str) -> Result<Value, RemoteError> {
        let url = self.object_url(resource_type, id)?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| RemoteError::Transport { url: url.clone(), source })?;

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            return Err(RemoteError::Redirected { url, location });
        }
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| RemoteError::Transport { url: url.clone(), source })?;

        if status.as_u16() > 299 {
            return Err(RemoteError::Rejected {
                url,
                status: status.as_u16(),
                body_snippet: body.chars().take(200).collect(),
            });
        }
        Self::validate_body_shape(&url, &body)?;

        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| RemoteError::MalformedBody {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        Ok(parsed.into())
    }

    async fn fetch_list_page(
        &self,
        resource_type: &str,
        limit: u32,
        offset: u32,
        query: &FilterParams,
    ) -> Result<Vec<Value>, RemoteError> {
        let url = self.list_url(resource_type)?;
        let mut request = self
            .client
            .get(&url)
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())]);
        for (key, values) in query {
            for value in values {
                request = request.query(&[(key.as_str(), value.as_str())]);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|source| RemoteError::Transport { url: url.clone(), source })?;

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            return Err(RemoteError::Redirected { url, location });
        }
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| RemoteError::Transport { url: url.clone(), source })?;

        if status.as_u16() > 299 {
            return Err(RemoteError::Rejected {
                url,
                status: status.as_u16(),
                body_snippet: body.chars().take(200).collect(),
            });
        }
        Self::validate_body_shape(&url, &body)?;

        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| RemoteError::MalformedBody {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let items = parsed.as_array().cloned().ok_or_else(|| RemoteError::MalformedBody {
            url: url.clone(),
            reason: "expected a JSON array".to_string(),
        })?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    async fn post_create(
        &self,
        resource_type: &str,
        body: &Value,
        bearer_token: &str,
    ) -> Result<Value, RemoteError> {
        let url = self.list_url(resource_type)?;
        let json_body: serde_json::Value = body.clone().into();
        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer_token)
            .json(&json_body)
            .send()
            .await
            .map_err(|source| RemoteError::Transport { url: url.clone(), source })?;

        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if status.as_u16() > 299 {
            let text = response.text().await.unwrap_or_default();
            return Err(RemoteError::Rejected {
                url,
                status: status.as_u16(),
                body_snippet: text.chars().take(200).collect(),
            });
        }
        if status.as_u16() != 201 || location.is_none() {
            tracing::warn!(url = %url, status = %status, "PostCreate: expected 201 with a Location header");
        }

        let text = response
            .text()
            .await
            .map_err(|source| RemoteError::Transport { url: url.clone(), source })?;
        Self::validate_body_shape(&url, &text)?;
        let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| RemoteError::MalformedBody {
            url,
            reason: e.to_string(),
        })?;
        Ok(parsed.into())
    }
}
