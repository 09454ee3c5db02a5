//! Custom-object REST backend for [`ObjectStore`].

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use crate::error::ClientError;
use crate::remote::RemoteApi;
use crate::store::{DEFAULT_SEARCH_LIMIT, ObjectStore, SearchPage, SearchRequest, StoredObject};

const API_ROOT: [&str; 3] = ["customobjects", "v1", "collections"];

#[derive(Debug, Deserialize)]
struct ObjectMetadata {
    #[serde(default)]
    collection_name: String,
    #[serde(default)]
    object_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    object_key: String,
}

/// Object store backed by the cloud custom-object collections API.
pub struct HttpObjectStore {
    api: RemoteApi,
    search_limit: usize,
}

impl HttpObjectStore {
    pub fn new(api: RemoteApi) -> Self {
        Self {
            api,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        if limit > 0 {
            self.search_limit = limit;
        }
        self
    }

    fn objects_path<'a>(collection: &'a str, key: Option<&'a str>) -> Vec<&'a str> {
        let mut segments = API_ROOT.to_vec();
        segments.push(collection);
        segments.push("objects");
        if let Some(key) = key {
            segments.push(key);
        }
        segments
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Vec<u8>, ClientError> {
        debug!(collection = %collection, object_key = %key, "fetching");
        let request = self
            .api
            .request(Method::GET, &Self::objects_path(collection, Some(key)))?
            .header("Accept", "application/octet-stream");
        let response = self.api.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<StoredObject, ClientError> {
        let request = self
            .api
            .request(Method::PUT, &Self::objects_path(collection, Some(key)))?
            .header("Content-Type", "application/octet-stream")
            .body(data);
        let envelope = self.api.send_envelope::<ObjectMetadata>(request).await?;
        let stored = envelope
            .resources
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Decode("blank resources returned".to_string()))?;
        Ok(StoredObject {
            collection: stored.collection_name,
            key: stored.object_key,
        })
    }

    async fn list_keys(
        &self,
        collection: &str,
        limit: usize,
        start_key: Option<&str>,
    ) -> Result<Vec<String>, ClientError> {
        let limit = if limit > 0 { limit } else { self.search_limit };
        let mut query = vec![("limit", limit.to_string())];
        if let Some(start) = start_key.filter(|s| !s.is_empty()) {
            query.push(("start", start.to_string()));
        }
        let request = self
            .api
            .request(Method::GET, &Self::objects_path(collection, None))?
            .query(&query);
        let envelope = self.api.send_envelope::<String>(request).await?;
        Ok(envelope.resources)
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, ClientError> {
        let limit = if request.limit > 0 {
            request.limit
        } else {
            self.search_limit
        };
        let mut query = vec![
            ("filter", request.filter.clone()),
            ("limit", limit.to_string()),
            ("offset", request.offset.to_string()),
        ];
        if !request.sort.is_empty() {
            query.push(("sort", request.sort.clone()));
        }

        debug!(collection = %request.collection, filter = %request.filter, "searching objects");
        let builder = self
            .api
            .request(Method::POST, &Self::objects_path(&request.collection, None))?
            .query(&query);
        let envelope = self.api.send_envelope::<SearchHit>(builder).await?;

        let (offset, total) = envelope
            .meta
            .pagination
            .map(|p| (p.offset, p.total))
            .unwrap_or_default();
        Ok(SearchPage {
            keys: envelope.resources.into_iter().map(|h| h.object_key).collect(),
            offset,
            total,
        })
    }
}

#[cfg(test)]
#[path = "http_store_tests.rs"]
mod tests;
