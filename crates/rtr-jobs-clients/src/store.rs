//! Object store contract, fan-out helpers and local backends.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rtr_jobs_core::decode::decode_base64_json;
use rtr_jobs_core::{FqlQuery, FqlSort};
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::ClientError;

/// Page size used when a search request does not name one.
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

/// Fan-out used by [`bulk_fetch`] when the caller passes 0.
pub const DEFAULT_BULK_CONCURRENCY: usize = 20;

/// A filtered, sorted key search against one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    pub collection: String,
    pub filter: String,
    /// Empty means store order.
    pub sort: String,
    /// 0 means the store default.
    pub limit: usize,
    pub offset: usize,
}

impl SearchRequest {
    pub fn new(collection: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: filter.into(),
            ..Self::default()
        }
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn effective_limit(&self, default: usize) -> usize {
        if self.limit > 0 { self.limit } else { default }
    }
}

/// Keys matching a search plus the paging state reported by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub keys: Vec<String>,
    /// Offset of the next page, or 0 when there is none.
    pub offset: usize,
    pub total: usize,
}

/// Identifies a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub collection: String,
    pub key: String,
}

/// Remote key/value object storage with FQL search.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object. Missing objects yield [`ClientError::NotFound`].
    async fn get(&self, collection: &str, key: &str) -> Result<Vec<u8>, ClientError>;

    /// Create or replace an object.
    async fn put(
        &self,
        collection: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<StoredObject, ClientError>;

    /// Page through keys in key order, starting after `start_key`.
    async fn list_keys(
        &self,
        collection: &str,
        limit: usize,
        start_key: Option<&str>,
    ) -> Result<Vec<String>, ClientError>;

    /// Search a collection by filter and sort.
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, ClientError>;
}

/// Outcome of a [`bulk_fetch`]: successes and failures keyed by object key.
#[derive(Debug, Default)]
pub struct BulkFetch {
    pub objects: HashMap<String, Vec<u8>>,
    pub errors: BTreeMap<String, ClientError>,
}

impl BulkFetch {
    /// Failures as `(key, message)` pairs in key order.
    pub fn error_messages(&self) -> Vec<(String, String)> {
        self.errors
            .iter()
            .map(|(k, e)| (k.clone(), e.to_string()))
            .collect()
    }
}

/// Fetch many objects concurrently. A failing key never cancels the others.
pub async fn bulk_fetch(
    store: &dyn ObjectStore,
    collection: &str,
    keys: &[String],
    concurrency: usize,
) -> BulkFetch {
    let concurrency = if concurrency > 0 {
        concurrency
    } else {
        DEFAULT_BULK_CONCURRENCY
    };

    let results: Vec<(String, Result<Vec<u8>, ClientError>)> = stream::iter(keys.iter().cloned())
        .map(|key| async move {
            debug!(collection = %collection, object_key = %key, "fetching");
            let result = store.get(collection, &key).await;
            (key, result)
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut out = BulkFetch::default();
    for (key, result) in results {
        match result {
            Ok(data) => {
                out.objects.insert(key, data);
            }
            Err(e) => {
                out.errors.insert(key, e);
            }
        }
    }
    out
}

/// One fetched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub data: Vec<u8>,
}

/// Objects fetched through [`search_and_fetch`], in search order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    pub records: Vec<Record>,
    pub offset: usize,
    pub total: usize,
}

/// Search, then fetch every matching object. Any failed or missing key fails
/// the whole call.
pub async fn search_and_fetch(
    store: &dyn ObjectStore,
    request: &SearchRequest,
    concurrency: usize,
) -> Result<FetchedPage, ClientError> {
    let page = store
        .search(request)
        .await
        .map_err(|e| ClientError::Search(Box::new(e)))?;
    if page.keys.is_empty() {
        return Ok(FetchedPage::default());
    }

    let mut fetched = bulk_fetch(store, &request.collection, &page.keys, concurrency).await;
    if !fetched.errors.is_empty() {
        return Err(ClientError::BulkFetch {
            errors: fetched.error_messages(),
        });
    }

    let mut records = Vec::with_capacity(page.keys.len());
    let mut missing = Vec::new();
    for key in page.keys {
        match fetched.objects.remove(&key) {
            Some(data) => records.push(Record { key, data }),
            None => missing.push(key),
        }
    }
    if !missing.is_empty() {
        return Err(ClientError::MissingKeys(missing));
    }

    Ok(FetchedPage {
        records,
        offset: page.offset,
        total: page.total,
    })
}

/// Evaluate a search over locally held objects.
///
/// Objects that are not JSON (CSV artifacts, for instance) never match.
fn search_local<'a>(
    objects: impl Iterator<Item = (&'a String, &'a Vec<u8>)>,
    request: &SearchRequest,
    default_limit: usize,
) -> Result<SearchPage, ClientError> {
    let query = FqlQuery::parse(&request.filter)?;
    let sort = if request.sort.trim().is_empty() {
        None
    } else {
        Some(FqlSort::parse(&request.sort)?)
    };

    let mut matched: Vec<(&String, Value)> = objects
        .filter_map(|(key, data)| {
            let json = decode_base64_json(data).ok()?;
            let doc: Value = serde_json::from_slice(&json).ok()?;
            query.matches(&doc).then_some((key, doc))
        })
        .collect();

    if let Some(sort) = &sort {
        matched.sort_by(|a, b| sort.compare(&a.1, &b.1).then_with(|| a.0.cmp(b.0)));
    }

    let total = matched.len();
    let limit = request.effective_limit(default_limit);
    let keys: Vec<String> = matched
        .into_iter()
        .skip(request.offset)
        .take(limit)
        .map(|(k, _)| k.clone())
        .collect();

    let end = request.offset + keys.len();
    let offset = if end < total { end } else { 0 };
    Ok(SearchPage {
        keys,
        offset,
        total,
    })
}

fn list_local<'a>(
    keys: impl Iterator<Item = &'a String>,
    limit: usize,
    start_key: Option<&str>,
) -> Vec<String> {
    let limit = if limit > 0 { limit } else { DEFAULT_SEARCH_LIMIT };
    keys.filter(|k| start_key.is_none_or(|start| k.as_str() > start))
        .take(limit)
        .cloned()
        .collect()
}

/// In-memory object store for tests and single-process deployments.
pub struct MemoryObjectStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    search_limit: usize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Override the page size used when a search names none.
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        if limit > 0 {
            self.search_limit = limit;
        }
        self
    }

    /// Number of objects in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, BTreeMap::len)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Vec<u8>, ClientError> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned()
            .ok_or(ClientError::NotFound)
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<StoredObject, ClientError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), data);
        Ok(StoredObject {
            collection: collection.to_string(),
            key: key.to_string(),
        })
    }

    async fn list_keys(
        &self,
        collection: &str,
        limit: usize,
        start_key: Option<&str>,
    ) -> Result<Vec<String>, ClientError> {
        let collections = self.collections.read().await;
        let Some(objects) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(list_local(objects.keys(), limit, start_key))
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, ClientError> {
        let collections = self.collections.read().await;
        let Some(objects) = collections.get(&request.collection) else {
            return Ok(SearchPage::default());
        };
        search_local(objects.iter(), request, self.search_limit)
    }
}

/// File system object store: one file per object under `<root>/<collection>/`.
pub struct FileObjectStore {
    root: PathBuf,
    search_limit: usize,
}

impl FileObjectStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            ClientError::Io(format!("Failed to create storage directory: {}", e))
        })?;

        debug!("FileObjectStore initialized at {:?}", root);

        Ok(Self {
            root,
            search_limit: DEFAULT_SEARCH_LIMIT,
        })
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        if limit > 0 {
            self.search_limit = limit;
        }
        self
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(encode_name(collection))
    }

    fn object_path(&self, collection: &str, key: &str) -> PathBuf {
        self.collection_dir(collection).join(encode_name(key))
    }

    /// Read every object of a collection, keyed by original key.
    async fn load_collection(&self, dir: &Path) -> Result<BTreeMap<String, Vec<u8>>, ClientError> {
        let mut objects = BTreeMap::new();
        if !dir.exists() {
            return Ok(objects);
        }

        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| ClientError::Io(format!("Failed to read collection directory: {}", e)))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            ClientError::Io(format!("Failed to read directory entry: {}", e))
        })? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(key) = decode_name(name) else {
                warn!("Skipping unrecognised file {:?}", path);
                continue;
            };
            match fs::read(&path).await {
                Ok(data) => {
                    objects.insert(key, data);
                }
                Err(e) => warn!("Failed to read object file {:?}: {}", path, e),
            }
        }
        Ok(objects)
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Vec<u8>, ClientError> {
        let path = self.object_path(collection, key);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ClientError::NotFound),
            Err(e) => Err(ClientError::Io(format!("Failed to read object file: {}", e))),
        }
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<StoredObject, ClientError> {
        let dir = self.collection_dir(collection);
        fs::create_dir_all(&dir).await.map_err(|e| {
            ClientError::Io(format!("Failed to create collection directory: {}", e))
        })?;

        let path = self.object_path(collection, key);
        fs::write(&path, data)
            .await
            .map_err(|e| ClientError::Io(format!("Failed to write object file: {}", e)))?;

        debug!(collection = %collection, object_key = %key, "stored object at {:?}", path);
        Ok(StoredObject {
            collection: collection.to_string(),
            key: key.to_string(),
        })
    }

    async fn list_keys(
        &self,
        collection: &str,
        limit: usize,
        start_key: Option<&str>,
    ) -> Result<Vec<String>, ClientError> {
        let objects = self.load_collection(&self.collection_dir(collection)).await?;
        Ok(list_local(objects.keys(), limit, start_key))
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, ClientError> {
        let objects = self
            .load_collection(&self.collection_dir(&request.collection))
            .await?;
        search_local(objects.iter(), request, self.search_limit)
    }
}

/// Map a key to a file name. Characters outside `[A-Za-z0-9_-]` become `%XX`
/// per UTF-8 byte, so the mapping is reversible.
fn encode_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn decode_name(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
