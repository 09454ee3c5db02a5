//! Request-scoped services.
//!
//! Each service holds only `Arc` handles to its collaborators and the shared
//! [`ServiceSettings`](crate::settings::ServiceSettings); no state survives a
//! request.

pub mod audit;
pub mod history;
pub mod jobs;
pub mod provision;
pub mod reconcile;

pub use audit::AuditService;
pub use history::{ExecutionFilter, HistoryService};
pub use jobs::JobService;
pub use reconcile::{ReconcileService, Reconciliation};

use rtr_jobs_clients::{ObjectStore, SearchRequest, bulk_fetch};
use rtr_jobs_core::decode::decode_object;
use rtr_jobs_core::{PageRequest, Paging};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ApiError, ErrorDetail, is_not_found};

/// Query parameters shared by the list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
}

impl ListQuery {
    pub fn page_request(&self) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::from_query(
            self.limit.as_deref(),
            self.next.as_deref(),
            self.prev.as_deref(),
        )?)
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ListPage<T> {
    pub meta: Paging,
    pub resources: Vec<T>,
    /// Per-item fetch failures; the rest of the page is still served.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetail>,
}

/// Search a collection, then fetch and decode every hit concurrently.
///
/// Items that fail to fetch or decode are reported in `errors` and left out
/// of `resources`; the order of the search is kept.
pub(crate) async fn fetch_listing<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    request: &SearchRequest,
    concurrency: usize,
    page: &PageRequest,
) -> Result<ListPage<T>, ApiError> {
    let found = match store.search(request).await {
        Ok(found) => found,
        Err(e) if is_not_found(&e) => Default::default(),
        Err(e) => return Err(ApiError::internal("error returned from search operation", e)),
    };

    let mut fetched = bulk_fetch(store, &request.collection, &found.keys, concurrency).await;
    let mut resources = Vec::with_capacity(found.keys.len());
    let mut errors = Vec::new();
    for key in &found.keys {
        let failure = if let Some(err) = fetched.errors.remove(key) {
            err.to_string()
        } else if let Some(data) = fetched.objects.remove(key) {
            match decode_object::<T>(&data) {
                Ok(item) => {
                    resources.push(item);
                    continue;
                }
                Err(e) => e.to_string(),
            }
        } else {
            "key returned from search but not from bulk fetch".to_string()
        };
        warn!(collection = %request.collection, object_key = %key, "failed to fetch object: {}", failure);
        errors.push(ErrorDetail::new(
            500,
            format!("failed to get object: {} err: {}", key, failure),
        ));
    }

    Ok(ListPage {
        meta: page.paging(found.keys.len(), found.offset, found.total),
        resources,
        errors,
    })
}

/// Serialize a record and store it under `key`.
pub(crate) async fn put_json<T: Serialize>(
    store: &dyn ObjectStore,
    collection: &str,
    key: &str,
    value: &T,
) -> Result<(), ApiError> {
    let data = serde_json::to_vec(value)?;
    store.put(collection, key, data).await?;
    Ok(())
}
