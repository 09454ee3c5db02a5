//! Audit log listing.

use std::sync::Arc;

use rtr_jobs_clients::{ObjectStore, SearchRequest};
use rtr_jobs_core::fql::{build_query, build_sort};
use rtr_jobs_core::{Audit, Filter, FqlOp, SortDirection};

use super::{ListPage, ListQuery, fetch_listing};
use crate::error::ApiError;
use crate::settings::ServiceSettings;

/// Parse `job_id:<id>`; any other key is rejected.
pub fn parse_audit_filter(raw: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.split_once(':') {
        Some(("job_id", id)) if !id.trim().is_empty() => Ok(Some(id.trim().to_string())),
        _ => Err(ApiError::BadRequest(format!(
            "filter is incorrect: {}. it needs job_id",
            raw
        ))),
    }
}

pub struct AuditService {
    store: Arc<dyn ObjectStore>,
    settings: Arc<ServiceSettings>,
}

impl AuditService {
    pub fn new(store: Arc<dyn ObjectStore>, settings: Arc<ServiceSettings>) -> Self {
        Self { store, settings }
    }

    /// Audit entries, newest first, optionally for one job.
    pub async fn list(&self, query: &ListQuery) -> Result<ListPage<Audit>, ApiError> {
        let job_id = parse_audit_filter(query.filter.as_deref())?;
        let page = query.page_request()?;

        let mut filters = Vec::with_capacity(2);
        if let Some(job_id) = job_id {
            filters.push(Filter::new("job_id", FqlOp::Eq, job_id));
        }
        filters.push(Filter::new("modified_at", FqlOp::Gte, "0"));

        let request = SearchRequest::new(
            self.settings.collections.audit_logs.as_str(),
            build_query(&filters)?,
        )
        .sort(build_sort("modified_at", SortDirection::Desc)?)
        .limit(page.limit)
        .offset(page.cursor.offset);

        fetch_listing(
            self.store.as_ref(),
            &request,
            self.settings.bulk_fetch_concurrency,
            &page,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use rtr_jobs_clients::MemoryObjectStore;
    use rtr_jobs_core::Job;

    fn at(minutes: i64) -> DateTime<Utc> {
        "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap() + Duration::minutes(minutes)
    }

    async fn service_with(entries: &[(&str, i64, i64)]) -> AuditService {
        let store = MemoryObjectStore::new();
        for (name, version, minute) in entries {
            let job = Job {
                id: format!("id-{}", name),
                name: name.to_string(),
                version: *version,
                updated_at: Some(at(*minute)),
                ..Job::default()
            };
            let audit = Audit::for_job(&job, at(*minute));
            store
                .put(
                    "Jobs_Audit_Logger_Scalable_RTR",
                    &audit.id,
                    serde_json::to_vec(&audit).unwrap(),
                )
                .await
                .unwrap();
        }
        AuditService::new(Arc::new(store), Arc::new(ServiceSettings::default()))
    }

    #[test]
    fn test_parse_audit_filter() {
        assert_eq!(parse_audit_filter(None).unwrap(), None);
        assert_eq!(parse_audit_filter(Some("")).unwrap(), None);
        assert_eq!(
            parse_audit_filter(Some("job_id:abc")).unwrap(),
            Some("abc".to_string())
        );
        let err = parse_audit_filter(Some("name:abc")).unwrap_err();
        assert_eq!(err.to_string(), "filter is incorrect: name:abc. it needs job_id");
        assert!(parse_audit_filter(Some("job_id:")).is_err());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let service = service_with(&[("alpha", 1, 0), ("alpha", 2, 5), ("bravo", 1, 3)]).await;
        let page = service.list(&ListQuery::default()).await.unwrap();
        let seen: Vec<(&str, i64)> = page
            .resources
            .iter()
            .map(|a| (a.job_name.as_str(), a.version))
            .collect();
        assert_eq!(seen, vec![("alpha", 2), ("bravo", 1), ("alpha", 1)]);
        assert_eq!(page.resources[0].action, "Updated");
        assert_eq!(page.meta.total, 3);
    }

    #[tokio::test]
    async fn test_list_for_one_job() {
        let service = service_with(&[("alpha", 1, 0), ("alpha", 2, 5), ("bravo", 1, 3)]).await;
        let page = service
            .list(&ListQuery {
                filter: Some("job_id:id-bravo".to_string()),
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.resources.len(), 1);
        assert_eq!(page.resources[0].job_name, "bravo");

        let err = service
            .list(&ListQuery {
                filter: Some("owner:me".to_string()),
                ..ListQuery::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_list_empty() {
        let service = service_with(&[]).await;
        let page = service.list(&ListQuery::default()).await.unwrap();
        assert!(page.resources.is_empty());
        assert_eq!(page.meta.total, 0);
    }
}
