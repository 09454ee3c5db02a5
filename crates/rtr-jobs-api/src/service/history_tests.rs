use super::*;
use chrono::{DateTime, Utc};
use rtr_jobs_clients::MemoryObjectStore;
use rtr_jobs_core::{FixedClock, RunStatus};
use serde_json::json;

fn now() -> DateTime<Utc> {
    "2024-03-10T12:00:00Z".parse().unwrap()
}

async fn seed(store: &MemoryObjectStore, key: &str, doc: serde_json::Value) {
    store
        .put(
            "Job_Executions_Scalable_RTR",
            key,
            serde_json::to_vec(&doc).unwrap(),
        )
        .await
        .unwrap();
}

async fn service_with<K: AsRef<str>>(docs: Vec<(K, serde_json::Value)>) -> HistoryService {
    let store = MemoryObjectStore::new();
    for (key, doc) in docs {
        seed(&store, key.as_ref(), doc).await;
    }
    HistoryService::new(
        Arc::new(store),
        Arc::new(FixedClock::new(now())),
        Arc::new(ServiceSettings::default()),
    )
}

fn execution(exec_id: &str, job_id: &str, name: &str, run_date: &str, status: &str) -> serde_json::Value {
    json!({
        "execution_id": exec_id,
        "id": job_id,
        "name": name,
        "run_date": run_date,
        "status": status,
        "targeted_hosts": [{"device_id": "", "host_name": "h1", "status": "completed"}]
    })
}

#[test]
fn test_filter_parse() {
    let filter = ExecutionFilter::parse("job_id:abc&job_name: Patch ");
    assert_eq!(filter.job_id.as_deref(), Some("abc"));
    assert_eq!(filter.job_name.as_deref(), Some("Patch"));
}

#[test]
fn test_filter_parse_skips_malformed_tokens() {
    let filter = ExecutionFilter::parse(":abc&job_id:&owner:me&job_name");
    assert_eq!(filter, ExecutionFilter::default());
    assert_eq!(ExecutionFilter::parse(""), ExecutionFilter::default());
}

#[tokio::test]
async fn test_list_newest_first_within_window() {
    let service = service_with(vec![
        ("1_a", execution("a", "j1", "Patch", "2024-03-09T10:00:00Z", "completed")),
        ("2_b", execution("b", "j1", "Patch", "2024-03-10T09:00:00Z", "failed")),
        ("3_c", execution("c", "j2", "Audit", "2024-02-01T00:00:00Z", "completed")),
    ])
    .await;

    let page = service.list(&ListQuery::default()).await.unwrap();
    let ids: Vec<&str> = page.resources.iter().map(|e| e.execution_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(page.meta.total, 2);
    assert_eq!(page.meta.count, 2);
    assert_eq!(page.meta.limit, 10);
    assert_eq!(page.meta.next, "");
    assert_eq!(page.meta.prev, "");
    // Normalised for listing.
    assert_eq!(page.resources[0].job_id, "j1");
    assert_eq!(page.resources[0].hosts, vec!["h1"]);
}

#[tokio::test]
async fn test_list_filters_by_job() {
    let service = service_with(vec![
        ("1_a", execution("a", "j1", "Patch Sensors", "2024-03-09T10:00:00Z", "completed")),
        ("2_b", execution("b", "j2", "Audit Hosts", "2024-03-09T11:00:00Z", "completed")),
    ])
    .await;

    let by_id = ListQuery {
        filter: Some("job_id:j2".to_string()),
        ..ListQuery::default()
    };
    let page = service.list(&by_id).await.unwrap();
    assert_eq!(page.resources.len(), 1);
    assert_eq!(page.resources[0].execution_id, "b");

    let by_name = ListQuery {
        filter: Some("job_name:sensors".to_string()),
        ..ListQuery::default()
    };
    let page = service.list(&by_name).await.unwrap();
    assert_eq!(page.resources.len(), 1);
    assert_eq!(page.resources[0].execution_id, "a");
}

#[tokio::test]
async fn test_list_backfills_in_progress_duration() {
    let service = service_with(vec![
        ("1_a", execution("a", "j1", "Patch", "2024-03-10T11:30:00Z", "in-progress")),
        ("2_b", json!({
            "execution_id": "b", "id": "j1", "name": "Patch",
            "run_date": "2024-03-10T10:00:00Z", "endDate": "2024-03-10T10:05:00Z",
            "status": "completed", "duration": "00:05:00"
        })),
    ])
    .await;

    let page = service.list(&ListQuery::default()).await.unwrap();
    let live = page.resources.iter().find(|e| e.execution_id == "a").unwrap();
    assert_eq!(live.status, Some(RunStatus::InProgress));
    assert_eq!(live.duration, "00:30:00");
    let done = page.resources.iter().find(|e| e.execution_id == "b").unwrap();
    assert_eq!(done.duration, "00:05:00");
}

#[tokio::test]
async fn test_list_skips_unparseable_duration() {
    let service = service_with(vec![(
        "1_a",
        json!({
            "execution_id": "a", "id": "j1", "name": "Patch",
            "run_date": "2024-03-10T11:00:00Z", "endDate": "soon",
            "status": "in-progress"
        }),
    )])
    .await;

    let page = service.list(&ListQuery::default()).await.unwrap();
    assert_eq!(page.resources.len(), 1);
    assert_eq!(page.resources[0].duration, "");
}

#[tokio::test]
async fn test_list_pages_with_markers() {
    let docs: Vec<(String, serde_json::Value)> = (0..5)
        .map(|i| {
            let key = format!("{}_e{}", i, i);
            let run_date = format!("2024-03-10T0{}:00:00Z", i);
            (key, execution(&format!("e{}", i), "j1", "Patch", &run_date, "completed"))
        })
        .collect();
    let service = service_with(docs).await;

    let first = service
        .list(&ListQuery {
            limit: Some("2".to_string()),
            ..ListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(first.resources.len(), 2);
    assert_eq!(first.resources[0].execution_id, "e4");
    assert_eq!(first.meta.next, "2:1");
    assert_eq!(first.meta.prev, "");

    let second = service
        .list(&ListQuery {
            limit: Some("2".to_string()),
            next: Some(first.meta.next.clone()),
            ..ListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(second.resources[0].execution_id, "e2");
    assert_eq!(second.meta.next, "4:2");
    assert_eq!(second.meta.prev, "0:1");

    let last = service
        .list(&ListQuery {
            limit: Some("2".to_string()),
            next: Some(second.meta.next.clone()),
            ..ListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(last.resources.len(), 1);
    assert_eq!(last.meta.next, "");
    assert_eq!(last.meta.prev, "2:2");
}

#[tokio::test]
async fn test_list_empty_collection() {
    let service = service_with(Vec::<(&str, serde_json::Value)>::new()).await;
    let page = service.list(&ListQuery::default()).await.unwrap();
    assert!(page.resources.is_empty());
    assert_eq!(page.meta.total, 0);
    assert_eq!(page.meta.count, 0);
}

#[tokio::test]
async fn test_list_rejects_bad_arguments() {
    let service = service_with(Vec::<(&str, serde_json::Value)>::new()).await;

    let err = service
        .list(&ListQuery {
            limit: Some("ten".to_string()),
            ..ListQuery::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
    assert!(err.to_string().starts_with("bad arguments in param.query"));

    let err = service
        .list(&ListQuery {
            next: Some("2:1".to_string()),
            prev: Some("0:1".to_string()),
            ..ListQuery::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}
