use super::*;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, Utc};
use rtr_jobs_clients::{
    MemoryDeviceService, MemoryObjectStore, MemorySearchService, MemoryWorkflowProvisioner,
    ObjectStore, PollSettings, SavedSearchRunner,
};
use rtr_jobs_core::{FixedClock, generate_job_id};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::settings::ServiceSettings;
use crate::state::Collaborators;

fn now() -> DateTime<Utc> {
    "2024-01-01T00:10:00Z".parse().unwrap()
}

struct TestApp {
    router: Router,
    store: Arc<MemoryObjectStore>,
}

fn create_test_app() -> TestApp {
    let store = Arc::new(MemoryObjectStore::new());
    let poll = PollSettings {
        initial_pause: Duration::ZERO,
        poll_interval: Duration::ZERO,
        ..PollSettings::default()
    };
    let collab = Collaborators {
        store: store.clone(),
        search: Arc::new(SavedSearchRunner::new(
            Arc::new(MemorySearchService::new()),
            poll,
        )),
        devices: Arc::new(MemoryDeviceService::new()),
        workflows: Arc::new(MemoryWorkflowProvisioner::new()),
        clock: Arc::new(FixedClock::new(now())),
    };
    let state = Arc::new(AppState::new(collab, Arc::new(ServiceSettings::default())));
    TestApp {
        router: create_router(state),
        store,
    }
}

async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(v) => Body::from(serde_json::to_vec(&v).unwrap()),
        None => Body::empty(),
    };
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn new_job(name: &str) -> Value {
    json!({
        "name": name,
        "notifications": ["ops@example.com"],
        "target": {"hosts": ["web-1"]},
        "action": {"type": "removeFile", "remove_file_name": "old.exe", "remove_file_path": "C:\\bin"},
        "run_now": true,
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_telemetry_creates_execution() {
    let app = create_test_app();
    let (status, body) = send(&app, "PUT", "/upsert-job", Some(new_job("Patch Sensors"))).await;
    assert_eq!(status, StatusCode::OK);
    let job_id = generate_job_id("Patch Sensors").unwrap();
    assert_eq!(body["resource"], json!(job_id));

    let event = json!({
        "execution_id": "e1",
        "definition_name": "Acme Team - Patch Sensors RunNow",
        "execution_timestamp": "2024-01-01T00:00:00Z",
        "status": "SUCCEEDED",
    });
    let (status, body) = send(&app, "PUT", "/upsert", Some(event)).await;
    assert_eq!(status, StatusCode::OK);
    let exec = &body["resources"][0];
    assert_eq!(exec["execution_id"], "e1");
    assert_eq!(exec["status"], "completed");
    assert_eq!(exec["name"], "Patch Sensors");
    assert_eq!(exec["job_id"], json!(job_id));
    assert_eq!(exec["duration"], "00:10:00");
    assert_eq!(app.store.len("Job_Executions_Scalable_RTR").await, 1);

    let uri = format!("/run-history?filter=job_id:{}", job_id);
    let (status, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources"].as_array().unwrap().len(), 1);
    assert_eq!(body["meta"]["total"], 1);
}

#[tokio::test]
async fn test_telemetry_ignored_and_rejected() {
    let app = create_test_app();
    let queued = json!({
        "execution_id": "e1",
        "definition_name": "Acme Team - Patch Sensors RunNow",
        "execution_timestamp": "2024-01-01T00:00:00Z",
        "status": "queued",
    });
    let (status, body) = send(&app, "PUT", "/upsert", Some(queued)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"resources": [{"name": "", "status": "ok"}]}));

    let (status, body) = send(&app, "PUT", "/upsert", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["code"], 400);

    let unknown = json!({
        "execution_id": "e2",
        "definition_name": "Acme Team - Unknown Job Schedule",
        "execution_timestamp": "2024-01-01T00:00:00Z",
        "status": "completed",
    });
    let (status, body) = send(&app, "PUT", "/upsert", Some(unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errors"][0]["code"], 404);
}

#[tokio::test]
async fn test_job_roundtrip_through_http() {
    let app = create_test_app();
    let (status, _) = send(
        &app,
        "PUT",
        "/upsert-job?draft=true",
        Some(new_job("Patch Sensors")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let id = generate_job_id("Patch Sensors").unwrap();
    let (status, body) = send(&app, "GET", &format!("/job?id={}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resource"]["name"], "Patch Sensors");
    assert_eq!(body["resource"]["draft"], true);
    assert_eq!(body["resource"]["output_format"], json!(["logscale", "csv"]));

    let (status, body) = send(&app, "GET", "/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);
    assert!(body.get("errors").is_none());

    let (status, body) = send(&app, "GET", &format!("/audits?filter=job_id:{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources"][0]["action"], "Created");
}

#[tokio::test]
async fn test_job_errors() {
    let app = create_test_app();

    let (status, body) = send(&app, "GET", "/job", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["message"], "missing id parameter");

    let (status, _) = send(&app, "GET", "/job?id=nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut invalid = new_job("Patch Sensors");
    invalid["notifications"] = json!([]);
    let (status, body) = send(&app, "PUT", "/upsert-job", Some(invalid)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["code"], 1005);

    send(&app, "PUT", "/upsert-job?draft=true", Some(new_job("Patch Sensors"))).await;
    let (status, body) = send(&app, "PUT", "/upsert-job?draft=true", Some(new_job("Patch Sensors"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errors"][0]["code"], 409);
}

#[tokio::test]
async fn test_list_parameter_errors() {
    let app = create_test_app();
    let (status, _) = send(&app, "GET", "/run-history?limit=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/jobs?next=2:1&prev=0:1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/audits?filter=owner:me", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"][0]["message"],
        "filter is incorrect: owner:me. it needs job_id"
    );
}

#[tokio::test]
async fn test_empty_history() {
    let app = create_test_app();
    let (status, body) = send(&app, "GET", "/run-history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources"], json!([]));
    assert_eq!(body["meta"]["count"], 0);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = create_test_app();
    let (status, _) = send(&app, "GET", "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_shared_across_routes() {
    let app = create_test_app();
    app.store
        .put(
            "Jobs_Info_Scalable_RTR",
            "abc",
            serde_json::to_vec(&json!({"name": "Seeded", "id": "abc", "created_at": "2024-01-01T00:00:00Z"})).unwrap(),
        )
        .await
        .unwrap();
    let (status, body) = send(&app, "GET", "/job?id=abc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resource"]["name"], "Seeded");
}
