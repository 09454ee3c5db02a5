    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

    fn event(id: &str, host: &str) -> LogEvent {
        let value = json!({"@id": id, "Device.GetDetails.Hostname": host});
        value.as_object().unwrap().clone()
    }

    fn quick_settings() -> PollSettings {
        PollSettings {
            initial_pause: Duration::ZERO,
            poll_interval: Duration::from_millis(10),
            max_poll_attempts: 3,
            page_limit: 2,
            console_host: "falcon.eu-1.crowdstrike.com".to_string(),
            ..PollSettings::default()
        }
    }

    #[tokio::test]
    async fn test_memory_search_collects_all_pages() {
        let service = Arc::new(MemorySearchService::new());
        service
            .record("e1", vec![event("1", "a"), event("2", "b"), event("3", "c")])
            .await;
        service.record("other", vec![event("9", "z")]).await;

        let runner = SavedSearchRunner::new(service, quick_settings());
        let outcome = runner.events_for_execution("e1").await.unwrap();
        assert_eq!(outcome.events.len(), 3);
        assert_eq!(outcome.job_status, STATUS_COMPLETE);
        assert!(!outcome.job_id.is_empty());
    }

    #[tokio::test]
    async fn test_memory_search_unknown_execution_is_empty() {
        let runner = SavedSearchRunner::new(Arc::new(MemorySearchService::new()), quick_settings());
        let outcome = runner.events_for_execution("missing").await.unwrap();
        assert!(outcome.events.is_empty());
    }

    #[tokio::test]
    async fn test_memory_search_keeps_no_per_search_state() {
        let service = Arc::new(MemorySearchService::new());
        service.record("e1", vec![event("1", "a")]).await;
        let runner = SavedSearchRunner::new(service.clone(), quick_settings());

        for exec in ["e1", "e2", "e3", "e1"] {
            runner.events_for_execution(exec).await.unwrap();
        }
        let again = runner.events_for_execution("e1").await.unwrap();
        assert_eq!(again.events.len(), 1);
        assert_eq!(service.by_execution.read().await.len(), 1);

        let err = service.fetch_results("unknown-job", 0, 10).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound));
    }

    /// Service that ignores `limit` past the end and is slow to complete.
    struct QuirkyService {
        events: Vec<LogEvent>,
        pending_polls: AtomicUsize,
        fetches: AtomicUsize,
        job_id: String,
    }

    #[async_trait]
    impl SearchService for QuirkyService {
        async fn execute(
            &self,
            search_name: &str,
            params: &BTreeMap<String, String>,
        ) -> Result<String, ClientError> {
            assert_eq!(search_name, DEFAULT_SAVED_SEARCH);
            assert_eq!(params["execution_id"], "e1");
            Ok(self.job_id.clone())
        }

        async fn fetch_results(
            &self,
            job_id: &str,
            offset: usize,
            limit: usize,
        ) -> Result<ResultPage, ClientError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.pending_polls.load(Ordering::SeqCst) > 0 {
                self.pending_polls.fetch_sub(1, Ordering::SeqCst);
                return Err(ClientError::SearchIncomplete {
                    job_id: job_id.to_string(),
                    status: "running".to_string(),
                });
            }
            let events = if offset >= self.events.len() {
                self.events.clone()
            } else {
                self.events.iter().skip(offset).take(limit).cloned().collect()
            };
            Ok(ResultPage {
                events,
                status: STATUS_COMPLETE.to_string(),
                url: "https://api.eu-1.crowdstrike.com/loggingapi/search/1".to_string(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_retries_and_dedupes() {
        let service = Arc::new(QuirkyService {
            events: vec![event("1", "a"), event("2", "b"), event("3", "c")],
            pending_polls: AtomicUsize::new(2),
            fetches: AtomicUsize::new(0),
            job_id: "job-1".to_string(),
        });
        let runner = SavedSearchRunner::new(service.clone(), quick_settings());
        let outcome = runner.events_for_execution("e1").await.unwrap();

        assert_eq!(outcome.events.len(), 3);
        assert_eq!(outcome.job_id, "job-1");
        assert_eq!(
            outcome.job_url,
            "https://falcon.eu-1.crowdstrike.com/api2/loggingapi/search/1"
        );
        // 2 incomplete polls, then pages at offsets 0, 2 and 3.
        assert_eq!(service.fetches.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_gives_up_after_max_attempts() {
        let service = Arc::new(QuirkyService {
            events: vec![],
            pending_polls: AtomicUsize::new(100),
            fetches: AtomicUsize::new(0),
            job_id: "job-2".to_string(),
        });
        let runner = SavedSearchRunner::new(service.clone(), quick_settings());
        let err = runner.events_for_execution("e1").await.unwrap_err();
        assert!(matches!(err, ClientError::SearchIncomplete { .. }));
        assert_eq!(service.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_empty_job_id_short_circuits() {
        let service = Arc::new(QuirkyService {
            events: vec![],
            pending_polls: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            job_id: String::new(),
        });
        let runner = SavedSearchRunner::new(service.clone(), PollSettings::default());
        let outcome = runner.events_for_execution("e1").await.unwrap();
        assert_eq!(outcome, SearchOutcome::default());
        assert_eq!(service.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_console_url() {
        assert_eq!(
            console_url("https://api.crowdstrike.com/a/b?x=1", "falcon.crowdstrike.com").unwrap(),
            "https://falcon.crowdstrike.com/api2/a/b?x=1"
        );
        assert_eq!(
            console_url("https://other.example.com/a", "falcon.crowdstrike.com").unwrap(),
            "https://other.example.com/a"
        );
        assert_eq!(console_url("", "falcon.crowdstrike.com").unwrap(), "");
    }

    #[tokio::test]
    async fn test_http_execute_and_fetch() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/loggingapi/entities/saved-searches/execute/v1"))
            .and(matchers::query_param("mode", "async_offload"))
            .and(matchers::body_json(json!({
                "name": DEFAULT_SAVED_SEARCH,
                "parameters": {"execution_id": "e1"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": [{"job_status": {"job_id": "job-9"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/loggingapi/entities/saved-searches/execute/v1"))
            .and(matchers::query_param("job_id", "job-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": [{
                    "job_status": {"job_id": "job-9", "status": "complete", "job_url": ""},
                    "events": [{"@id": "1"}]
                }]
            })))
            .mount(&server)
            .await;

        let client = HttpSearchClient::new(RemoteApi::with_client(
            server.uri(),
            None,
            reqwest::Client::new(),
        ));
        let params = BTreeMap::from([("execution_id".to_string(), "e1".to_string())]);
        let job_id = client.execute(DEFAULT_SAVED_SEARCH, &params).await.unwrap();
        assert_eq!(job_id, "job-9");

        let page = client.fetch_results("job-9", 0, 1000).await.unwrap();
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.status, STATUS_COMPLETE);
    }

    #[tokio::test]
    async fn test_http_fetch_incomplete() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": [{"job_status": {"job_id": "j", "status": "running"}}]
            })))
            .mount(&server)
            .await;

        let client = HttpSearchClient::new(RemoteApi::with_client(
            server.uri(),
            None,
            reqwest::Client::new(),
        ));
        let err = client.fetch_results("j", 0, 10).await.unwrap_err();
        assert_eq!(err.to_string(), "job j not complete: running");
    }

    #[tokio::test]
    async fn test_http_execute_without_resources() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resources": []})))
            .mount(&server)
            .await;

        let client = HttpSearchClient::new(RemoteApi::with_client(
            server.uri(),
            None,
            reqwest::Client::new(),
        ));
        let job_id = client.execute("s", &BTreeMap::new()).await.unwrap();
        assert!(job_id.is_empty());
    }
