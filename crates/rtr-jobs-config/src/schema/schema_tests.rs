use super::*;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.cloud.region, "us-1");
    assert_eq!(config.storage.backend, BACKEND_MEMORY);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_collections_default() {
    let collections = CollectionsConfig::default();
    assert_eq!(collections.jobs, "Jobs_Info_Scalable_RTR");
    assert_eq!(collections.executions, "Job_Executions_Scalable_RTR");
    assert_eq!(collections.execution_csv, "Job_Executions_CSV_Scalable_RTR");
    assert_eq!(collections.audit_logs, "Jobs_Audit_Logger_Scalable_RTR");
}

#[test]
fn test_search_defaults_and_budget() {
    let search = SearchConfig::default();
    assert_eq!(search.saved_search, "Query By WorkflowRootExecutionID");
    assert_eq!(search.max_poll_attempts, 10);
    assert_eq!(search.page_limit, 1000);
    assert_eq!(search.poll_budget_ms(), 45_000);
}

#[test]
fn test_workflow_templates_default() {
    let workflows = WorkflowsConfig::default();
    assert_eq!(workflows.notifier_template, "Notify status");
    assert_eq!(workflows.registry_query_template, "Check_If_Registry_key_Value_Exist");
}

#[test]
fn test_region_hosts() {
    let mut cloud = CloudConfig::default();
    assert_eq!(cloud.api_base_url().as_deref(), Some("https://api.crowdstrike.com"));
    assert_eq!(cloud.console_host().as_deref(), Some("falcon.crowdstrike.com"));

    cloud.region = "eu-1".to_string();
    assert_eq!(
        cloud.api_base_url().as_deref(),
        Some("https://api.eu-1.crowdstrike.com")
    );
    assert_eq!(cloud.console_host().as_deref(), Some("falcon.eu-1.crowdstrike.com"));

    cloud.region = "mars-1".to_string();
    assert!(cloud.api_base_url().is_none());
    assert!(cloud.console_host().is_none());

    cloud.api_base_url = Some("http://localhost:9000".to_string());
    cloud.console_host = Some("localhost".to_string());
    assert_eq!(cloud.api_base_url().as_deref(), Some("http://localhost:9000"));
    assert_eq!(cloud.console_host().as_deref(), Some("localhost"));
}

#[test]
fn test_config_serialization() {
    let config = Config::default();
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("127.0.0.1"));
    assert!(json.contains("Job_Executions_Scalable_RTR"));
}
