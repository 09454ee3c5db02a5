//! Collaborator wiring from the `[storage]`, `[search]` and `[workflows]`
//! backend selections.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use rtr_jobs_api::{Collaborators, poll_settings};
use rtr_jobs_clients::{
    DeviceService, FileObjectStore, HttpDeviceService, HttpObjectStore, HttpSearchClient,
    HttpWorkflowProvisioner, MemoryDeviceService, MemoryObjectStore, MemorySearchService,
    MemoryWorkflowProvisioner, ObjectStore, RemoteApi, SavedSearchRunner, SearchService,
    WorkflowProvisioner,
};
use rtr_jobs_config::{BACKEND_FILE, BACKEND_REMOTE, Config};
use rtr_jobs_core::SystemClock;

type BoxError = Box<dyn std::error::Error>;

/// Build the collaborators named by the config.
///
/// Device counts follow the workflows backend: both only exist remotely
/// once jobs are provisioned against a real tenant.
pub(crate) async fn build_collaborators(config: &Config) -> Result<Collaborators, BoxError> {
    let remote = LazyRemote::new(config);

    let store: Arc<dyn ObjectStore> = match config.storage.backend.as_str() {
        BACKEND_REMOTE => Arc::new(HttpObjectStore::new(remote.get()?)),
        BACKEND_FILE => {
            let path = config
                .storage
                .path
                .clone()
                .ok_or("storage.path is required by the file backend")?;
            info!("Using file object store at {}", path.display());
            Arc::new(
                FileObjectStore::new(path)
                    .await?
                    .with_search_limit(config.storage.search_default_limit),
            )
        }
        _ => Arc::new(
            MemoryObjectStore::new().with_search_limit(config.storage.search_default_limit),
        ),
    };

    let search: Arc<dyn SearchService> = match config.search.backend.as_str() {
        BACKEND_REMOTE => Arc::new(HttpSearchClient::new(remote.get()?)),
        _ => Arc::new(MemorySearchService::new()),
    };

    let (devices, workflows): (Arc<dyn DeviceService>, Arc<dyn WorkflowProvisioner>) =
        match config.workflows.backend.as_str() {
            BACKEND_REMOTE => {
                let api = remote.get()?;
                (
                    Arc::new(HttpDeviceService::new(api.clone())),
                    Arc::new(HttpWorkflowProvisioner::new(api)),
                )
            }
            _ => (
                Arc::new(MemoryDeviceService::new()),
                Arc::new(MemoryWorkflowProvisioner::new()),
            ),
        };

    info!(
        storage = %config.storage.backend,
        search = %config.search.backend,
        workflows = %config.workflows.backend,
        "Collaborators wired"
    );

    Ok(Collaborators {
        store,
        search: Arc::new(SavedSearchRunner::new(search, poll_settings(config))),
        devices,
        workflows,
        clock: Arc::new(SystemClock),
    })
}

/// Remote API client, built only when a backend asks for it.
struct LazyRemote<'a> {
    config: &'a Config,
}

impl<'a> LazyRemote<'a> {
    fn new(config: &'a Config) -> Self {
        Self { config }
    }

    fn get(&self) -> Result<RemoteApi, BoxError> {
        let cloud = &self.config.cloud;
        let base_url = cloud
            .api_base_url()
            .ok_or_else(|| format!("no API base URL for region '{}'", cloud.region))?;
        let timeout = Duration::from_secs(self.config.storage.request_timeout_secs);
        Ok(RemoteApi::new(base_url, cloud.token.clone(), timeout)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtr_jobs_config::ConfigLoader;

    #[test]
    fn test_sample_config_is_valid() {
        let config = ConfigLoader::load_str(include_str!("../config/rtr-jobs.toml")).unwrap();
        let result = rtr_jobs_config::ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid(), "{:?}", result.errors);
        assert_eq!(config.storage.backend, BACKEND_FILE);
    }

    #[tokio::test]
    async fn test_default_config_is_all_memory() {
        let config = Config::default();
        let collab = build_collaborators(&config).await.unwrap();
        assert!(collab.store.get("Jobs_Info_Scalable_RTR", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_file_backend_uses_storage_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let toml = format!(
            "[storage]\nbackend = \"file\"\npath = {:?}\n",
            dir.path().display().to_string()
        );
        let config = ConfigLoader::load_str(&toml).unwrap();
        let collab = build_collaborators(&config).await.unwrap();
        collab
            .store
            .put("Jobs_Info_Scalable_RTR", "abc", b"{}".to_vec())
            .await
            .unwrap();
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_some());
    }

    #[tokio::test]
    async fn test_file_backend_without_path_fails() {
        let config = ConfigLoader::load_str("[storage]\nbackend = \"file\"\n").unwrap();
        assert!(build_collaborators(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_remote_backend_builds_client() {
        let config = ConfigLoader::load_str(
            "[cloud]\nregion = \"us-1\"\ntoken = \"t\"\n[search]\nbackend = \"remote\"\n",
        )
        .unwrap();
        assert!(build_collaborators(&config).await.is_ok());
    }
}
