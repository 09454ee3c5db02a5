//! Host-group membership collaborator.

use async_trait::async_trait;
use reqwest::Method;
use rtr_jobs_core::FqlQuery;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ClientError;
use crate::remote::RemoteApi;

/// Counts devices matching a device filter such as `groups:'g1',groups:'g2'`.
#[async_trait]
pub trait DeviceService: Send + Sync {
    async fn count_devices(&self, filter: &str) -> Result<u64, ClientError>;
}

/// In-memory device inventory evaluated with the local FQL matcher.
pub struct MemoryDeviceService {
    devices: RwLock<Vec<Value>>,
}

impl MemoryDeviceService {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(Vec::new()),
        }
    }

    /// Register a device document, e.g. `{"hostname": "h1", "groups": ["g1"]}`.
    pub async fn add_device(&self, device: Value) {
        self.devices.write().await.push(device);
    }
}

impl Default for MemoryDeviceService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceService for MemoryDeviceService {
    async fn count_devices(&self, filter: &str) -> Result<u64, ClientError> {
        let query = FqlQuery::parse(filter)?;
        let devices = self.devices.read().await;
        Ok(devices.iter().filter(|d| query.matches(d)).count() as u64)
    }
}

/// Device query client for the cloud hosts API.
pub struct HttpDeviceService {
    api: RemoteApi,
}

impl HttpDeviceService {
    pub fn new(api: RemoteApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DeviceService for HttpDeviceService {
    async fn count_devices(&self, filter: &str) -> Result<u64, ClientError> {
        debug!(filter = %filter, "querying devices");
        let request = self
            .api
            .request(Method::GET, &["devices", "queries", "devices", "v1"])?
            .query(&[("filter", filter)]);
        let envelope = self.api.send_envelope::<String>(request).await?;
        // Prefer the reported total; the id list is capped at one page.
        let count = envelope
            .meta
            .pagination
            .map(|p| p.total)
            .filter(|total| *total > 0)
            .unwrap_or(envelope.resources.len());
        Ok(count as u64)
    }
}
