//! Workflow provisioning collaborator.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::ClientError;
use crate::remote::RemoteApi;

/// Request to instantiate a workflow from a system template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionRequest {
    pub name: String,
    pub template_name: String,
    pub parameters: Value,
}

#[async_trait]
pub trait WorkflowProvisioner: Send + Sync {
    /// Provision a workflow and return the created definition ids.
    async fn provision(&self, request: &ProvisionRequest) -> Result<Vec<String>, ClientError>;
}

/// Records provision requests and hands out random ids.
pub struct MemoryWorkflowProvisioner {
    provisioned: RwLock<Vec<(String, ProvisionRequest)>>,
}

impl MemoryWorkflowProvisioner {
    pub fn new() -> Self {
        Self {
            provisioned: RwLock::new(Vec::new()),
        }
    }

    /// Everything provisioned so far, as `(id, request)`.
    pub async fn provisioned(&self) -> Vec<(String, ProvisionRequest)> {
        self.provisioned.read().await.clone()
    }
}

impl Default for MemoryWorkflowProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowProvisioner for MemoryWorkflowProvisioner {
    async fn provision(&self, request: &ProvisionRequest) -> Result<Vec<String>, ClientError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        info!(workflow = %request.name, template = %request.template_name, id = %id, "provisioned workflow");
        self.provisioned
            .write()
            .await
            .push((id.clone(), request.clone()));
        Ok(vec![id])
    }
}

/// Provisioning client for the cloud workflows API.
pub struct HttpWorkflowProvisioner {
    api: RemoteApi,
}

impl HttpWorkflowProvisioner {
    pub fn new(api: RemoteApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl WorkflowProvisioner for HttpWorkflowProvisioner {
    async fn provision(&self, request: &ProvisionRequest) -> Result<Vec<String>, ClientError> {
        let builder = self
            .api
            .request(
                Method::POST,
                &["workflows", "system-definitions", "provision", "v1"],
            )?
            .json(request);
        let envelope = self.api.send_envelope::<String>(builder).await?;
        if envelope.resources.is_empty() {
            return Err(ClientError::Decode(format!(
                "resources from workflow is 0 for {}",
                request.name
            )));
        }
        info!(workflow = %request.name, ids = ?envelope.resources, "provisioned workflow");
        Ok(envelope.resources)
    }
}
