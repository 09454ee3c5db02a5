//! API server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::http::routes::create_router;
use crate::state::AppState;

/// Listen address of the API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl ApiConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl From<&rtr_jobs_config::ServerConfig> for ApiConfig {
    fn from(server: &rtr_jobs_config::ServerConfig) -> Self {
        Self::new(server.host.clone(), server.port)
    }
}

pub struct ApiServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the server address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Serve until Ctrl-C.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
    }

    /// Serve until `shutdown` completes, letting in-flight requests finish.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state.clone());

        let addr: SocketAddr = self.addr().parse()?;
        let listener = TcpListener::bind(addr).await?;

        info!("API server listening on {}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ServiceSettings;
    use crate::state::Collaborators;
    use rtr_jobs_clients::PollSettings;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(
            Collaborators::in_memory(PollSettings::default()),
            Arc::new(ServiceSettings::default()),
        ))
    }

    #[test]
    fn test_api_config_default() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_api_config_from_server_section() {
        let server = rtr_jobs_config::ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 9443,
        };
        let config = ApiConfig::from(&server);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9443);
    }

    #[test]
    fn test_server_addr_format() {
        let server = ApiServer::new(ApiConfig::new("192.168.1.1", 443), state());
        assert_eq!(server.addr(), "192.168.1.1:443");
    }

    #[tokio::test]
    async fn test_run_until_stops_on_signal() {
        let server = ApiServer::new(ApiConfig::new("127.0.0.1", 0), state());
        let result = server.run_until(async {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bad_address_is_error() {
        let server = ApiServer::new(ApiConfig::new("not an address", 80), state());
        assert!(server.run_until(async {}).await.is_err());
    }
}
