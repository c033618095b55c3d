//! Service directory capability and health gate

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::runtime::ServiceSpec;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("service directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service directory rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("service directory error: {0}")]
    Other(String),
}

/// Registry of service endpoints with a per-container maintenance flag.
///
/// All operations are idempotent: registering twice updates in place, and
/// toggling maintenance on a container with no registered services is a
/// no-op.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    async fn register(
        &self,
        container: &str,
        name: &str,
        ip: IpAddr,
        spec: &ServiceSpec,
    ) -> Result<(), DirectoryError>;

    async fn deregister(&self, container: &str, name: &str) -> Result<(), DirectoryError>;

    /// Names of the services currently registered for a container
    async fn registered(&self, container: &str) -> Result<Vec<String>, DirectoryError>;

    /// Take the container's services out of rotation
    async fn enable_maintenance(&self, container: &str, reason: &str) -> Result<(), DirectoryError>;

    /// Put the container's services back into rotation
    async fn disable_maintenance(&self, container: &str) -> Result<(), DirectoryError>;
}

/// The maintenance flag seen as a traffic gate: armed means no traffic
#[derive(Clone)]
pub struct HealthGate {
    directory: Arc<dyn ServiceDirectory>,
}

impl HealthGate {
    pub fn new(directory: Arc<dyn ServiceDirectory>) -> Self {
        Self { directory }
    }

    pub async fn arm(&self, container: &str, reason: &str) -> Result<(), DirectoryError> {
        log::debug!("Arming health gate for {} ({})", container, reason);
        self.directory.enable_maintenance(container, reason).await
    }

    pub async fn clear(&self, container: &str) -> Result<(), DirectoryError> {
        log::debug!("Clearing health gate for {}", container);
        self.directory.disable_maintenance(container).await
    }
}
