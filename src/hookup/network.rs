//! Network provisioning for started tasks

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use nix::ifaddrs::getifaddrs;

use crate::config::NetworkConfig;
use crate::runtime::TaskHandle;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("unknown network backend: {0}")]
    UnknownBackend(String),

    #[error("network backend {0} requires Interface= in [Network]")]
    MissingInterface(String),

    #[error("interface {0} has no address")]
    NoAddress(String),

    #[error("failed to list interfaces: {0}")]
    Sys(#[from] nix::Error),
}

/// Gives a task its network identity. `Ok(None)` means the task has no
/// networking of its own, which is valid.
#[async_trait]
pub trait NetworkProvisioner: Send + Sync {
    async fn create(&self, task: &TaskHandle) -> Result<Option<IpAddr>, NetworkError>;
}

/// Picks a provisioner by the backend name in a container's config
pub trait NetworkBackends: Send + Sync {
    fn select(&self, name: &str) -> Result<Arc<dyn NetworkProvisioner>, NetworkError>;
}

/// No networking configured
pub struct NoNetwork;

#[async_trait]
impl NetworkProvisioner for NoNetwork {
    async fn create(&self, _task: &TaskHandle) -> Result<Option<IpAddr>, NetworkError> {
        Ok(None)
    }
}

/// Task shares the host's network; its address is the host interface's
pub struct HostNetwork {
    interface: String,
}

impl HostNetwork {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }
}

#[async_trait]
impl NetworkProvisioner for HostNetwork {
    async fn create(&self, task: &TaskHandle) -> Result<Option<IpAddr>, NetworkError> {
        let ip = interface_address(&self.interface)?
            .ok_or_else(|| NetworkError::NoAddress(self.interface.clone()))?;
        log::debug!("Task {} uses host address {} ({})", task.id, ip, self.interface);
        Ok(Some(ip))
    }
}

/// First address of an interface, IPv4 preferred
pub fn interface_address(interface: &str) -> Result<Option<IpAddr>, NetworkError> {
    let mut v6 = None;

    for ifaddr in getifaddrs()? {
        if ifaddr.interface_name != interface {
            continue;
        }
        let Some(addr) = ifaddr.address else {
            continue;
        };
        if let Some(sin) = addr.as_sockaddr_in() {
            return Ok(Some(IpAddr::V4(sin.ip())));
        }
        if v6.is_none() {
            v6 = addr.as_sockaddr_in6().map(|sin6| IpAddr::V6(sin6.ip()));
        }
    }

    Ok(v6)
}

impl NetworkBackends for NetworkConfig {
    fn select(&self, name: &str) -> Result<Arc<dyn NetworkProvisioner>, NetworkError> {
        match name {
            "" | "none" => Ok(Arc::new(NoNetwork)),
            "host" => {
                let interface = self
                    .interface
                    .clone()
                    .ok_or_else(|| NetworkError::MissingInterface(name.to_string()))?;
                Ok(Arc::new(HostNetwork::new(interface)))
            }
            other => Err(NetworkError::UnknownBackend(other.to_string())),
        }
    }
}
