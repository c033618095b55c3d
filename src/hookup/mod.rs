//! Side effects tied to a task's lifecycle
//!
//! Once the supervisor confirms a task started, the task is let into
//! rotation: the health gate is cleared, the network attached and the
//! container's services registered under the task's address. Nothing here
//! is fatal; failures are logged and the task keeps running.

mod consul;
mod directory;
mod network;

pub use consul::{service_id, ConsulDirectory};
pub use directory::{DirectoryError, HealthGate, ServiceDirectory};
pub use network::{
    interface_address, HostNetwork, NetworkBackends, NetworkError, NetworkProvisioner, NoNetwork,
};

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::runtime::{ServiceSpec, TaskHandle};

/// Reason recorded on the gate when a task is gone
pub const EXITED_REASON: &str = "task exited";

pub struct Hookup {
    directory: Arc<dyn ServiceDirectory>,
    gate: HealthGate,
    network: Arc<dyn NetworkProvisioner>,
    services: BTreeMap<String, ServiceSpec>,
}

impl Hookup {
    pub fn new(
        directory: Arc<dyn ServiceDirectory>,
        network: Arc<dyn NetworkProvisioner>,
        services: BTreeMap<String, ServiceSpec>,
    ) -> Self {
        Self {
            gate: HealthGate::new(Arc::clone(&directory)),
            directory,
            network,
            services,
        }
    }

    /// Run after the task's start call succeeded. Returns the task's address
    /// if it got one.
    pub async fn on_started(&self, task: &TaskHandle) -> Option<IpAddr> {
        if let Err(e) = self.gate.clear(&task.id).await {
            log::error!("Failed to disable maintenance for {}: {}", task.id, e);
        }

        let ip = match self.network.create(task).await {
            Ok(ip) => ip,
            Err(e) => {
                log::error!("Failed to set up network for {}: {}", task.id, e);
                return None;
            }
        };

        match ip {
            Some(ip) => {
                log::debug!("Task {} has address {}", task.id, ip);
                self.register_services(&task.id, ip).await;
            }
            None => log::debug!("Task {} has no network", task.id),
        }

        self.remove_stale(&task.id, ip.is_some()).await;
        ip
    }

    /// Take the task out of rotation
    pub async fn on_stopped(&self, id: &str) {
        if let Err(e) = self.gate.arm(id, EXITED_REASON).await {
            log::error!("Failed to enable maintenance for {}: {}", id, e);
        }
    }

    async fn register_services(&self, id: &str, ip: IpAddr) {
        for (name, spec) in &self.services {
            match self.directory.register(id, name, ip, spec).await {
                Ok(()) => log::info!("Registered {} for {} at {}:{}", name, id, ip, spec.port),
                Err(e) => log::error!("Failed to register {} for {}: {}", name, id, e),
            }
        }
    }

    /// Drop registrations left over from an earlier config of this container
    async fn remove_stale(&self, id: &str, attached: bool) {
        let registered = match self.directory.registered(id).await {
            Ok(names) => names,
            Err(e) => {
                log::warn!("Failed to list services of {}: {}", id, e);
                return;
            }
        };

        for name in registered {
            if attached && self.services.contains_key(&name) {
                continue;
            }
            match self.directory.deregister(id, &name).await {
                Ok(()) => log::info!("Deregistered stale service {} of {}", name, id),
                Err(e) => log::warn!("Failed to deregister {} of {}: {}", name, id, e),
            }
        }
    }
}
