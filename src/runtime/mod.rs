//! Runtime daemon client capability
//!
//! The container runtime lives out of process. Everything the supervisor
//! knows about a task is a view obtained through [`RuntimeClient`], and the
//! connection behind it may drop and come back while the task keeps running.

mod error;
mod ipc;

pub use error::{classify, ErrorClass, ErrorKind, RuntimeError};
pub use ipc::IpcRuntime;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Container metadata stored by the runtime daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub image: String,
    /// Orchestration config embedded as a container extension
    #[serde(default)]
    pub config: ContainerConfig,
}

/// Per-container orchestration settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Network backend name ("none", "host"); empty means none
    #[serde(default)]
    pub network: String,
    /// Service endpoints to advertise, keyed by service name
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
}

/// One advertised endpoint of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub check: Option<HealthCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckType {
    Http { path: String },
    Tcp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub check_type: CheckType,
    pub interval_secs: u64,
}

/// In-process view of a task created by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: String,
    pub pid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Created,
    Running,
    Paused,
    Stopped,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: String,
    pub pid: u32,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub code: u32,
    pub exited_at: Option<DateTime<Utc>>,
}

impl ExitStatus {
    pub fn new(code: u32) -> Self {
        Self {
            code,
            exited_at: Some(Utc::now()),
        }
    }
}

/// A registered wait subscription. Resolves once, when the task exits or the
/// subscription is lost.
///
/// A subscription whose producer went away without reporting resolves to an
/// unavailable error: the connection died, not necessarily the task.
pub struct ExitWait {
    rx: oneshot::Receiver<Result<ExitStatus, RuntimeError>>,
}

impl ExitWait {
    /// Create a subscription and the sender that completes it
    pub fn channel() -> (oneshot::Sender<Result<ExitStatus, RuntimeError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }
}

impl Future for ExitWait {
    type Output = Result<ExitStatus, RuntimeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|res| {
            res.unwrap_or_else(|_| Err(RuntimeError::unavailable("wait subscription closed")))
        })
    }
}

/// Operations the supervisor needs from the runtime daemon.
///
/// Implementations share one logical connection; [`reconnect`] re-establishes
/// it in place and must be safe to call while it is already live.
///
/// [`reconnect`]: RuntimeClient::reconnect
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    async fn load_container(&self, id: &str) -> Result<ContainerInfo, RuntimeError>;

    /// Create the container's task. It shares the calling process's stdio,
    /// so its output lands in the service journal.
    async fn create_task(&self, id: &str) -> Result<TaskHandle, RuntimeError>;

    /// Look up the current task of a container; `NotFound` if it has none
    async fn load_task(&self, id: &str) -> Result<TaskInfo, RuntimeError>;

    async fn start(&self, id: &str) -> Result<(), RuntimeError>;

    /// Register a wait subscription. The exit, or loss of the subscription,
    /// arrives through the returned future.
    ///
    /// Errors returned here are local. A daemon that only answers once the
    /// task exits may also report a rejected registration (`NotFound` for a
    /// task deleted underneath us) through the future, so callers must
    /// classify its errors the same way. Subscribing after the exit still
    /// observes it: the daemon keeps the status until the task is deleted.
    async fn wait(&self, id: &str) -> Result<ExitWait, RuntimeError>;

    async fn kill(&self, id: &str, signal: Signal) -> Result<(), RuntimeError>;

    /// Delete the task, killing its process first when `kill` is set
    async fn delete_task(&self, id: &str, kill: bool) -> Result<Option<ExitStatus>, RuntimeError>;

    async fn reconnect(&self) -> Result<(), RuntimeError>;
}
