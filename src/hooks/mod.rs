//! Init-system lifecycle hooks
//!
//! The init system runs each hook as its own process, in order, for every
//! start of a service:
//!
//! - `exec-start-pre`: prepare host files, keep the service out of rotation,
//!   remove any stale task
//! - `exec-start`: create and supervise the task; the hook's exit status is
//!   the task's
//! - `exec-start-post`: remove the task and take the service out of rotation
//!
//! Only the service directory's maintenance flag carries state from one hook
//! process to the next.

mod post_start;
mod pre_start;
mod resolv;
mod start;

pub use post_start::exec_start_post;
pub use pre_start::exec_start_pre;
pub use resolv::write_resolv_conf;
pub use start::exec_start;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::hookup::{HealthGate, NetworkBackends, ServiceDirectory};
use crate::runtime::{RuntimeClient, RuntimeError};
use crate::supervisor::{ReconnectError, ReconnectPolicy, SupervisorError};

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("container id is required")]
    MissingId,

    #[error("runtime daemon not ready: {0}")]
    NotReady(#[source] ReconnectError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("failed to write {}: {source}", path.display())]
    ResolvConf {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Collaborators shared by all hooks
#[derive(Clone)]
pub struct HookContext {
    pub config: Config,
    pub runtime: Arc<dyn RuntimeClient>,
    pub directory: Arc<dyn ServiceDirectory>,
    pub networks: Arc<dyn NetworkBackends>,
}

impl HookContext {
    pub fn gate(&self) -> HealthGate {
        HealthGate::new(Arc::clone(&self.directory))
    }

    /// Wait until the runtime daemon answers, within the reconnect bound
    pub async fn ready(&self) -> Result<(), HookError> {
        ReconnectPolicy::from(&self.config.supervisor)
            .reconnect(self.runtime.as_ref())
            .await
            .map(|_| ())
            .map_err(HookError::NotReady)
    }
}

/// Validate the container id argument every hook receives
pub fn require_id(id: Option<&str>) -> Result<&str, HookError> {
    match id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(HookError::MissingId),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_id() {
        assert_eq!(require_id(Some("web-1")).unwrap(), "web-1");
        assert!(matches!(require_id(None), Err(HookError::MissingId)));
        assert!(matches!(require_id(Some("")), Err(HookError::MissingId)));
        assert!(matches!(require_id(Some("  ")), Err(HookError::MissingId)));
    }
}
