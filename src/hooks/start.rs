use std::sync::Arc;

use nix::sys::signal::Signal;
use tokio::sync::mpsc;

use super::{HookContext, HookError};
use crate::hookup::{Hookup, NetworkProvisioner, NoNetwork};
use crate::supervisor::Supervisor;

/// `exec-start`: create the container's task and supervise it until exit.
///
/// `signals` should be wired up before calling so nothing the init system
/// sends in the meantime is lost. Returns the task's exit code.
pub async fn exec_start(
    ctx: &HookContext,
    id: &str,
    signals: &mut mpsc::Receiver<Signal>,
) -> Result<u32, HookError> {
    ctx.ready().await?;

    let container = ctx.runtime.load_container(id).await?;
    let task = ctx.runtime.create_task(id).await?;
    log::info!("Created task {} from {} (pid {})", task.id, container.image, task.pid);

    let network: Arc<dyn NetworkProvisioner> = match ctx.networks.select(&container.config.network) {
        Ok(network) => network,
        Err(e) => {
            log::error!("Network for {} unavailable: {}", id, e);
            Arc::new(NoNetwork)
        }
    };

    let hookup = Hookup::new(
        Arc::clone(&ctx.directory),
        network,
        container.config.services,
    );
    let mut supervisor = Supervisor::new(Arc::clone(&ctx.runtime), &ctx.config.supervisor, hookup);

    Ok(supervisor.supervise(&task, signals).await?)
}
