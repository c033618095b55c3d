mod post_start;
mod pre_start;
mod start;

pub use post_start::exec_start_post;
pub use pre_start::exec_start_pre;
pub use start::exec_start;

use std::path::Path;
use std::sync::Arc;

use ctrhook::hookup::ConsulDirectory;
use ctrhook::runtime::IpcRuntime;
use ctrhook::{Config, HookContext};

/// Load config and wire up the daemon-backed collaborators
async fn context(config_path: Option<&Path>) -> Result<HookContext, Box<dyn std::error::Error>> {
    let config = Config::load(config_path).await?;

    let runtime = IpcRuntime::new(config.runtime.socket.clone(), config.runtime.namespace.clone());
    let directory = ConsulDirectory::new(&config.consul);
    let networks = config.network.clone();

    Ok(HookContext {
        runtime: Arc::new(runtime),
        directory: Arc::new(directory),
        networks: Arc::new(networks),
        config,
    })
}
