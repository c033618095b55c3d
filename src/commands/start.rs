//! ExecStart hook

use std::path::Path;

use ctrhook::hooks::{self, require_id};
use ctrhook::supervisor::spawn_forwarder;

/// Returns the task's exit code
pub async fn exec_start(
    config: Option<&Path>,
    id: Option<&str>,
) -> Result<u32, Box<dyn std::error::Error>> {
    let id = require_id(id)?;
    let ctx = super::context(config).await?;

    // Catch signals before anything else so none hits the default action
    let mut signals = spawn_forwarder(ctx.config.supervisor.signal_queue)?;

    Ok(hooks::exec_start(&ctx, id, &mut signals).await?)
}
