use super::{write_resolv_conf, HookContext, HookError};
use crate::supervisor::cleanup;

const PRE_START_REASON: &str = "task starting";

/// `exec-start-pre`: safe to run any number of times
pub async fn exec_start_pre(ctx: &HookContext, id: &str) -> Result<(), HookError> {
    ctx.ready().await?;

    let path = write_resolv_conf(&ctx.config.network.root, &ctx.config.network.nameservers).await?;
    log::debug!("Wrote {}", path.display());

    // Normally already armed by the previous cycle's post-start
    if let Err(e) = ctx.gate().arm(id, PRE_START_REASON).await {
        log::error!("Failed to enable maintenance for {}: {}", id, e);
    }

    cleanup(ctx.runtime.as_ref(), id).await?;
    Ok(())
}
