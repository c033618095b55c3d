use super::{HookContext, HookError};
use crate::hookup::EXITED_REASON;
use crate::supervisor::cleanup;

/// `exec-start-post`: runs once the start hook's process is gone, whether it
/// exited cleanly or crashed. The gate lives in the service directory, so it
/// is re-armed even when the runtime daemon is down or cleanup fails.
pub async fn exec_start_post(ctx: &HookContext, id: &str) -> Result<(), HookError> {
    let result = match ctx.ready().await {
        Ok(()) => cleanup(ctx.runtime.as_ref(), id)
            .await
            .map_err(HookError::from),
        Err(e) => Err(e),
    };

    if let Err(e) = ctx.gate().arm(id, EXITED_REASON).await {
        log::error!("Failed to enable maintenance for {}: {}", id, e);
    }

    result
}
