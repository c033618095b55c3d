//! Task removal: pre-start cleanup and post-exit teardown

use crate::runtime::{RuntimeClient, RuntimeError};

/// Make sure no task exists for the container.
///
/// A container without a task is the normal case and succeeds with no side
/// effect. A stale task is killed and deleted.
pub async fn cleanup(client: &dyn RuntimeClient, id: &str) -> Result<(), RuntimeError> {
    let task = match client.load_task(id).await {
        Ok(task) => task,
        Err(e) if e.is_not_found() => {
            log::debug!("No previous task for {}", id);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    log::info!(
        "Removing previous task for {} (pid {}, {:?})",
        id,
        task.pid,
        task.status
    );

    match client.delete_task(id, true).await {
        Ok(_) => Ok(()),
        // Raced with another cleanup
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Kill and delete the task after supervision ends. Never fails: the
/// supervisor's own result must not be replaced by a teardown error.
pub async fn teardown(client: &dyn RuntimeClient, id: &str) {
    match client.delete_task(id, true).await {
        Ok(Some(status)) => log::debug!("Deleted task {} (exit {})", id, status.code),
        Ok(None) => log::debug!("Deleted task {}", id),
        Err(e) if e.is_not_found() => log::debug!("Task {} already gone", id),
        Err(e) => log::warn!("Failed to delete task {}: {}", id, e),
    }
}
