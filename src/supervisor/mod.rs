//! Task supervisor
//!
//! Drives one task from start to exit on behalf of the `exec-start` hook:
//!
//! - registers a wait subscription before the task starts, so an early exit
//!   cannot be missed
//! - marks the service healthy once the start call returns successfully
//! - relays every OS signal the hook receives to the task
//! - survives loss of the daemon connection: a wait that fails with
//!   "unavailable" means the connection died, not the task, so the loop
//!   reconnects and subscribes again
//! - closes the gate again and tears the task down exactly once when
//!   supervision ends, however it ends

mod cleanup;
mod reconnect;
mod signals;
mod state;

pub use cleanup::{cleanup, teardown};
pub use reconnect::{ReconnectError, ReconnectPolicy};
pub use signals::{forwarded_signals, spawn_forwarder, SignalError, SignalRelay};
pub use state::SupervisorState;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_lite::FutureExt;
use nix::sys::signal::Signal;
use tokio::sync::mpsc;

use crate::config::SupervisorConfig;
use crate::hookup::Hookup;
use crate::runtime::{ExitWait, RuntimeClient, RuntimeError, TaskHandle};

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to wait on task: {0}")]
    Subscribe(#[source] RuntimeError),

    #[error("failed to start task: {0}")]
    Start(#[source] RuntimeError),

    #[error("task wait failed: {0}")]
    Wait(#[source] RuntimeError),

    #[error(transparent)]
    Reconnect(#[from] ReconnectError),

    #[error("supervisor panicked: {0}")]
    Panicked(String),
}

pub struct Supervisor {
    client: Arc<dyn RuntimeClient>,
    hookup: Hookup,
    reconnect: ReconnectPolicy,
    relay: SignalRelay,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(client: Arc<dyn RuntimeClient>, config: &SupervisorConfig, hookup: Hookup) -> Self {
        let reconnect = ReconnectPolicy::from(config);
        Self {
            client,
            hookup,
            reconnect,
            relay: SignalRelay::new(config.signal_attempts, reconnect),
            state: SupervisorState::Idle,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Start the task and supervise it until it exits.
    ///
    /// Returns the task's exit code, or an error when the task's real status
    /// can no longer be known. The task is torn down before returning in
    /// both cases.
    pub async fn supervise(
        &mut self,
        task: &TaskHandle,
        signals: &mut mpsc::Receiver<Signal>,
    ) -> Result<u32, SupervisorError> {
        let result = match AssertUnwindSafe(self.monitor(task, signals))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(SupervisorError::Panicked(panic_message(panic.as_ref()))),
        };

        if self.state.is_started() {
            self.hookup.on_stopped(&task.id).await;
        }
        teardown(self.client.as_ref(), &task.id).await;

        match &result {
            Ok(code) => {
                log::info!("Task {} exited with code {}", task.id, code);
                self.transition(&task.id, SupervisorState::Exited(*code));
            }
            Err(e) => {
                log::error!("Supervision of {} failed: {}", task.id, e);
                self.transition(&task.id, SupervisorState::Failed);
            }
        }

        result
    }

    async fn monitor(
        &mut self,
        task: &TaskHandle,
        signals: &mut mpsc::Receiver<Signal>,
    ) -> Result<u32, SupervisorError> {
        let client = Arc::clone(&self.client);
        let mut wait = self.subscribe(client.as_ref(), &task.id).await?;

        self.transition(&task.id, SupervisorState::AwaitingStart);
        let mut start = client.start(&task.id);
        let mut start_done = false;
        let mut signals_open = true;

        loop {
            tokio::select! {
                biased;

                result = &mut start, if !start_done => {
                    start_done = true;
                    result.map_err(SupervisorError::Start)?;
                    self.transition(&task.id, SupervisorState::Running);
                    log::info!("Task {} started (pid {})", task.id, task.pid);
                    self.hookup.on_started(task).await;
                }

                sig = signals.recv(), if signals_open => match sig {
                    Some(sig) => {
                        if let Err(e) = self.relay.relay(client.as_ref(), &task.id, sig).await {
                            log::error!("Failed to signal task {}: {}", task.id, e);
                        }
                    }
                    None => signals_open = false,
                },

                status = &mut wait => match status {
                    Ok(status) => {
                        self.transition(&task.id, SupervisorState::Draining);
                        return Ok(status.code);
                    }
                    Err(e) if e.is_unavailable() => {
                        log::warn!("Lost connection while waiting on {}: {}", task.id, e);
                        self.reconnect.reconnect(client.as_ref()).await?;
                        wait = self.subscribe(client.as_ref(), &task.id).await?;
                    }
                    Err(e) => return Err(SupervisorError::Wait(e)),
                },
            }
        }
    }

    fn transition(&mut self, id: &str, next: SupervisorState) {
        log::debug!("Task {}: {} -> {}", id, self.state.as_str(), next.as_str());
        self.state = next;
    }

    /// Register the one wait subscription, retrying once through a reconnect
    async fn subscribe(&self, client: &dyn RuntimeClient, id: &str) -> Result<ExitWait, SupervisorError> {
        match client.wait(id).await {
            Ok(wait) => Ok(wait),
            Err(e) if e.is_unavailable() => {
                log::warn!("Lost connection subscribing to {}: {}", id, e);
                self.reconnect.reconnect(client).await?;
                client.wait(id).await.map_err(SupervisorError::Subscribe)
            }
            Err(e) => Err(SupervisorError::Subscribe(e)),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
