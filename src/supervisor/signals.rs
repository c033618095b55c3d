//! Signal forwarding from the hook process to the task
//!
//! Every signal the init system sends to the hook is queued in arrival order
//! and relayed to the task by the supervisor loop.

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use super::reconnect::{ReconnectError, ReconnectPolicy};
use crate::runtime::{RuntimeClient, RuntimeError};

/// Signals a process may not install handlers for. Everything else is
/// forwarded verbatim.
const NOT_FORWARDED: &[Signal] = &[
    Signal::SIGKILL,
    Signal::SIGSTOP,
    Signal::SIGILL,
    Signal::SIGFPE,
    Signal::SIGSEGV,
];

/// Signals the hook process catches and relays to the task
pub fn forwarded_signals() -> impl Iterator<Item = Signal> {
    Signal::iterator().filter(|sig| !NOT_FORWARDED.contains(sig))
}

/// Install handlers for every forwarded signal and feed them into a bounded
/// queue. Handlers are installed before this returns.
///
/// A full queue applies backpressure to the handler tasks instead of
/// dropping signals.
pub fn spawn_forwarder(capacity: usize) -> std::io::Result<mpsc::Receiver<Signal>> {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    for sig in forwarded_signals() {
        let mut stream = signal(SignalKind::from_raw(sig as i32))?;
        let tx = tx.clone();

        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                log::debug!("Received {}", sig);
                if tx.send(sig).await.is_err() {
                    // Supervisor gone
                    break;
                }
            }
        });
    }

    Ok(rx)
}

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("unable to signal task with {signal} after {attempts} attempts")]
    Undeliverable { signal: Signal, attempts: u32 },

    #[error("task rejected {signal}: {source}")]
    Rejected {
        signal: Signal,
        #[source]
        source: RuntimeError,
    },

    #[error(transparent)]
    Reconnect(#[from] ReconnectError),
}

/// Sends signals to the task, reconnecting through connection loss
#[derive(Debug, Clone, Copy)]
pub struct SignalRelay {
    /// Total send attempts per signal
    pub attempts: u32,
    pub reconnect: ReconnectPolicy,
}

impl SignalRelay {
    pub fn new(attempts: u32, reconnect: ReconnectPolicy) -> Self {
        Self { attempts, reconnect }
    }

    /// Deliver one signal. Task-level errors fail at once; connection loss
    /// triggers a reconnect and another try, up to the attempt bound.
    pub async fn relay(
        &self,
        client: &dyn RuntimeClient,
        id: &str,
        signal: Signal,
    ) -> Result<(), SignalError> {
        let attempts = self.attempts.max(1);

        for attempt in 1..=attempts {
            match client.kill(id, signal).await {
                Ok(()) => {
                    log::debug!("Relayed {} to {} (attempt {})", signal, id, attempt);
                    return Ok(());
                }
                Err(e) if e.is_unavailable() => {
                    log::warn!("Signal {} to {} lost connection: {}", signal, id, e);
                    // No send follows the last attempt
                    if attempt < attempts {
                        self.reconnect.reconnect(client).await?;
                    }
                }
                Err(source) => return Err(SignalError::Rejected { signal, source }),
            }
        }

        Err(SignalError::Undeliverable { signal, attempts })
    }
}
