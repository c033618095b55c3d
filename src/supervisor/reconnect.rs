//! Bounded reconnection to the runtime daemon

use std::time::Duration;

use crate::config::SupervisorConfig;
use crate::runtime::{RuntimeClient, RuntimeError};

#[derive(Debug, thiserror::Error)]
#[error("runtime daemon unreachable after {attempts} reconnect attempts: {last}")]
pub struct ReconnectError {
    pub attempts: u32,
    #[source]
    pub last: RuntimeError,
}

/// Fixed-interval retry of `RuntimeClient::reconnect`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&SupervisorConfig::default())
    }
}

impl From<&SupervisorConfig> for ReconnectPolicy {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            attempts: config.reconnect_attempts.max(1),
            interval: config.reconnect_interval,
        }
    }
}

impl ReconnectPolicy {
    /// Re-establish the connection, returning the attempt that succeeded.
    ///
    /// A live connection succeeds on the first attempt. Exhaustion means the
    /// task's fate is unknown; callers treat it as fatal.
    pub async fn reconnect(&self, client: &dyn RuntimeClient) -> Result<u32, ReconnectError> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match client.reconnect().await {
                Ok(()) => {
                    if attempt > 1 {
                        log::info!("Reconnected to runtime daemon (attempt {})", attempt);
                    }
                    return Ok(attempt);
                }
                Err(last) if attempt >= attempts => {
                    log::error!("Giving up on runtime daemon after {} attempts: {}", attempt, last);
                    return Err(ReconnectError { attempts, last });
                }
                Err(e) => {
                    log::debug!("Reconnect attempt {}/{} failed: {}", attempt, attempts, e);
                    attempt += 1;
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}
