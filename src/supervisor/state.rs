//! Supervisor state machine
//!
//! ```text
//!     ┌──────────┐
//!     │   Idle   │
//!     └────┬─────┘
//!          │ wait registered, start issued
//!     ┌────▼──────────┐
//!     │ AwaitingStart │───────────────┐
//!     └────┬──────────┘               │ start failed
//!          │ start confirmed          │
//!     ┌────▼─────┐                    │
//!     │ Running  │────────────────────┤ wait failed / reconnect exhausted
//!     └────┬─────┘                    │
//!          │ task exited              │
//!     ┌────▼─────┐               ┌────▼────┐
//!     │ Draining │               │ Failed  │
//!     └────┬─────┘               └─────────┘
//!          │ teardown done
//!     ┌────▼─────┐
//!     │ Exited   │
//!     └──────────┘
//! ```

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    AwaitingStart,
    Running,
    /// Exit observed, tearing the task down
    Draining,
    Exited(u32),
    Failed,
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingStart => "awaiting-start",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Exited(_) => "exited",
            Self::Failed => "failed",
        }
    }

    /// The task got past start and may have been advertised healthy
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Running | Self::Draining)
    }
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self::Idle
    }
}
