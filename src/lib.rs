//! ctrhook - run runtime-managed containers as init-system services
//!
//! The init system invokes three hooks per service start (pre-start, start,
//! post-start). ctrhook turns them into container operations against a
//! runtime daemon, so the container's task behaves like a supervised native
//! service: its exit code becomes the service's, signals sent to the service
//! reach the task, and restart policy applies unchanged.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │      hooks (pre-start / start / post-start)      │
//! ├────────────────────────┬─────────────────────────┤
//! │    Task Supervisor     │ Hookup (net, services)  │
//! ├────────────────────────┼─────────────────────────┤
//! │  Runtime client (IPC)  │ Service directory       │
//! └────────────────────────┴─────────────────────────┘
//! ```

pub mod config;
pub mod hookup;
pub mod hooks;
pub mod protocol;
pub mod runtime;
pub mod supervisor;

pub use config::Config;
pub use hooks::{HookContext, HookError};
pub use runtime::{RuntimeClient, RuntimeError};
pub use supervisor::{Supervisor, SupervisorError};
