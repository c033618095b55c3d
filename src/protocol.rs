//! IPC protocol spoken with the runtime daemon
//!
//! One msgpack-encoded request per connection, answered by one response.

use serde::{Deserialize, Serialize};

use crate::runtime::{ContainerInfo, ErrorKind, ExitStatus, RuntimeError, TaskHandle, TaskInfo};

pub const SOCKET_PATH: &str = "/run/ctrhook/runtime.sock";

pub const DEFAULT_NAMESPACE: &str = "ctrhook";

/// Request from a hook to the runtime daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Health check, used to (re)establish the connection
    Ping,
    LoadContainer { namespace: String, id: String },
    /// The daemon attaches the task to the caller's stdio
    CreateTask { namespace: String, id: String },
    LoadTask { namespace: String, id: String },
    Start { namespace: String, id: String },
    /// Answered when the task exits; answered at once if it already has
    Wait { namespace: String, id: String },
    Kill { namespace: String, id: String, signal: i32 },
    Delete { namespace: String, id: String, kill: bool },
}

/// Response from the runtime daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Pong,
    Ok,
    Container(ContainerInfo),
    Created(TaskHandle),
    Task(TaskInfo),
    Exit(ExitStatus),
    Deleted(Option<ExitStatus>),
    Error { kind: ErrorKind, message: String },
}

impl Response {
    /// Turn a daemon-reported error into `Err`, pass anything else through
    pub fn into_result(self) -> Result<Response, RuntimeError> {
        match self {
            Response::Error { kind, message } => Err(RuntimeError::new(kind, message)),
            other => Ok(other),
        }
    }
}
