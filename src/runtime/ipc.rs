//! Runtime client over the daemon's unix socket

use async_trait::async_trait;
use nix::sys::signal::Signal;
use peercred_ipc::Client;

use super::{
    ContainerInfo, ErrorKind, ExitStatus, ExitWait, RuntimeClient, RuntimeError, TaskHandle, TaskInfo,
};
use crate::protocol::{Request, Response};

/// [`RuntimeClient`] that opens one connection per call.
///
/// Every transport failure maps to `Unavailable`; errors the daemon itself
/// reports keep their kind. Since no connection outlives a call, reconnecting
/// amounts to proving the daemon answers again.
#[derive(Debug, Clone)]
pub struct IpcRuntime {
    socket_path: String,
    namespace: String,
}

impl IpcRuntime {
    pub fn new(socket_path: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            namespace: namespace.into(),
        }
    }

    async fn call(&self, request: Request) -> Result<Response, RuntimeError> {
        let socket_path = self.socket_path.clone();
        let response = tokio::task::spawn_blocking(move || {
            let result: Result<Response, _> = Client::call(&socket_path, &request);
            result.map_err(|e| RuntimeError::unavailable(format!("{}: {}", socket_path, e)))
        })
        .await
        .map_err(|e| RuntimeError::new(ErrorKind::Internal, format!("ipc worker failed: {}", e)))??;

        response.into_result()
    }
}

fn unexpected(response: Response) -> RuntimeError {
    RuntimeError::new(
        ErrorKind::Internal,
        format!("unexpected response: {:?}", response),
    )
}

#[async_trait]
impl RuntimeClient for IpcRuntime {
    async fn load_container(&self, id: &str) -> Result<ContainerInfo, RuntimeError> {
        let request = Request::LoadContainer {
            namespace: self.namespace.clone(),
            id: id.to_string(),
        };
        match self.call(request).await? {
            Response::Container(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    async fn create_task(&self, id: &str) -> Result<TaskHandle, RuntimeError> {
        let request = Request::CreateTask {
            namespace: self.namespace.clone(),
            id: id.to_string(),
        };
        match self.call(request).await? {
            Response::Created(handle) => Ok(handle),
            other => Err(unexpected(other)),
        }
    }

    async fn load_task(&self, id: &str) -> Result<TaskInfo, RuntimeError> {
        let request = Request::LoadTask {
            namespace: self.namespace.clone(),
            id: id.to_string(),
        };
        match self.call(request).await? {
            Response::Task(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        let request = Request::Start {
            namespace: self.namespace.clone(),
            id: id.to_string(),
        };
        match self.call(request).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn wait(&self, id: &str) -> Result<ExitWait, RuntimeError> {
        // The daemon answers a wait only when the task exits, so this returns
        // before it has accepted the subscription; a rejection comes back
        // through the future. It keeps the exit status until the task is
        // deleted, so a wait that reaches it after the exit still observes
        // the code.
        let (tx, wait) = ExitWait::channel();
        let client = self.clone();
        let request = Request::Wait {
            namespace: self.namespace.clone(),
            id: id.to_string(),
        };

        tokio::spawn(async move {
            let result = match client.call(request).await {
                Ok(Response::Exit(status)) => Ok(status),
                Ok(other) => Err(unexpected(other)),
                Err(e) => Err(e),
            };
            // Supervisor may have stopped listening
            let _ = tx.send(result);
        });

        Ok(wait)
    }

    async fn kill(&self, id: &str, signal: Signal) -> Result<(), RuntimeError> {
        let request = Request::Kill {
            namespace: self.namespace.clone(),
            id: id.to_string(),
            signal: signal as i32,
        };
        match self.call(request).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn delete_task(&self, id: &str, kill: bool) -> Result<Option<ExitStatus>, RuntimeError> {
        let request = Request::Delete {
            namespace: self.namespace.clone(),
            id: id.to_string(),
            kill,
        };
        match self.call(request).await? {
            Response::Deleted(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    async fn reconnect(&self) -> Result<(), RuntimeError> {
        match self.call(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}
