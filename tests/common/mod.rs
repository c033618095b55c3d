//! In-memory runtime daemon, service directory and network for integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::Signal;
use tokio::sync::{oneshot, watch};

use ctrhook::config::{Config, SupervisorConfig};
use ctrhook::hookup::{
    DirectoryError, NetworkBackends, NetworkError, NetworkProvisioner, ServiceDirectory,
};
use ctrhook::runtime::{
    ContainerConfig, ContainerInfo, ExitStatus, ExitWait, RuntimeClient, RuntimeError,
    ServiceSpec, TaskHandle, TaskInfo, TaskStatus,
};
use ctrhook::HookContext;

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Ordered record of externally visible effects, shared by all fakes
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

pub fn position(journal: &Journal, entry: &str) -> Option<usize> {
    journal.lock().unwrap().iter().position(|e| e == entry)
}

pub fn unique_test_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("ctrhook-test-{}-{}", std::process::id(), id));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Supervisor bounds with a short interval so exhaustion tests stay fast
pub fn fast_supervisor() -> SupervisorConfig {
    SupervisorConfig {
        reconnect_interval: Duration::from_millis(1),
        ..SupervisorConfig::default()
    }
}

/// What the next wait subscription will observe
#[derive(Debug)]
pub enum WaitOutcome {
    /// Task exits with this code once started
    Exit(u32),
    /// Connection drops after the task started
    Lost,
    /// Daemon reports a task-level error
    Fail(RuntimeError),
    /// Nothing until a relayed signal or test ends the task
    Pending,
}

/// Counts a wait subscription as live until its outcome is sent or dropped
struct LiveSubscription {
    live: Arc<AtomicU32>,
}

impl LiveSubscription {
    fn new(live: &Arc<AtomicU32>, max_live: &AtomicU32) -> Self {
        let now = live.fetch_add(1, Ordering::SeqCst) + 1;
        max_live.fetch_max(now, Ordering::SeqCst);
        Self {
            live: Arc::clone(live),
        }
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

type PendingWait = (oneshot::Sender<Result<ExitStatus, RuntimeError>>, LiveSubscription);

#[derive(Default)]
struct RuntimeState {
    container: ContainerInfo,
    tasks: HashMap<String, TaskInfo>,
    waits: VecDeque<WaitOutcome>,
    pending: Option<PendingWait>,
    subscriptions: u32,
    reconnect_failures: u32,
    reconnects: u32,
    kill_failures: u32,
    kills: Vec<Signal>,
    exit_on: Option<Signal>,
    deletes: u32,
    start_delay: Option<Duration>,
    start_error: Option<RuntimeError>,
    next_pid: u32,
}

/// Runtime daemon double driven by scripted outcomes
pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
    started: watch::Sender<bool>,
    live: Arc<AtomicU32>,
    max_live: AtomicU32,
    journal: Journal,
}

impl FakeRuntime {
    pub fn new(journal: Journal) -> Self {
        let (started, _) = watch::channel(false);
        Self {
            state: Mutex::new(RuntimeState {
                next_pid: 4000,
                ..RuntimeState::default()
            }),
            started,
            live: Arc::new(AtomicU32::new(0)),
            max_live: AtomicU32::new(0),
            journal,
        }
    }

    pub fn with_container(self, info: ContainerInfo) -> Self {
        self.state.lock().unwrap().container = info;
        self
    }

    pub fn with_waits(self, waits: impl IntoIterator<Item = WaitOutcome>) -> Self {
        self.state.lock().unwrap().waits = waits.into_iter().collect();
        self
    }

    pub fn with_reconnect_failures(self, failures: u32) -> Self {
        self.state.lock().unwrap().reconnect_failures = failures;
        self
    }

    pub fn with_kill_failures(self, failures: u32) -> Self {
        self.state.lock().unwrap().kill_failures = failures;
        self
    }

    /// End the task when this signal is delivered, with 128 + signal
    pub fn exit_on(self, signal: Signal) -> Self {
        self.state.lock().unwrap().exit_on = Some(signal);
        self
    }

    pub fn with_start_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().start_delay = Some(delay);
        self
    }

    pub fn with_start_error(self, err: RuntimeError) -> Self {
        self.state.lock().unwrap().start_error = Some(err);
        self
    }

    pub fn with_task(self, id: &str) -> Self {
        self.state.lock().unwrap().tasks.insert(
            id.to_string(),
            TaskInfo {
                id: id.to_string(),
                pid: 999,
                status: TaskStatus::Running,
            },
        );
        self
    }

    pub fn subscriptions(&self) -> u32 {
        self.state.lock().unwrap().subscriptions
    }

    /// Most wait subscriptions that were ever outstanding at once
    pub fn max_live_subscriptions(&self) -> u32 {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn reconnects(&self) -> u32 {
        self.state.lock().unwrap().reconnects
    }

    pub fn kills(&self) -> Vec<Signal> {
        self.state.lock().unwrap().kills.clone()
    }

    pub fn deletes(&self) -> u32 {
        self.state.lock().unwrap().deletes
    }

    pub fn has_task(&self, id: &str) -> bool {
        self.state.lock().unwrap().tasks.contains_key(id)
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl RuntimeClient for FakeRuntime {
    async fn load_container(&self, id: &str) -> Result<ContainerInfo, RuntimeError> {
        let state = self.state.lock().unwrap();
        if state.container.id == id {
            Ok(state.container.clone())
        } else {
            Err(RuntimeError::not_found(format!("container {}", id)))
        }
    }

    async fn create_task(&self, id: &str) -> Result<TaskHandle, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.next_pid += 1;
        let pid = state.next_pid;
        state.tasks.insert(
            id.to_string(),
            TaskInfo {
                id: id.to_string(),
                pid,
                status: TaskStatus::Created,
            },
        );
        Ok(TaskHandle {
            id: id.to_string(),
            pid,
        })
    }

    async fn load_task(&self, id: &str) -> Result<TaskInfo, RuntimeError> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::not_found(format!("task {}", id)))
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        let (delay, error) = {
            let mut state = self.state.lock().unwrap();
            (state.start_delay, state.start_error.take())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = error {
            self.record(format!("start-failed {}", id));
            return Err(err);
        }

        if let Some(task) = self.state.lock().unwrap().tasks.get_mut(id) {
            task.status = TaskStatus::Running;
        }
        self.record(format!("started {}", id));
        self.started.send_replace(true);
        Ok(())
    }

    async fn wait(&self, _id: &str) -> Result<ExitWait, RuntimeError> {
        let (tx, wait) = ExitWait::channel();
        let live = LiveSubscription::new(&self.live, &self.max_live);
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.subscriptions += 1;
            state.waits.pop_front().unwrap_or(WaitOutcome::Pending)
        };

        let result = match outcome {
            WaitOutcome::Pending => {
                self.state.lock().unwrap().pending = Some((tx, live));
                return Ok(wait);
            }
            WaitOutcome::Exit(code) => Ok(ExitStatus::new(code)),
            WaitOutcome::Lost => Err(RuntimeError::unavailable("connection reset")),
            WaitOutcome::Fail(err) => Err(err),
        };

        let mut started = self.started.subscribe();
        tokio::spawn(async move {
            let _ = started.wait_for(|started| *started).await;
            let _ = tx.send(result);
            drop(live);
        });
        Ok(wait)
    }

    async fn kill(&self, id: &str, signal: Signal) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if state.kill_failures > 0 {
            state.kill_failures -= 1;
            return Err(RuntimeError::unavailable("connection reset"));
        }
        if !state.tasks.contains_key(id) {
            return Err(RuntimeError::not_found(format!("task {}", id)));
        }

        state.kills.push(signal);
        if state.exit_on == Some(signal) {
            if let Some((tx, _live)) = state.pending.take() {
                let _ = tx.send(Ok(ExitStatus::new(128 + signal as u32)));
            }
        }
        Ok(())
    }

    async fn delete_task(&self, id: &str, _kill: bool) -> Result<Option<ExitStatus>, RuntimeError> {
        let removed = {
            let mut state = self.state.lock().unwrap();
            state.deletes += 1;
            state.tasks.remove(id)
        };
        match removed {
            Some(_) => {
                self.record(format!("deleted {}", id));
                Ok(Some(ExitStatus::new(137)))
            }
            None => Err(RuntimeError::not_found(format!("task {}", id))),
        }
    }

    async fn reconnect(&self) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.reconnects += 1;
        if state.reconnect_failures > 0 {
            state.reconnect_failures -= 1;
            return Err(RuntimeError::unavailable("connection refused"));
        }
        Ok(())
    }
}

/// Service directory double; maintenance applies to a container's services
/// like the real agent's does
pub struct FakeDirectory {
    services: Mutex<BTreeMap<String, BTreeSet<String>>>,
    maintenance: Mutex<HashMap<String, String>>,
    journal: Journal,
}

impl FakeDirectory {
    pub fn new(journal: Journal) -> Self {
        Self {
            services: Mutex::new(BTreeMap::new()),
            maintenance: Mutex::new(HashMap::new()),
            journal,
        }
    }

    pub fn with_service(self, container: &str, name: &str) -> Self {
        self.services
            .lock()
            .unwrap()
            .entry(container.to_string())
            .or_default()
            .insert(name.to_string());
        self
    }

    pub fn services_of(&self, container: &str) -> Vec<String> {
        self.services
            .lock()
            .unwrap()
            .get(container)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Maintenance reason if the container is out of rotation
    pub fn maintenance(&self, container: &str) -> Option<String> {
        self.maintenance.lock().unwrap().get(container).cloned()
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ServiceDirectory for FakeDirectory {
    async fn register(
        &self,
        container: &str,
        name: &str,
        ip: IpAddr,
        spec: &ServiceSpec,
    ) -> Result<(), DirectoryError> {
        self.services
            .lock()
            .unwrap()
            .entry(container.to_string())
            .or_default()
            .insert(name.to_string());
        self.record(format!("register {}/{} {}:{}", container, name, ip, spec.port));
        Ok(())
    }

    async fn deregister(&self, container: &str, name: &str) -> Result<(), DirectoryError> {
        if let Some(names) = self.services.lock().unwrap().get_mut(container) {
            names.remove(name);
        }
        self.record(format!("deregister {}/{}", container, name));
        Ok(())
    }

    async fn registered(&self, container: &str) -> Result<Vec<String>, DirectoryError> {
        Ok(self.services_of(container))
    }

    async fn enable_maintenance(&self, container: &str, reason: &str) -> Result<(), DirectoryError> {
        self.maintenance
            .lock()
            .unwrap()
            .insert(container.to_string(), reason.to_string());
        self.record(format!("gate-armed {}", container));
        Ok(())
    }

    async fn disable_maintenance(&self, container: &str) -> Result<(), DirectoryError> {
        self.maintenance.lock().unwrap().remove(container);
        self.record(format!("gate-cleared {}", container));
        Ok(())
    }
}

/// Provisioner that hands every task the same address
pub struct FixedNetwork(pub Option<IpAddr>);

#[async_trait]
impl NetworkProvisioner for FixedNetwork {
    async fn create(&self, _task: &TaskHandle) -> Result<Option<IpAddr>, NetworkError> {
        Ok(self.0)
    }
}

/// Backends where "bridge" resolves to a fixed address
pub struct FakeNetworks {
    pub ip: IpAddr,
}

impl NetworkBackends for FakeNetworks {
    fn select(&self, name: &str) -> Result<Arc<dyn NetworkProvisioner>, NetworkError> {
        match name {
            "" | "none" => Ok(Arc::new(FixedNetwork(None))),
            "bridge" => Ok(Arc::new(FixedNetwork(Some(self.ip)))),
            other => Err(NetworkError::UnknownBackend(other.to_string())),
        }
    }
}

pub fn http_service(port: u16) -> ServiceSpec {
    ServiceSpec {
        port,
        tags: vec!["web".to_string()],
        check: None,
    }
}

pub fn container(id: &str, network: &str, services: &[(&str, u16)]) -> ContainerInfo {
    ContainerInfo {
        id: id.to_string(),
        image: "registry.local/web:1".to_string(),
        config: ContainerConfig {
            network: network.to_string(),
            services: services
                .iter()
                .map(|(name, port)| (name.to_string(), http_service(*port)))
                .collect(),
        },
    }
}

/// Hook context over the fakes, with resolv.conf going to a scratch dir
pub fn context(runtime: Arc<FakeRuntime>, directory: Arc<FakeDirectory>, ip: IpAddr) -> HookContext {
    let mut config = Config::default();
    config.supervisor = fast_supervisor();
    config.network.root = unique_test_dir();
    config.network.nameservers = vec!["10.0.0.2".to_string()];

    HookContext {
        config,
        runtime,
        directory,
        networks: Arc::new(FakeNetworks { ip }),
    }
}
