//! ctrhook configuration
//!
//! Loaded once per hook invocation and handed to the components that need
//! it. Example:
//!
//! ```text
//! [Runtime]
//! Socket=/run/ctrhook/runtime.sock
//! Namespace=ctrhook
//!
//! [Supervisor]
//! ReconnectAttempts=20
//! ReconnectInterval=100ms
//!
//! [Network]
//! Root=/var/lib/ctrhook
//! Nameservers=10.0.0.2 10.0.0.3
//! Interface=eth0
//!
//! [Consul]
//! Address=http://127.0.0.1:8500
//! ```

mod parser;

pub use parser::{parse_file, ParseError, ParsedFile};

use std::path::{Path, PathBuf};
use std::time::Duration;

use parser::{all_values, last_value, parse_config_file, ParsedSection};

/// System-wide config file
pub const CONFIG_PATH: &str = "/etc/ctrhook/ctrhook.conf";

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Unix socket of the runtime daemon
    pub socket: String,
    pub namespace: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            socket: crate::protocol::SOCKET_PATH.to_string(),
            namespace: crate::protocol::DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// Retry bounds of the task supervisor
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    pub reconnect_attempts: u32,
    pub reconnect_interval: Duration,
    /// Total send attempts per relayed signal
    pub signal_attempts: u32,
    /// Capacity of the pending signal queue
    pub signal_queue: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 20,
            reconnect_interval: Duration::from_millis(100),
            signal_attempts: 5,
            signal_queue: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// State directory; resolv.conf for containers is written here
    pub root: PathBuf,
    pub nameservers: Vec<String>,
    /// Host interface used by the "host" network backend
    pub interface: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/ctrhook"),
            nameservers: Vec::new(),
            interface: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsulConfig {
    pub address: String,
    pub token: Option<String>,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8500".to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub supervisor: SupervisorConfig,
    pub network: NetworkConfig,
    pub consul: ConsulConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Invalid(#[from] ParseError),
}

impl Config {
    /// Build a config from parsed INI sections, defaults for anything unset
    pub fn from_parsed(parsed: &ParsedFile) -> Result<Self, ParseError> {
        let mut config = Config::default();

        if let Some(runtime) = parsed.get("[Runtime]") {
            if let Some(v) = last_value(runtime, "SOCKET") {
                config.runtime.socket = v.to_string();
            }
            if let Some(v) = last_value(runtime, "NAMESPACE") {
                config.runtime.namespace = v.to_string();
            }
        }

        if let Some(sup) = parsed.get("[Supervisor]") {
            if let Some(n) = parse_number(sup, "RECONNECTATTEMPTS")? {
                config.supervisor.reconnect_attempts = n;
            }
            if let Some(v) = last_value(sup, "RECONNECTINTERVAL") {
                config.supervisor.reconnect_interval = parse_duration(v)
                    .ok_or_else(|| ParseError::InvalidValue("ReconnectInterval".into(), v.into()))?;
            }
            if let Some(n) = parse_number(sup, "SIGNALATTEMPTS")? {
                config.supervisor.signal_attempts = n;
            }
            if let Some(n) = parse_number::<usize>(sup, "SIGNALQUEUE")? {
                if n == 0 {
                    return Err(ParseError::InvalidValue("SignalQueue".into(), "0".into()));
                }
                config.supervisor.signal_queue = n;
            }
        }

        if let Some(net) = parsed.get("[Network]") {
            if let Some(v) = last_value(net, "ROOT") {
                config.network.root = PathBuf::from(v);
            }
            config.network.nameservers = all_values(net, "NAMESERVERS");
            config.network.interface = last_value(net, "INTERFACE").map(str::to_string);
        }

        if let Some(consul) = parsed.get("[Consul]") {
            if let Some(v) = last_value(consul, "ADDRESS") {
                config.consul.address = v.trim_end_matches('/').to_string();
            }
            config.consul.token = last_value(consul, "TOKEN").map(str::to_string);
        }

        Ok(config)
    }

    /// Load from an explicit path. A missing file is an error here.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let parsed = parse_config_file(path)
            .await
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_parsed(&parsed)?)
    }

    /// Load from the first config file found, or defaults if there is none
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path).await;
        }

        for path in search_paths() {
            if path.exists() {
                log::debug!("Loading config from {}", path.display());
                return Self::load_from_path(&path).await;
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_PATH)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("ctrhook/ctrhook.conf"));
    }
    paths
}

fn parse_number<T: std::str::FromStr>(
    section: &ParsedSection,
    key: &str,
) -> Result<Option<T>, ParseError> {
    match last_value(section, key) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ParseError::InvalidValue(key.to_string(), v.to_string())),
        None => Ok(None),
    }
}

/// Parse a duration ("100ms", "2s", "1min"); a bare number is seconds
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();

    if let Some(n) = s.strip_suffix("ms") {
        n.trim().parse().ok().map(Duration::from_millis)
    } else if let Some(n) = s.strip_suffix("min") {
        n.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(n) = s.strip_suffix('s') {
        n.trim().parse().ok().map(Duration::from_secs)
    } else {
        s.parse().ok().map(Duration::from_secs)
    }
}
