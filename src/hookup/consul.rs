//! Consul agent as the service directory
//!
//! Services are registered as `<container>-<name>` with `Meta.container`
//! naming their container, which is how maintenance toggles find them from
//! a later hook invocation.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::directory::{DirectoryError, ServiceDirectory};
use crate::config::ConsulConfig;
use crate::runtime::{CheckType, ServiceSpec};

const CONTAINER_META: &str = "container";
const TOKEN_HEADER: &str = "X-Consul-Token";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceRegistration {
    #[serde(rename = "ID")]
    id: String,
    name: String,
    tags: Vec<String>,
    port: u16,
    address: String,
    meta: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    check: Option<ServiceCheck>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceCheck {
    #[serde(rename = "HTTP", skip_serializing_if = "Option::is_none")]
    http: Option<String>,
    #[serde(rename = "TCP", skip_serializing_if = "Option::is_none")]
    tcp: Option<String>,
    interval: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentService {
    service: String,
    #[serde(default)]
    meta: Option<HashMap<String, String>>,
}

pub fn service_id(container: &str, name: &str) -> String {
    format!("{}-{}", container, name)
}

fn socket_addr(ip: IpAddr, port: u16) -> String {
    match ip {
        IpAddr::V4(v4) => format!("{}:{}", v4, port),
        IpAddr::V6(v6) => format!("[{}]:{}", v6, port),
    }
}

fn registration(container: &str, name: &str, ip: IpAddr, spec: &ServiceSpec) -> ServiceRegistration {
    let check = spec.check.as_ref().map(|check| {
        let target = socket_addr(ip, spec.port);
        let (http, tcp) = match &check.check_type {
            CheckType::Http { path } => (Some(format!("http://{}{}", target, path)), None),
            CheckType::Tcp => (None, Some(target)),
        };
        ServiceCheck {
            http,
            tcp,
            interval: format!("{}s", check.interval_secs.max(1)),
        }
    });

    ServiceRegistration {
        id: service_id(container, name),
        name: name.to_string(),
        tags: spec.tags.clone(),
        port: spec.port,
        address: ip.to_string(),
        meta: BTreeMap::from([(CONTAINER_META.to_string(), container.to_string())]),
        check,
    }
}

pub struct ConsulDirectory {
    client: reqwest::Client,
    address: String,
    token: Option<String>,
}

impl ConsulDirectory {
    pub fn new(config: &ConsulConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            address: config.address.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.address, path));
        match &self.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, DirectoryError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn set_maintenance(
        &self,
        container: &str,
        enable: bool,
        reason: &str,
    ) -> Result<(), DirectoryError> {
        let enable = if enable { "true" } else { "false" };
        let mut first_error = None;
        // Every service is toggled even after a failure; the first error wins
        for name in self.registered(container).await? {
            let path = format!("/v1/agent/service/maintenance/{}", service_id(container, &name));
            let builder = self
                .request(reqwest::Method::PUT, &path)
                .query(&[("enable", enable), ("reason", reason)]);
            if let Err(e) = self.send(builder).await {
                log::warn!("Maintenance toggle for {}/{} failed: {}", container, name, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ServiceDirectory for ConsulDirectory {
    async fn register(
        &self,
        container: &str,
        name: &str,
        ip: IpAddr,
        spec: &ServiceSpec,
    ) -> Result<(), DirectoryError> {
        let body = registration(container, name, ip, spec);
        let builder = self
            .request(reqwest::Method::PUT, "/v1/agent/service/register")
            .json(&body);
        self.send(builder).await?;
        Ok(())
    }

    async fn deregister(&self, container: &str, name: &str) -> Result<(), DirectoryError> {
        let path = format!("/v1/agent/service/deregister/{}", service_id(container, name));
        self.send(self.request(reqwest::Method::PUT, &path)).await?;
        Ok(())
    }

    async fn registered(&self, container: &str) -> Result<Vec<String>, DirectoryError> {
        let response = self
            .send(self.request(reqwest::Method::GET, "/v1/agent/services"))
            .await?;
        let services: HashMap<String, AgentService> = response.json().await?;

        let mut names: Vec<String> = services
            .into_values()
            .filter(|svc| {
                svc.meta
                    .as_ref()
                    .and_then(|m| m.get(CONTAINER_META))
                    .is_some_and(|c| c == container)
            })
            .map(|svc| svc.service)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn enable_maintenance(&self, container: &str, reason: &str) -> Result<(), DirectoryError> {
        self.set_maintenance(container, true, reason).await
    }

    async fn disable_maintenance(&self, container: &str) -> Result<(), DirectoryError> {
        self.set_maintenance(container, false, "").await
    }
}
