use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

const DEFAULT_CONFIG_FILE: &str = ".skiff.yml";

/// Where the currently deployed image tag of an app is looked up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeployBackend {
    #[serde(rename = "consul")]
    Consul,
    #[serde(rename = "kubernetes")]
    Kubernetes,
}

impl Default for DeployBackend {
    fn default() -> Self {
        DeployBackend::Consul
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chronos: ChronosConfig,
    pub mesos: MesosConfig,
    pub consul: ConsulConfig,
    pub docker: DockerConfig,
    pub kubernetes: KubeConfig,
    pub deploy_backend: DeployBackend,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChronosConfig {
    pub host: String,
    pub owner: String,
}

impl Default for ChronosConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            owner: "ops@localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MesosConfig {
    /// Base URL of the Mesos master (task listing and sandbox UI).
    pub host: String,
    pub agent_port: u16,
}

impl Default for MesosConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            agent_port: 5051,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsulConfig {
    pub host: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub repo_prefix: String,
    /// Packaged configuration bundle fetched into every task sandbox.
    pub config_bundle_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeConfig {
    pub namespace: String,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub poll_interval_ms: u64,
    pub sandbox_retry_ms: u64,
    /// Unset means the sandbox lookup waits for as long as it takes.
    pub sandbox_timeout_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            sandbox_retry_ms: 200,
            sandbox_timeout_secs: None,
        }
    }
}

impl RunConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sandbox_retry(&self) -> Duration {
        Duration::from_millis(self.sandbox_retry_ms)
    }

    pub fn sandbox_timeout(&self) -> Option<Duration> {
        self.sandbox_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from `.env`, the YAML config file and the process
    /// environment, in increasing order of precedence.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Config::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("could not read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Override file values with whatever `lookup` yields for the known keys.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CHRONOS_HOST") {
            self.chronos.host = v;
        }
        if let Some(v) = get("TASK_OWNER") {
            self.chronos.owner = v;
        }
        if let Some(v) = get("MARATHON_HOST") {
            self.mesos.host = v;
        }
        if let Some(port) = get("MESOS_AGENT_PORT").and_then(|v| v.parse().ok()) {
            self.mesos.agent_port = port;
        }
        if let Some(v) = get("CONSUL_HOST") {
            self.consul.host = v;
        }
        if let Some(v) = get("CONSUL_TOKEN") {
            self.consul.token = Some(v);
        }
        if let Some(v) = get("DOCKER_REPO_PREFIX") {
            self.docker.repo_prefix = v;
        }
        if let Some(v) = get("CONFIG_BUNDLE_URL") {
            self.docker.config_bundle_url = v;
        }
        if let Some(v) = get("KUBERNETES_NAMESPACE") {
            self.kubernetes.namespace = v;
        }
        if let Some(v) = get("DEPLOY_BACKEND") {
            self.deploy_backend = match v.to_lowercase().as_str() {
                "kubernetes" => DeployBackend::Kubernetes,
                _ => DeployBackend::Consul,
            };
        }
        if let Some(ms) = get("POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.run.poll_interval_ms = ms;
        }
        if let Some(secs) = get("SANDBOX_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.run.sandbox_timeout_secs = Some(secs);
        }
    }

    /// Check everything the `run` command needs before it touches the network.
    pub fn validate_for_run(&self) -> Result<()> {
        let required = [
            ("chronos.host", &self.chronos.host),
            ("mesos.host", &self.mesos.host),
            ("docker.repo_prefix", &self.docker.repo_prefix),
            ("docker.config_bundle_url", &self.docker.config_bundle_url),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must be set", key)));
            }
        }

        match self.deploy_backend {
            DeployBackend::Consul => {
                if self.consul.host.trim().is_empty() {
                    return Err(Error::Config(
                        "consul.host must be set when using the consul backend".to_string(),
                    ));
                }
            }
            DeployBackend::Kubernetes => {
                if self.kubernetes.namespace.trim().is_empty() {
                    return Err(Error::Config(
                        "kubernetes.namespace must be set when using the kubernetes backend"
                            .to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(DEFAULT_CONFIG_FILE))
}
