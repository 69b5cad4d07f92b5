//! Mesos agent access: sandbox lookup and raw log reads.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::task::{RemoteTask, TaskState};
use crate::{Error, Result};

/// Framework name one-off tasks are launched under.
pub const TASK_FRAMEWORK: &str = "chronos";

lazy_static! {
    static ref NOISE: Regex = Regex::new(r"(cpp:|sandbox_directory)").expect("valid noise pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    /// Successful tasks are judged by their stdout, everything else by stderr.
    pub fn for_state(state: &TaskState) -> Self {
        match state {
            TaskState::Finished => LogStream::Stdout,
            _ => LogStream::Stderr,
        }
    }
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogStream::Stdout => write!(f, "stdout"),
            LogStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Read access to the sandbox of a task on its execution host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SandboxReader: Send + Sync {
    async fn sandbox_directory(&self, task: &RemoteTask) -> Result<String>;

    async fn read_logs(&self, task: &RemoteTask, directory: &str, stream: LogStream) -> Result<String>;
}

#[derive(Debug, Default, Deserialize)]
struct AgentState {
    #[serde(default)]
    frameworks: Vec<Framework>,
    #[serde(default)]
    completed_frameworks: Vec<Framework>,
}

#[derive(Debug, Deserialize)]
struct Framework {
    #[serde(default)]
    name: String,
    #[serde(default)]
    executors: Vec<Executor>,
    #[serde(default)]
    completed_executors: Vec<Executor>,
}

#[derive(Debug, Deserialize)]
struct Executor {
    id: String,
    directory: String,
}

#[derive(Debug, Deserialize)]
struct FileChunk {
    #[serde(default)]
    data: String,
}

impl AgentState {
    fn sandbox_for(&self, task_id: &str) -> Option<&str> {
        let completed = self
            .completed_frameworks
            .iter()
            .filter(|f| f.name == TASK_FRAMEWORK)
            .flat_map(|f| f.completed_executors.iter());
        let active = self
            .frameworks
            .iter()
            .filter(|f| f.name == TASK_FRAMEWORK)
            .flat_map(|f| f.executors.iter());

        completed
            .chain(active)
            .find(|e| e.id == task_id)
            .map(|e| e.directory.as_str())
    }
}

/// Drop agent bookkeeping lines from raw sandbox output.
pub fn filter_noise(data: &str) -> String {
    data.lines()
        .filter(|line| !NOISE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct AgentClient {
    client: Client,
    port: u16,
    retry_delay: Duration,
    sandbox_timeout: Option<Duration>,
    timeout: Duration,
}

impl AgentClient {
    pub fn new(port: u16) -> Self {
        Self {
            client: Client::new(),
            port,
            retry_delay: Duration::from_millis(200),
            sandbox_timeout: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Give up on the sandbox lookup after `timeout`. `None` waits forever.
    pub fn with_sandbox_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.sandbox_timeout = timeout;
        self
    }

    fn agent_url(&self, host: &str) -> String {
        if host.contains("://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }

    async fn fetch_state(&self, base: &str) -> Result<AgentState> {
        let url = format!("{}/state", base);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::LogUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::LogUnavailable(format!(
                "failed to fetch agent state: {}",
                response.status()
            )));
        }

        response
            .json::<AgentState>()
            .await
            .map_err(|e| Error::LogUnavailable(format!("malformed agent state: {}", e)))
    }
}

#[async_trait]
impl SandboxReader for AgentClient {
    /// Poll the agent until it reports an executor for the task.
    ///
    /// The agent may not know about the sandbox yet when the master already
    /// lists the task, so a miss is retried after a short delay.
    async fn sandbox_directory(&self, task: &RemoteTask) -> Result<String> {
        let base = self.agent_url(&task.host_ip()?);
        let started = Instant::now();

        loop {
            tokio::time::sleep(self.retry_delay).await;

            let state = self.fetch_state(&base).await?;
            if let Some(directory) = state.sandbox_for(&task.id) {
                return Ok(directory.to_string());
            }
            debug!("Sandbox for {} not reported by {} yet", task.id, base);

            if let Some(limit) = self.sandbox_timeout {
                if started.elapsed() >= limit {
                    return Err(Error::LogUnavailable(format!(
                        "agent {} did not report a sandbox for {} within {:?}",
                        base, task.id, limit
                    )));
                }
            }
        }
    }

    async fn read_logs(&self, task: &RemoteTask, directory: &str, stream: LogStream) -> Result<String> {
        let base = self.agent_url(&task.host_ip()?);
        let path = format!("{}/{}", directory, stream);

        let response = self
            .client
            .get(format!("{}/files/read", base))
            .query(&[("path", path.as_str()), ("offset", "0")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::LogUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::LogUnavailable(format!(
                "could not fetch logs: {}",
                response.status()
            )));
        }

        let chunk = response
            .json::<FileChunk>()
            .await
            .map_err(|e| Error::LogUnavailable(format!("malformed log response: {}", e)))?;

        Ok(filter_noise(&chunk.data))
    }
}
