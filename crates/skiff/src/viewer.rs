//! Opening a task's sandbox in the Mesos web UI.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use url::form_urlencoded;

use crate::mesos::RemoteTask;
use crate::{Error, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogViewer: Send + Sync {
    async fn open_sandbox(&self, task: &RemoteTask, directory: &str) -> Result<()>;
}

/// Opens the sandbox browser page with the desktop's URL handler.
pub struct BrowserViewer {
    mesos_host: String,
    opener: String,
}

impl BrowserViewer {
    pub fn new(mesos_host: &str) -> Self {
        let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
        Self {
            mesos_host: mesos_host.trim_end_matches('/').to_string(),
            opener: opener.to_string(),
        }
    }

    pub fn with_opener(mut self, opener: &str) -> Self {
        self.opener = opener.to_string();
        self
    }

    pub fn sandbox_url(&self, task: &RemoteTask, directory: &str) -> Result<String> {
        let agent = agent_id(task, directory).ok_or_else(|| {
            Error::LogUnavailable(format!("could not determine agent for task {}", task.id))
        })?;
        let path: String = form_urlencoded::byte_serialize(directory.as_bytes()).collect();
        Ok(format!("{}/mesos/#/agents/{}/browse?path={}", self.mesos_host, agent, path))
    }
}

/// Agent id from the task, or from the `.../slaves/<id>/...` sandbox path.
fn agent_id<'a>(task: &'a RemoteTask, directory: &'a str) -> Option<&'a str> {
    if !task.slave_id.is_empty() {
        return Some(task.slave_id.as_str());
    }
    directory
        .split("/slaves/")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .filter(|id| !id.is_empty())
}

#[async_trait]
impl LogViewer for BrowserViewer {
    async fn open_sandbox(&self, task: &RemoteTask, directory: &str) -> Result<()> {
        let url = self.sandbox_url(task, directory)?;
        debug!("Opening {} with {}", url, self.opener);

        let status = Command::new(&self.opener).arg(&url).status().await?;
        if !status.success() {
            return Err(Error::LogUnavailable(format!(
                "could not open link to task logs ({} exited with {})",
                self.opener, status
            )));
        }
        Ok(())
    }
}
