use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::info;

use super::descriptor::ChronosJob;
use crate::{Error, Result};

/// Job-definition side of the batch scheduler.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Register a job. Chronos answers `204 No Content` on success.
    async fn submit(&self, job: &ChronosJob) -> Result<()>;

    /// Remove a job definition once its run has concluded.
    ///
    /// A missing job is an error: the job we launched should still exist.
    async fn delete(&self, name: &str) -> Result<()>;
}

pub struct ChronosClient {
    client: Client,
    host: String,
    timeout: Duration,
}

impl ChronosClient {
    pub fn new(host: &str) -> Self {
        Self {
            client: Client::new(),
            host: host.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    fn submit_url(&self) -> String {
        format!("{}/service/chronos/v1/scheduler/iso8601", self.host)
    }

    fn job_url(&self, name: &str) -> String {
        format!("{}/service/chronos/v1/scheduler/job/{}", self.host, name)
    }
}

async fn body_or_status(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => body,
        _ => status.to_string(),
    }
}

#[async_trait]
impl JobScheduler for ChronosClient {
    async fn submit(&self, job: &ChronosJob) -> Result<()> {
        let response = self
            .client
            .post(self.submit_url())
            .json(job)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Submission(e.to_string()))?;

        if response.status() != StatusCode::NO_CONTENT {
            return Err(Error::Submission(body_or_status(response).await));
        }

        info!("Submitted Chronos job {}", job.name);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.job_url(name))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Cleanup(e.to_string()))?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                info!("Deleted Chronos job {}", name);
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(Error::CleanupNotFound(name.to_string())),
            _ => Err(Error::Cleanup(body_or_status(response).await)),
        }
    }
}
