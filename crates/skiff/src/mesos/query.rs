use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::task::TaskSet;
use crate::{Error, Result};

/// Page size used by the Mesos master task listing.
pub const PAGE_SIZE: usize = 100;

/// Source of the tasks currently known to the scheduler for a job name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn matching(&self, name: &str) -> Result<TaskSet>;
}

/// Paginated reader for the Mesos master `/tasks` endpoint.
pub struct TaskQuery {
    client: Client,
    url: String,
    page_size: usize,
    timeout: Duration,
}

impl TaskQuery {
    pub fn new(mesos_host: &str) -> Self {
        Self::with_url(format!("{}/mesos/tasks", mesos_host.trim_end_matches('/')))
    }

    pub fn with_url(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
            page_size: PAGE_SIZE,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fetch every task, following `offset` until a short page comes back.
    pub async fn list(&self) -> Result<TaskSet> {
        let mut all = TaskSet::default();
        let mut offset = 0;

        loop {
            let page = self.fetch_page(offset).await?;
            let fetched = page.len();
            debug!("Fetched {} tasks at offset {}", fetched, offset);
            all.tasks.extend(page.tasks);

            if fetched < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        Ok(all)
    }

    async fn fetch_page(&self, offset: usize) -> Result<TaskSet> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("offset", offset)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Query(format!("{} returned {}", self.url, response.status())));
        }

        response
            .json::<TaskSet>()
            .await
            .map_err(|e| Error::Query(format!("malformed task listing: {}", e)))
    }
}

#[async_trait]
impl TaskSource for TaskQuery {
    async fn matching(&self, name: &str) -> Result<TaskSet> {
        Ok(self.list().await?.filter_by_name(name))
    }
}
