use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::TagResolver;
use crate::{Error, Result};

/// Reads `deploys/<app>/<env>/current` from the Consul KV store.
pub struct ConsulTagResolver {
    client: Client,
    host: String,
    token: Option<String>,
    timeout: Duration,
}

impl ConsulTagResolver {
    pub fn new(host: &str, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            host: host.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn key_url(&self, app: &str, env: &str) -> String {
        let mut url = format!("{}/v1/kv/deploys/{}/{}/current?raw", self.host, app, env);
        if let Some(token) = &self.token {
            url.push_str("&token=");
            url.push_str(token);
        }
        url
    }
}

#[async_trait]
impl TagResolver for ConsulTagResolver {
    async fn current_tag(&self, app: &str, env: &str) -> Result<String> {
        let url = self.key_url(app, env);
        debug!("Fetching current tag for {}-{}", app, env);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::TagLookup(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await.map_err(|e| Error::TagLookup(e.to_string()))?;
                let tag = body.trim();
                if tag.is_empty() {
                    return Err(Error::TagLookup(format!("no tag recorded for {}-{}", app, env)));
                }
                Ok(tag.to_string())
            }
            StatusCode::NOT_FOUND => Err(Error::TagLookup(format!(
                "no deploy found for {}-{}, or the token cannot read it",
                app, env
            ))),
            status => Err(Error::TagLookup(format!("consul responded {}", status))),
        }
    }
}
