//! Lookup of the image tag currently deployed for an app.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::{Config, DeployBackend};
use crate::Result;

pub mod consul;
pub mod kubernetes;

pub use consul::ConsulTagResolver;
pub use kubernetes::KubeTagResolver;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagResolver: Send + Sync {
    async fn current_tag(&self, app: &str, env: &str) -> Result<String>;
}

/// Build the resolver selected by `deploy_backend`.
pub async fn resolver_for(config: &Config) -> Result<Arc<dyn TagResolver>> {
    debug!("Using {:?} deploy backend", config.deploy_backend);
    match config.deploy_backend {
        DeployBackend::Consul => Ok(Arc::new(ConsulTagResolver::new(
            &config.consul.host,
            config.consul.token.clone(),
        ))),
        DeployBackend::Kubernetes => Ok(Arc::new(KubeTagResolver::new(&config.kubernetes.namespace).await?)),
    }
}
