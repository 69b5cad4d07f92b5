use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::{
    api::{Api, ListParams},
    Client,
};
use tracing::debug;

use super::TagResolver;
use crate::{Error, Result};

/// Reads the tag from the image of a running Deployment or StatefulSet.
pub struct KubeTagResolver {
    client: Client,
    namespace: String,
}

impl KubeTagResolver {
    pub async fn new(namespace: &str) -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| Error::Kubernetes(e.to_string()))?;

        Ok(Self {
            client,
            namespace: namespace.to_string(),
        })
    }
}

/// Tag of the first container image in a template labelled `group=<app>-<env>`.
///
/// Images without exactly one `:` (untagged, or with a registry port) are skipped.
pub fn find_tag(app: &str, env: &str, template: &PodTemplateSpec) -> Option<String> {
    let group = format!("{}-{}", app, env);
    let labelled = template
        .metadata
        .as_ref()
        .and_then(|meta| meta.labels.as_ref())
        .and_then(|labels| labels.get("group"))
        .map_or(false, |g| *g == group);
    if !labelled {
        return None;
    }

    template
        .spec
        .as_ref()?
        .containers
        .iter()
        .filter_map(|container| container.image.as_deref())
        .find_map(|image| {
            let parts: Vec<&str> = image.split(':').collect();
            match parts.as_slice() {
                [_, tag] => Some(tag.to_string()),
                _ => None,
            }
        })
}

#[async_trait]
impl TagResolver for KubeTagResolver {
    async fn current_tag(&self, app: &str, env: &str) -> Result<String> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = deployments
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::Kubernetes(e.to_string()))?;
        for item in &list.items {
            if let Some(tag) = item.spec.as_ref().and_then(|s| find_tag(app, env, &s.template)) {
                debug!("Found tag {} on deployment", tag);
                return Ok(tag);
            }
        }

        let stateful_sets: Api<StatefulSet> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = stateful_sets
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::Kubernetes(e.to_string()))?;
        for item in &list.items {
            if let Some(tag) = item.spec.as_ref().and_then(|s| find_tag(app, env, &s.template)) {
                debug!("Found tag {} on stateful set", tag);
                return Ok(tag);
            }
        }

        Err(Error::TagLookup(format!("could not find tag for {}-{}", app, env)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn template(group: &str, images: &[&str]) -> PodTemplateSpec {
        let mut labels = BTreeMap::new();
        labels.insert("group".to_string(), group.to_string());
        PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                containers: images
                    .iter()
                    .map(|image| Container {
                        name: "app".to_string(),
                        image: Some(image.to_string()),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_find_tag_matches_group() {
        let t = template("dogfood-stage", &["registry.internal/dogfood:v1.2.3"]);
        assert_eq!(find_tag("dogfood", "stage", &t), Some("v1.2.3".to_string()));
        assert_eq!(find_tag("dogfood", "prod", &t), None);
    }

    #[test]
    fn test_find_tag_skips_ambiguous_images() {
        let t = template(
            "dogfood-stage",
            &["registry.internal:5000/dogfood:v1", "sidecar", "registry.internal/dogfood:v2"],
        );
        assert_eq!(find_tag("dogfood", "stage", &t), Some("v2".to_string()));
    }
}
