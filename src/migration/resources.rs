//! Read-only access to Secrets and ConfigMaps of one namespace
//!
//! Follows the trait-based pattern used for other cluster collaborators:
//! - `NamespacedResources` trait for abstraction
//! - `KubeResources` fetches from the API server on every call
//! - `FakeResources` serves in-memory objects for testing

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{Api, Client};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),
}

/// Fetches Secrets and ConfigMaps from a fixed namespace
#[async_trait]
pub trait NamespacedResources: Send + Sync {
    /// Namespace the resources are fetched from
    fn namespace(&self) -> &str;

    async fn get_secret(&self, name: &str) -> Result<Secret, ResourceError>;

    async fn get_config_map(&self, name: &str) -> Result<ConfigMap, ResourceError>;
}

/// Fetches resources from the API server, without caching
pub struct KubeResources {
    namespace: String,
    secrets: Api<Secret>,
    config_maps: Api<ConfigMap>,
}

impl KubeResources {
    pub fn new(client: Client, namespace: &str) -> Self {
        KubeResources {
            namespace: namespace.to_string(),
            secrets: Api::namespaced(client.clone(), namespace),
            config_maps: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl NamespacedResources for KubeResources {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_secret(&self, name: &str) -> Result<Secret, ResourceError> {
        self.secrets
            .get_opt(name)
            .await?
            .ok_or_else(|| ResourceError::NotFound {
                kind: "Secret",
                namespace: self.namespace.clone(),
                name: name.to_string(),
            })
    }

    async fn get_config_map(&self, name: &str) -> Result<ConfigMap, ResourceError> {
        self.config_maps
            .get_opt(name)
            .await?
            .ok_or_else(|| ResourceError::NotFound {
                kind: "ConfigMap",
                namespace: self.namespace.clone(),
                name: name.to_string(),
            })
    }
}

/// In-memory resources for testing
///
/// Counts fetches so tests can assert that nothing is cached.
#[cfg(test)]
pub struct FakeResources {
    namespace: String,
    secrets: std::collections::BTreeMap<String, Secret>,
    config_maps: std::collections::BTreeMap<String, ConfigMap>,
    fetches: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FakeResources {
    pub fn new(namespace: &str) -> Self {
        FakeResources {
            namespace: namespace.to_string(),
            secrets: Default::default(),
            config_maps: Default::default(),
            fetches: Default::default(),
        }
    }

    pub fn with_secret(mut self, name: &str, data: &[(&str, &str)]) -> Self {
        let secret = Secret {
            metadata: kube::api::ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(key, value)| {
                        (key.to_string(), k8s_openapi::ByteString(value.as_bytes().to_vec()))
                    })
                    .collect(),
            ),
            ..Default::default()
        };
        self.secrets.insert(name.to_string(), secret);
        self
    }

    pub fn with_config_map(mut self, name: &str, data: &[(&str, &str)]) -> Self {
        let config_map = ConfigMap {
            metadata: kube::api::ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect(),
            ),
            ..Default::default()
        };
        self.config_maps.insert(name.to_string(), config_map);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn not_found(&self, kind: &'static str, name: &str) -> ResourceError {
        ResourceError::NotFound {
            kind,
            namespace: self.namespace.clone(),
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl NamespacedResources for FakeResources {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_secret(&self, name: &str) -> Result<Secret, ResourceError> {
        self.fetches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found("Secret", name))
    }

    async fn get_config_map(&self, name: &str) -> Result<ConfigMap, ResourceError> {
        self.fetches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.config_maps
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found("ConfigMap", name))
    }
}
