//! Assembly of an `ImageRegistry` spec from a legacy registry DeploymentConfig
//!
//! The registry container is validated, its configuration file is located
//! and parsed the way the registry itself would, and the result is
//! translated piece by piece. Anything that cannot be expressed in the
//! declarative spec fails the migration.

use super::config::{
    ConfigError, ConfigParser, EnvironmentOverlay, RequestLimitsSection, CONFIGURATION_PATH_ENV,
    DEFAULT_REGISTRY_ENV, ENV_PREFIX,
};
use super::duration::format_go_duration;
use super::pod_file::{ContainerFiles, PodFileError, PodFileGetter};
use super::resources::NamespacedResources;
use super::storage::{build_storage, StorageError};
use super::tls::{migrate_tls, TlsMigrationError};
use crate::crd::legacy::DeploymentConfig;
use crate::crd::registry::{
    ImageRegistrySpec, ManagementState, ProxyConfig, RequestLimits, RequestsConfig,
    VERSION_NONE,
};
use k8s_openapi::api::core::v1::{Container, Secret};
use kube::ResourceExt;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Name the registry container must have
pub const REGISTRY_CONTAINER_NAME: &str = "registry";

/// Configuration file read when `REGISTRY_CONFIGURATION_PATH` is unset
pub const DEFAULT_CONFIGURATION_PATH: &str = "/config.yml";

/// Server address the configuration parser requires
pub const SERVER_ADDR_ENV: &str = "REGISTRY_OPENSHIFT_SERVER_ADDR";

/// Stand-in server address; never ends up in the migrated spec
pub const SERVER_ADDR_PLACEHOLDER: &str = "image-registry.invalid:5000";

/// Configuration baked into the registry image, used when no file is mounted
pub const DEFAULT_CONFIGURATION: &str = r#"version: 0.1
log:
  level: debug
http:
  addr: :5000
storage:
  cache:
    blobdescriptor: inmemory
  filesystem:
    rootdirectory: /registry
  delete:
    enabled: true
"#;

/// Variables the operator sets itself; legacy values must agree
const HARDCODED_ENV: [(&str, &str); 2] = [("REGISTRY_HTTP_ADDR", ":5000"), ("REGISTRY_HTTP_NET", "tcp")];

/// Variables outside the `REGISTRY_` prefix that may be carried over
const ALLOWED_ENV_NAMES: [&str; 2] = [DEFAULT_REGISTRY_ENV, "DOCKER_REGISTRY_URL"];

#[derive(Debug, Error)]
#[error("unable to migrate DeploymentConfig {namespace}/{name}: {source}")]
pub struct MigrationError {
    pub namespace: String,
    pub name: String,
    #[source]
    pub source: MigrateErrorKind,
}

#[derive(Debug, Error)]
pub enum MigrateErrorKind {
    #[error("DeploymentConfig has no pod template")]
    MissingTemplate,

    #[error("expected exactly one container, found {0}")]
    ContainerCount(usize),

    #[error("expected container named \"registry\", found {0:?}")]
    ContainerName(String),

    #[error("environment variable {0} uses valueFrom, which is not supported")]
    EnvValueFrom(String),

    #[error("environment variable {name} must be {expected:?}, got {actual:?}")]
    EnvMismatch {
        name: String,
        expected: &'static str,
        actual: String,
    },

    #[error("unsupported environment variable {0}")]
    UnsupportedEnv(String),

    #[error("unable to read registry configuration {path}: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: PodFileError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Tls(#[from] TlsMigrationError),
}

/// Outcome of a migration
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub spec: ImageRegistrySpec,

    /// `kubernetes.io/tls` Secret to create when TLS was enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_secret: Option<Secret>,
}

fn is_allowed_env(name: &str) -> bool {
    name.starts_with(ENV_PREFIX) || ALLOWED_ENV_NAMES.contains(&name)
}

/// Split the container environment into parser input and the configuration path
fn collect_environment(
    container: &Container,
) -> Result<(EnvironmentOverlay, Option<String>), MigrateErrorKind> {
    let mut env = EnvironmentOverlay::new();
    let mut config_path = None;

    for var in container.env.iter().flatten() {
        if var.value_from.is_some() {
            return Err(MigrateErrorKind::EnvValueFrom(var.name.clone()));
        }
        let value = var.value.clone().unwrap_or_default();

        if let Some((_, expected)) = HARDCODED_ENV.iter().find(|(name, _)| *name == var.name) {
            if value != *expected {
                return Err(MigrateErrorKind::EnvMismatch {
                    name: var.name.clone(),
                    expected: *expected,
                    actual: value,
                });
            }
            env.set(var.name.as_str(), value);
            continue;
        }

        if var.name == CONFIGURATION_PATH_ENV {
            config_path = Some(value);
            continue;
        }

        if !is_allowed_env(&var.name) {
            return Err(MigrateErrorKind::UnsupportedEnv(var.name.clone()));
        }
        env.set(var.name.as_str(), value);
    }

    Ok((env, config_path))
}

fn request_limits(limits: &RequestLimitsSection) -> RequestLimits {
    RequestLimits {
        max_running: limits.max_running,
        max_in_queue: limits.max_in_queue,
        max_wait_in_queue: format_go_duration(limits.max_wait_in_queue),
    }
}

/// Build the `ImageRegistry` spec equivalent to a legacy DeploymentConfig
///
/// Secrets and ConfigMaps referenced by the registry container are fetched
/// through `resources`; the configuration file is parsed with `parser`.
/// Nothing is written to the cluster.
///
/// # Errors
/// Fails on the first setting that cannot be migrated faithfully. The error
/// names the DeploymentConfig.
pub async fn migrate_deployment_config<R, P>(
    dc: &DeploymentConfig,
    resources: &R,
    parser: &P,
) -> Result<MigrationResult, MigrationError>
where
    R: NamespacedResources + ?Sized,
    P: ConfigParser + ?Sized,
{
    assemble(dc, resources, parser)
        .await
        .map_err(|source| MigrationError {
            namespace: dc.namespace().unwrap_or_default(),
            name: dc.name_any(),
            source,
        })
}

async fn assemble<R, P>(
    dc: &DeploymentConfig,
    resources: &R,
    parser: &P,
) -> Result<MigrationResult, MigrateErrorKind>
where
    R: NamespacedResources + ?Sized,
    P: ConfigParser + ?Sized,
{
    let pod_spec = dc
        .spec
        .template
        .as_ref()
        .and_then(|template| template.spec.as_ref())
        .ok_or(MigrateErrorKind::MissingTemplate)?;

    let container = match pod_spec.containers.as_slice() {
        [container] => container,
        containers => return Err(MigrateErrorKind::ContainerCount(containers.len())),
    };
    if container.name != REGISTRY_CONTAINER_NAME {
        return Err(MigrateErrorKind::ContainerName(container.name.clone()));
    }

    let (mut env, config_path) = collect_environment(container)?;
    let config_path = config_path.unwrap_or_else(|| DEFAULT_CONFIGURATION_PATH.to_string());

    let mounts = container.volume_mounts.as_deref().unwrap_or_default();
    let volumes = pod_spec.volumes.as_deref().unwrap_or_default();
    let files = ContainerFiles::new(mounts, volumes, resources);

    let content = match files.pod_file(&config_path).await {
        Ok(content) => content,
        Err(err) if err.is_no_volume_mount() && config_path == DEFAULT_CONFIGURATION_PATH => {
            debug!(
                path = %config_path,
                "Configuration file not mounted, using the registry's default configuration"
            );
            DEFAULT_CONFIGURATION.as_bytes().to_vec()
        }
        Err(source) => {
            return Err(MigrateErrorKind::ConfigFile {
                path: config_path,
                source,
            })
        }
    };

    if !env.contains(DEFAULT_REGISTRY_ENV) {
        env.set_default(SERVER_ADDR_ENV, SERVER_ADDR_PLACEHOLDER);
    }
    let config = parser.parse(&content, &env)?;

    let storage = build_storage(
        config.storage.storage_type()?,
        config.storage.parameters()?,
        mounts,
        volumes,
    )?;
    let tls = migrate_tls(&config.http.tls, &files).await?;

    let spec = ImageRegistrySpec {
        management_state: ManagementState::Managed,
        version: VERSION_NONE.to_string(),
        image: container.image.clone().unwrap_or_default(),
        http_secret: config.http.secret.clone(),
        // Proxy settings are not migrated yet
        proxy: ProxyConfig::default(),
        storage,
        requests: RequestsConfig {
            read: request_limits(&config.openshift.requests.read),
            write: request_limits(&config.openshift.requests.write),
        },
        tls: tls.is_some(),
        routes: Vec::new(),
        replicas: dc.spec.replicas,
    };

    Ok(MigrationResult {
        spec,
        tls_secret: tls.map(|material| material.into_secret(resources.namespace())),
    })
}

#[cfg(test)]
#[path = "assemble_test.rs"]
mod tests;
