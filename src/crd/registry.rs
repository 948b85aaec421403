use k8s_openapi::api::core::v1::Volume;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Version sentinel for a registry that has not adopted a real version yet
pub const VERSION_NONE: &str = "none";

/// ImageRegistry is the declarative configuration of the integrated registry
///
/// Cluster-scoped; the operator reconciles the registry workload from it.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "imageregistry.operator.openshift.io",
    version = "v1",
    kind = "Config",
    plural = "configs",
    root = "ImageRegistry",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".spec.managementState"}"#,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistrySpec {
    /// Whether the operator manages the registry
    pub management_state: ManagementState,

    /// Registry version; `none` until a real version is adopted
    pub version: String,

    /// Image pull spec for the registry container
    #[serde(default)]
    pub image: String,

    /// Secret used to sign upload state
    #[serde(default)]
    pub http_secret: String,

    /// Proxy settings for upstream pulls
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Storage backend, exactly one kind
    #[serde(with = "serde_yaml::with::singleton_map")]
    #[schemars(with = "RegistryStorage")]
    pub storage: RegistryStorage,

    /// Concurrency limits for registry requests
    #[serde(default)]
    pub requests: RequestsConfig,

    /// Serve the registry over TLS
    #[serde(default)]
    pub tls: bool,

    /// Additional routes exposing the registry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteConfig>,

    /// Number of registry replicas
    #[serde(default)]
    pub replicas: i32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum ManagementState {
    #[default]
    Managed,
    Unmanaged,
    Removed,
}

/// Registry storage backend
///
/// Serialized as a one-of: `{"s3": {...}}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistryStorage {
    Filesystem(FilesystemStorage),
    S3(S3Storage),
    Azure(AzureStorage),
    Gcs(GcsStorage),
    Swift(SwiftStorage),
}

impl RegistryStorage {
    /// Backend name as used in the registry configuration file
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryStorage::Filesystem(_) => "filesystem",
            RegistryStorage::S3(_) => "s3",
            RegistryStorage::Azure(_) => "azure",
            RegistryStorage::Gcs(_) => "gcs",
            RegistryStorage::Swift(_) => "swift",
        }
    }
}

/// Local filesystem storage rooted at `/registry`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemStorage {
    /// Pod volume mounted at `/registry`
    pub volume_source: Volume,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct S3Storage {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub region_endpoint: String,
    #[serde(default)]
    pub encrypt: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct AzureStorage {
    #[serde(default)]
    pub container: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct GcsStorage {
    #[serde(default)]
    pub bucket: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct SwiftStorage {
    #[serde(rename = "authURL", default)]
    pub auth_url: String,
    #[serde(default)]
    pub container: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub https: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub no_proxy: String,
}

impl ProxyConfig {
    pub fn is_empty(&self) -> bool {
        self.http.is_empty() && self.https.is_empty() && self.no_proxy.is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct RequestsConfig {
    #[serde(default)]
    pub read: RequestLimits,
    #[serde(default)]
    pub write: RequestLimits,
}

/// Limits for one class of requests
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestLimits {
    /// Maximum number of requests served concurrently (0 = unlimited)
    #[serde(default)]
    pub max_running: i32,

    /// Maximum number of queued requests (0 = unlimited)
    #[serde(default)]
    pub max_in_queue: i32,

    /// Maximum time a request may wait in the queue, e.g. "1m30s"
    #[serde(default)]
    pub max_wait_in_queue: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
