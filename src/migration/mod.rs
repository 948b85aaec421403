//! Translation of a legacy registry deployment into an `ImageRegistry` spec
//!
//! - `assemble` - top-level migration of a DeploymentConfig
//! - `config` - registry configuration parsing with environment overrides
//! - `pod_file` - reading container files from mounted Secrets and ConfigMaps
//! - `storage` / `tls` - per-setting translation

pub mod assemble;
pub mod config;
pub mod duration;
pub mod params;
pub mod pod_file;
pub mod resources;
pub mod source;
pub mod storage;
pub mod tls;
pub mod volume;

pub use assemble::{migrate_deployment_config, MigrateErrorKind, MigrationError, MigrationResult};
pub use config::{ConfigParser, EnvironmentOverlay, YamlConfigParser};
pub use pod_file::{ContainerFiles, PodFileGetter};
pub use resources::{KubeResources, NamespacedResources};
