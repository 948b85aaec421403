//! Translation of the registry storage section into a `RegistryStorage`

use super::params::{migrate_parameters, ParameterError, ParameterRule, Parameters, RuleSet};
use crate::crd::registry::{
    AzureStorage, FilesystemStorage, GcsStorage, RegistryStorage, S3Storage, SwiftStorage,
};
use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, Volume, VolumeMount};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// The only supported root directory for filesystem storage
pub const REGISTRY_ROOT: &str = "/registry";

/// Name of the volume used when nothing is mounted at `/registry`
pub const DEFAULT_STORAGE_VOLUME: &str = "registry-storage";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unsupported storage type {0:?}")]
    UnsupportedType(String),

    #[error("unable to migrate {kind} storage: {source}")]
    Parameters {
        kind: StorageKind,
        #[source]
        source: ParameterError,
    },

    #[error("volume mount for /registry uses subPath {0:?}, which is not supported")]
    SubPathUnsupported(String),

    #[error("volume {0:?} not found for /registry")]
    VolumeNotFound(String),
}

/// Storage backends the registry configuration may name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Filesystem,
    S3,
    Azure,
    Gcs,
    Swift,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Filesystem => "filesystem",
            StorageKind::S3 => "s3",
            StorageKind::Azure => "azure",
            StorageKind::Gcs => "gcs",
            StorageKind::Swift => "swift",
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filesystem" => Ok(StorageKind::Filesystem),
            "s3" => Ok(StorageKind::S3),
            "azure" => Ok(StorageKind::Azure),
            "gcs" => Ok(StorageKind::Gcs),
            "swift" => Ok(StorageKind::Swift),
            other => Err(StorageError::UnsupportedType(other.to_string())),
        }
    }
}

/// Rule that copies a string parameter into `target`
fn copy_string(target: &mut String) -> ParameterRule<'_> {
    ParameterRule::string(move |value, _| {
        *target = value.to_string();
        Ok(())
    })
}

fn copy_bool(target: &mut bool) -> ParameterRule<'_> {
    ParameterRule::bool(move |value, _| {
        *target = value;
        Ok(())
    })
}

/// Build the storage configuration for backend `storage_type`
///
/// `mounts` and `volumes` belong to the registry container and its pod; they
/// are only consulted for filesystem storage.
pub fn build_storage(
    storage_type: &str,
    params: &Parameters,
    mounts: &[VolumeMount],
    volumes: &[Volume],
) -> Result<RegistryStorage, StorageError> {
    let kind: StorageKind = storage_type.parse()?;
    debug!(storage = %kind, "Migrating registry storage");

    let wrap = |source| StorageError::Parameters { kind, source };
    let storage = match kind {
        StorageKind::Filesystem => {
            RegistryStorage::Filesystem(filesystem_storage(params, mounts, volumes)?)
        }
        StorageKind::S3 => {
            let mut s3 = S3Storage::default();
            let mut rules = RuleSet::new();
            rules.insert("bucket", copy_string(&mut s3.bucket));
            rules.insert("region", copy_string(&mut s3.region));
            rules.insert("regionendpoint", copy_string(&mut s3.region_endpoint));
            rules.insert("encrypt", copy_bool(&mut s3.encrypt));
            migrate_parameters(params, rules).map_err(wrap)?;
            RegistryStorage::S3(s3)
        }
        StorageKind::Azure => {
            let mut azure = AzureStorage::default();
            let mut rules = RuleSet::new();
            rules.insert("container", copy_string(&mut azure.container));
            migrate_parameters(params, rules).map_err(wrap)?;
            RegistryStorage::Azure(azure)
        }
        StorageKind::Gcs => {
            let mut gcs = GcsStorage::default();
            let mut rules = RuleSet::new();
            rules.insert("bucket", copy_string(&mut gcs.bucket));
            migrate_parameters(params, rules).map_err(wrap)?;
            RegistryStorage::Gcs(gcs)
        }
        StorageKind::Swift => {
            let mut swift = SwiftStorage::default();
            let mut rules = RuleSet::new();
            rules.insert("authurl", copy_string(&mut swift.auth_url));
            rules.insert("container", copy_string(&mut swift.container));
            migrate_parameters(params, rules).map_err(wrap)?;
            RegistryStorage::Swift(swift)
        }
    };

    Ok(storage)
}

/// Filesystem storage must be rooted at `/registry`
///
/// A missing `/registry` mount falls back to an emptyDir volume, while a
/// missing `rootdirectory` parameter is an error.
fn filesystem_storage(
    params: &Parameters,
    mounts: &[VolumeMount],
    volumes: &[Volume],
) -> Result<FilesystemStorage, StorageError> {
    let mut rules = RuleSet::new();
    rules.insert(
        "rootdirectory",
        ParameterRule::string(|value, present| {
            if !present {
                return Err("rootdirectory is required".to_string());
            }
            if value != REGISTRY_ROOT {
                return Err(format!(
                    "only {REGISTRY_ROOT} is supported, got {value:?}"
                ));
            }
            Ok(())
        }),
    );
    migrate_parameters(params, rules).map_err(|source| StorageError::Parameters {
        kind: StorageKind::Filesystem,
        source,
    })?;

    let volume_source = match mounts.iter().find(|mount| mount.mount_path == REGISTRY_ROOT) {
        Some(mount) => {
            if let Some(sub_path) = mount.sub_path.as_deref().filter(|path| !path.is_empty()) {
                return Err(StorageError::SubPathUnsupported(sub_path.to_string()));
            }
            volumes
                .iter()
                .find(|volume| volume.name == mount.name)
                .cloned()
                .ok_or_else(|| StorageError::VolumeNotFound(mount.name.clone()))?
        }
        None => {
            debug!("No volume mounted at {REGISTRY_ROOT}, using emptyDir");
            Volume {
                name: DEFAULT_STORAGE_VOLUME.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            }
        }
    };

    Ok(FilesystemStorage { volume_source })
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
