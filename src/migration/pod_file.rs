//! Reading files as a registry container would see them
//!
//! A path inside the container is mapped to a volume mount, the mount to a
//! pod volume, and the volume to the Secret or ConfigMap backing it.

use super::resources::{NamespacedResources, ResourceError};
use super::source::{select_volume_source, VolumeSourceError, VolumeSourceKind};
use super::volume::{resolve_volume_mount, VolumeError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Volume, VolumeMount};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PodFileError {
    #[error("no volume mount found for {filename}")]
    NoVolumeMountFound { filename: String },

    #[error("unable to get file {filename}: {source}")]
    Lookup {
        filename: String,
        #[source]
        source: FileLookupError,
    },
}

impl PodFileError {
    /// The file is not provided by any volume mount
    ///
    /// The only lookup failure callers may recover from.
    pub fn is_no_volume_mount(&self) -> bool {
        matches!(self, PodFileError::NoVolumeMountFound { .. })
    }

    fn lookup(filename: &str, source: impl Into<FileLookupError>) -> Self {
        PodFileError::Lookup {
            filename: filename.to_string(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FileLookupError {
    #[error(transparent)]
    Path(#[from] VolumeError),

    #[error("volume {0:?} not found in pod spec")]
    VolumeNotFound(String),

    #[error(transparent)]
    Source(#[from] VolumeSourceError),

    #[error("{kind} volume {volume:?} uses items, which is not supported")]
    ItemsUnsupported { kind: &'static str, volume: String },

    #[error("{kind} volume {volume:?} does not name a {kind}")]
    MissingName { kind: &'static str, volume: String },

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("{kind} {name} has no data for key {key:?}")]
    MissingKey {
        kind: &'static str,
        name: String,
        key: String,
    },

    #[error("volume source {0} is not supported")]
    UnsupportedSource(&'static str),
}

/// Resolves absolute in-container paths to file content
#[async_trait]
pub trait PodFileGetter: Send + Sync {
    async fn pod_file(&self, filename: &str) -> Result<Vec<u8>, PodFileError>;
}

/// Files of one container, backed by Secrets and ConfigMaps
pub struct ContainerFiles<'a, R: ?Sized> {
    mounts: &'a [VolumeMount],
    volumes: &'a [Volume],
    resources: &'a R,
}

impl<'a, R: NamespacedResources + ?Sized> ContainerFiles<'a, R> {
    pub fn new(mounts: &'a [VolumeMount], volumes: &'a [Volume], resources: &'a R) -> Self {
        ContainerFiles {
            mounts,
            volumes,
            resources,
        }
    }

    async fn read(&self, filename: &str) -> Result<Vec<u8>, FileLookupError> {
        // NoVolumeMountFound is split off by the caller
        let (mount, key) = resolve_volume_mount(self.mounts, filename)?;

        let volume = self
            .volumes
            .iter()
            .find(|volume| volume.name == mount.name)
            .ok_or_else(|| FileLookupError::VolumeNotFound(mount.name.clone()))?;

        match select_volume_source(volume)? {
            VolumeSourceKind::Secret(source) => {
                if source.items.as_ref().is_some_and(|items| !items.is_empty()) {
                    return Err(FileLookupError::ItemsUnsupported {
                        kind: "Secret",
                        volume: volume.name.clone(),
                    });
                }
                let name = source
                    .secret_name
                    .clone()
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| FileLookupError::MissingName {
                        kind: "Secret",
                        volume: volume.name.clone(),
                    })?;

                let secret = self.resources.get_secret(&name).await?;
                secret
                    .data
                    .and_then(|mut data| data.remove(&key))
                    .map(|value| value.0)
                    .ok_or(FileLookupError::MissingKey {
                        kind: "Secret",
                        name,
                        key,
                    })
            }
            VolumeSourceKind::ConfigMap(source) => {
                if source.items.as_ref().is_some_and(|items| !items.is_empty()) {
                    return Err(FileLookupError::ItemsUnsupported {
                        kind: "ConfigMap",
                        volume: volume.name.clone(),
                    });
                }
                let name: Option<String> = source.name.clone().into();
                let name = name.filter(|name| !name.is_empty()).ok_or_else(|| {
                    FileLookupError::MissingName {
                        kind: "ConfigMap",
                        volume: volume.name.clone(),
                    }
                })?;

                // binaryData is not consulted
                let config_map = self.resources.get_config_map(&name).await?;
                config_map
                    .data
                    .and_then(|mut data| data.remove(&key))
                    .map(String::into_bytes)
                    .ok_or(FileLookupError::MissingKey {
                        kind: "ConfigMap",
                        name,
                        key,
                    })
            }
            VolumeSourceKind::Other(kind) => Err(FileLookupError::UnsupportedSource(kind)),
        }
    }
}

#[async_trait]
impl<R: NamespacedResources + ?Sized> PodFileGetter for ContainerFiles<'_, R> {
    async fn pod_file(&self, filename: &str) -> Result<Vec<u8>, PodFileError> {
        match self.read(filename).await {
            Ok(content) => Ok(content),
            Err(FileLookupError::Path(VolumeError::NoVolumeMountFound { filename })) => {
                Err(PodFileError::NoVolumeMountFound { filename })
            }
            Err(err) => Err(PodFileError::lookup(filename, err)),
        }
    }
}

#[cfg(test)]
#[path = "pod_file_test.rs"]
mod tests;
