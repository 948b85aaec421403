//! Selection of the populated source of a pod volume

use k8s_openapi::api::core::v1::{ConfigMapVolumeSource, SecretVolumeSource, Volume};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VolumeSourceError {
    #[error("volume {volume:?} has no source")]
    NoSource { volume: String },

    #[error("volume {volume:?} has multiple sources: {names}")]
    AmbiguousSource { volume: String, names: String },
}

/// The single source backing a pod volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeSourceKind<'a> {
    Secret(&'a SecretVolumeSource),
    ConfigMap(&'a ConfigMapVolumeSource),
    /// Any other source, by its API field name (e.g. `emptyDir`)
    Other(&'static str),
}

impl VolumeSourceKind<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            VolumeSourceKind::Secret(_) => "secret",
            VolumeSourceKind::ConfigMap(_) => "configMap",
            VolumeSourceKind::Other(name) => *name,
        }
    }
}

/// API field names of every source set on the volume
fn populated_sources(volume: &Volume) -> Vec<&'static str> {
    [
        ("awsElasticBlockStore", volume.aws_elastic_block_store.is_some()),
        ("azureDisk", volume.azure_disk.is_some()),
        ("azureFile", volume.azure_file.is_some()),
        ("cephfs", volume.cephfs.is_some()),
        ("cinder", volume.cinder.is_some()),
        ("configMap", volume.config_map.is_some()),
        ("csi", volume.csi.is_some()),
        ("downwardAPI", volume.downward_api.is_some()),
        ("emptyDir", volume.empty_dir.is_some()),
        ("ephemeral", volume.ephemeral.is_some()),
        ("fc", volume.fc.is_some()),
        ("flexVolume", volume.flex_volume.is_some()),
        ("flocker", volume.flocker.is_some()),
        ("gcePersistentDisk", volume.gce_persistent_disk.is_some()),
        ("gitRepo", volume.git_repo.is_some()),
        ("glusterfs", volume.glusterfs.is_some()),
        ("hostPath", volume.host_path.is_some()),
        ("iscsi", volume.iscsi.is_some()),
        ("nfs", volume.nfs.is_some()),
        ("persistentVolumeClaim", volume.persistent_volume_claim.is_some()),
        ("photonPersistentDisk", volume.photon_persistent_disk.is_some()),
        ("portworxVolume", volume.portworx_volume.is_some()),
        ("projected", volume.projected.is_some()),
        ("quobyte", volume.quobyte.is_some()),
        ("rbd", volume.rbd.is_some()),
        ("scaleIO", volume.scale_io.is_some()),
        ("secret", volume.secret.is_some()),
        ("storageos", volume.storageos.is_some()),
        ("vsphereVolume", volume.vsphere_volume.is_some()),
    ]
    .into_iter()
    .filter_map(|(name, set)| set.then_some(name))
    .collect()
}

impl<'a> TryFrom<&'a Volume> for VolumeSourceKind<'a> {
    type Error = VolumeSourceError;

    fn try_from(volume: &'a Volume) -> Result<Self, Self::Error> {
        let populated = populated_sources(volume);
        match populated.as_slice() {
            [] => Err(VolumeSourceError::NoSource {
                volume: volume.name.clone(),
            }),
            [name] => Ok(match (&volume.secret, &volume.config_map) {
                (Some(secret), _) => VolumeSourceKind::Secret(secret),
                (_, Some(config_map)) => VolumeSourceKind::ConfigMap(config_map),
                _ => VolumeSourceKind::Other(*name),
            }),
            names => Err(VolumeSourceError::AmbiguousSource {
                volume: volume.name.clone(),
                names: names.join(", "),
            }),
        }
    }
}

/// Select the single populated source of `volume`
pub fn select_volume_source(volume: &Volume) -> Result<VolumeSourceKind<'_>, VolumeSourceError> {
    VolumeSourceKind::try_from(volume)
}
