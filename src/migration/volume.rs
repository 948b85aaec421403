//! Resolution of in-container file paths to volume mounts
//!
//! Mirrors how the kubelet lays out mounts: the most specific mount path
//! wins and a mount's `subPath` selects a directory or file inside the
//! volume.

use k8s_openapi::api::core::v1::VolumeMount;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VolumeError {
    #[error("filename {filename:?} is not an absolute path")]
    RelativePath { filename: String },

    #[error("no volume mount found for {filename}")]
    NoVolumeMountFound { filename: String },

    #[error("volumes {first:?} and {second:?} are both mounted at {mount_path}, unable to resolve {filename}")]
    AmbiguousMount {
        filename: String,
        mount_path: String,
        first: String,
        second: String,
    },
}

/// Whether a mount at `mount_path` makes `filename` visible
fn mount_contains(mount_path: &str, filename: &str) -> bool {
    if mount_path.ends_with('/') {
        return filename.starts_with(mount_path);
    }
    match filename.strip_prefix(mount_path) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Find the volume mount that provides `filename` and the key of the file
/// inside the mounted volume
///
/// Among all mounts containing `filename`, the one with the longest mount
/// path is selected. Two candidates with the same mount path are rejected
/// since Kubernetes does not define an order between them.
///
/// # Examples
/// ```ignore
/// // mount /etc/config (subPath "foo"), file /etc/config/bar/config.yaml
/// let (_, key) = resolve_volume_mount(&mounts, "/etc/config/bar/config.yaml")?;
/// assert_eq!(key, "foo/bar/config.yaml");
/// ```
pub fn resolve_volume_mount<'a>(
    mounts: &'a [VolumeMount],
    filename: &str,
) -> Result<(&'a VolumeMount, String), VolumeError> {
    if !filename.starts_with('/') {
        return Err(VolumeError::RelativePath {
            filename: filename.to_string(),
        });
    }

    let candidates: Vec<&VolumeMount> = mounts
        .iter()
        .filter(|mount| mount_contains(&mount.mount_path, filename))
        .collect();
    let longest = candidates
        .iter()
        .map(|mount| mount.mount_path.len())
        .max()
        .ok_or_else(|| VolumeError::NoVolumeMountFound {
            filename: filename.to_string(),
        })?;

    let mut winners = candidates
        .into_iter()
        .filter(|mount| mount.mount_path.len() == longest);
    let mount = winners.next().ok_or_else(|| VolumeError::NoVolumeMountFound {
        filename: filename.to_string(),
    })?;
    if let Some(other) = winners.next() {
        return Err(VolumeError::AmbiguousMount {
            filename: filename.to_string(),
            mount_path: mount.mount_path.clone(),
            first: mount.name.clone(),
            second: other.name.clone(),
        });
    }

    let rest = &filename[mount.mount_path.len()..];
    let rest = rest.strip_prefix('/').unwrap_or(rest);

    let key = match mount.sub_path.as_deref() {
        Some(sub_path) if !sub_path.is_empty() => {
            if rest.is_empty() {
                sub_path.to_string()
            } else if sub_path.ends_with('/') {
                format!("{sub_path}{rest}")
            } else {
                format!("{sub_path}/{rest}")
            }
        }
        _ => rest.to_string(),
    };

    Ok((mount, key))
}

#[cfg(test)]
#[path = "volume_test.rs"]
mod tests;
