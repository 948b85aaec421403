//! Migration of the registry's HTTP TLS settings
//!
//! Key and certificate are read from the files the registry container
//! would load and returned as `kubernetes.io/tls` Secret material.

use super::config::TlsSection;
use super::pod_file::{PodFileError, PodFileGetter};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Secret keys for storing certificate data
pub const SECRET_TLS_KEY_KEY: &str = "tls.key";
pub const SECRET_TLS_CERT_KEY: &str = "tls.crt";

/// Name of the Secret holding migrated TLS material
pub const TLS_SECRET_NAME: &str = "image-registry-tls";

#[derive(Debug, Error)]
pub enum TlsMigrationError {
    #[error("HTTP TLS ClientCAs is not supported")]
    ClientCasUnsupported,

    #[error("HTTP TLS LetsEncrypt is not supported")]
    LetsEncryptUnsupported,

    #[error("unable to read TLS key: {0}")]
    Key(#[source] PodFileError),

    #[error("unable to read TLS certificate: {0}")]
    Certificate(#[source] PodFileError),
}

/// PEM-encoded key pair served by the registry
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    pub key: Vec<u8>,
    pub certificate: Vec<u8>,
}

impl TlsMaterial {
    /// Build the `kubernetes.io/tls` Secret carrying this material
    pub fn into_secret(self, namespace: &str) -> Secret {
        let mut data = BTreeMap::new();
        data.insert(SECRET_TLS_KEY_KEY.to_string(), ByteString(self.key));
        data.insert(SECRET_TLS_CERT_KEY.to_string(), ByteString(self.certificate));

        Secret {
            metadata: ObjectMeta {
                name: Some(TLS_SECRET_NAME.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            type_: Some("kubernetes.io/tls".to_string()),
            data: Some(data),
            ..Default::default()
        }
    }
}

/// Extract TLS material from the registry's HTTP TLS settings
///
/// # Returns
/// * `Ok(None)` - TLS is not configured
/// * `Ok(Some(material))` - key and certificate were read
/// * `Err(TlsMigrationError)` - TLS uses an unsupported feature or a file is unreadable
pub async fn migrate_tls<F: PodFileGetter + ?Sized>(
    tls: &TlsSection,
    files: &F,
) -> Result<Option<TlsMaterial>, TlsMigrationError> {
    if tls.key.is_empty() && tls.certificate.is_empty() {
        return Ok(None);
    }
    if !tls.client_cas.is_empty() {
        return Err(TlsMigrationError::ClientCasUnsupported);
    }
    if !tls.letsencrypt.email.is_empty() {
        return Err(TlsMigrationError::LetsEncryptUnsupported);
    }

    let key = files
        .pod_file(&tls.key)
        .await
        .map_err(TlsMigrationError::Key)?;
    let certificate = files
        .pod_file(&tls.certificate)
        .await
        .map_err(TlsMigrationError::Certificate)?;
    debug!(key = %tls.key, certificate = %tls.certificate, "Loaded registry TLS material");

    Ok(Some(TlsMaterial { key, certificate }))
}

#[cfg(test)]
#[path = "tls_test.rs"]
mod tests;
