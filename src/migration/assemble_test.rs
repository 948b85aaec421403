#![allow(clippy::unwrap_used)] // Tests can use unwrap for brevity

use super::*;
use crate::crd::legacy::DeploymentConfigSpec;
use crate::crd::registry::{FilesystemStorage, RegistryStorage, S3Storage};
use crate::migration::config::{RegistryConfiguration, YamlConfigParser};
use crate::migration::resources::FakeResources;
use crate::migration::storage::DEFAULT_STORAGE_VOLUME;
use crate::migration::tls::{SECRET_TLS_CERT_KEY, SECRET_TLS_KEY_KEY, TLS_SECRET_NAME};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, EmptyDirVolumeSource, EnvVar, EnvVarSource,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, SecretKeySelector,
    SecretVolumeSource, Volume, VolumeMount,
};
use std::sync::Mutex;

const IMAGE: &str = "openshift/origin-docker-registry:v3.11";

const BASE_ENV: [(&str, &str); 3] = [
    ("REGISTRY_HTTP_ADDR", ":5000"),
    ("REGISTRY_HTTP_NET", "tcp"),
    ("OPENSHIFT_DEFAULT_REGISTRY", "docker-registry.default.svc:5000"),
];

const S3_CONFIG: &str = r#"
version: 0.1
http:
  secret: s3cr3t
storage:
  cache:
    blobdescriptor: inmemory
  s3:
    bucket: images
    region: us-east-1
    encrypt: true
openshift:
  version: 1.0
  requests:
    read:
      maxrunning: 10
      maxinqueue: 5
      maxwaitinqueue: 90s
    write:
      maxrunning: 2
"#;

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn mount(name: &str, mount_path: &str, sub_path: Option<&str>) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: mount_path.to_string(),
        sub_path: sub_path.map(str::to_string),
        ..Default::default()
    }
}

fn registry_container(env: &[(&str, &str)], mounts: Vec<VolumeMount>) -> Container {
    Container {
        name: REGISTRY_CONTAINER_NAME.to_string(),
        image: Some(IMAGE.to_string()),
        env: Some(env.iter().map(|(name, value)| env_var(name, value)).collect()),
        volume_mounts: Some(mounts),
        ..Default::default()
    }
}

fn deployment_config(containers: Vec<Container>, volumes: Vec<Volume>) -> DeploymentConfig {
    let mut dc = DeploymentConfig::new(
        "docker-registry",
        DeploymentConfigSpec {
            replicas: 3,
            selector: None,
            template: Some(PodTemplateSpec {
                metadata: None,
                spec: Some(PodSpec {
                    containers,
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            }),
        },
    );
    dc.metadata.namespace = Some("default".to_string());
    dc
}

fn default_deployment_config() -> DeploymentConfig {
    deployment_config(vec![registry_container(&BASE_ENV, Vec::new())], Vec::new())
}

/// Registry reading its configuration from the `registry-config` ConfigMap
fn config_map_deployment_config(env: &[(&str, &str)]) -> DeploymentConfig {
    let mounts = vec![mount("config", "/etc/registry", None)];
    let volumes = vec![Volume {
        name: "config".to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: "registry-config".to_string().into(),
            ..Default::default()
        }),
        ..Default::default()
    }];
    let mut env = env.to_vec();
    env.push(("REGISTRY_CONFIGURATION_PATH", "/etc/registry/config.yml"));
    deployment_config(vec![registry_container(&env, mounts)], volumes)
}

async fn migrate(
    dc: &DeploymentConfig,
    resources: &FakeResources,
) -> Result<MigrationResult, MigrationError> {
    migrate_deployment_config(dc, resources, &YamlConfigParser).await
}

/// Records the environment handed to the parser
#[derive(Default)]
struct RecordingParser {
    env: Mutex<Option<EnvironmentOverlay>>,
}

impl ConfigParser for RecordingParser {
    fn parse(
        &self,
        content: &[u8],
        env: &EnvironmentOverlay,
    ) -> Result<RegistryConfiguration, ConfigError> {
        *self.env.lock().unwrap() = Some(env.clone());
        YamlConfigParser.parse(content, env)
    }
}

#[tokio::test]
async fn test_default_workload() {
    let resources = FakeResources::new("default");

    let result = migrate(&default_deployment_config(), &resources).await.unwrap();

    let spec = result.spec;
    assert_eq!(spec.management_state, ManagementState::Managed);
    assert_eq!(spec.version, VERSION_NONE);
    assert_eq!(spec.image, IMAGE);
    assert_eq!(spec.http_secret, "");
    assert!(spec.proxy.is_empty());
    assert!(spec.routes.is_empty());
    assert!(!spec.tls);
    assert_eq!(spec.replicas, 3);
    assert_eq!(spec.requests.read.max_wait_in_queue, "0s");
    assert_eq!(
        spec.storage,
        RegistryStorage::Filesystem(FilesystemStorage {
            volume_source: Volume {
                name: DEFAULT_STORAGE_VOLUME.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
        })
    );
    assert!(result.tls_secret.is_none());
    assert_eq!(resources.fetch_count(), 0);
}

#[tokio::test]
async fn test_filesystem_storage_keeps_registry_volume() {
    let claim = Volume {
        name: "registry-storage".to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: "registry-claim".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let dc = deployment_config(
        vec![registry_container(
            &BASE_ENV,
            vec![mount("registry-storage", "/registry", None)],
        )],
        vec![claim.clone()],
    );

    let result = migrate(&dc, &FakeResources::new("default")).await.unwrap();

    assert_eq!(
        result.spec.storage,
        RegistryStorage::Filesystem(FilesystemStorage {
            volume_source: claim
        })
    );
}

#[tokio::test]
async fn test_http_secret_from_environment() {
    let mut env = BASE_ENV.to_vec();
    env.push(("REGISTRY_HTTP_SECRET", "from-env"));
    let dc = deployment_config(vec![registry_container(&env, Vec::new())], Vec::new());

    let result = migrate(&dc, &FakeResources::new("default")).await.unwrap();

    assert_eq!(result.spec.http_secret, "from-env");
}

#[tokio::test]
async fn test_configuration_from_config_map() {
    let resources = FakeResources::new("default")
        .with_config_map("registry-config", &[("config.yml", S3_CONFIG)]);

    let result = migrate(&config_map_deployment_config(&BASE_ENV), &resources)
        .await
        .unwrap();

    let spec = result.spec;
    assert_eq!(spec.http_secret, "s3cr3t");
    assert_eq!(
        spec.storage,
        RegistryStorage::S3(S3Storage {
            bucket: "images".to_string(),
            region: "us-east-1".to_string(),
            region_endpoint: String::new(),
            encrypt: true,
        })
    );
    assert_eq!(spec.requests.read.max_running, 10);
    assert_eq!(spec.requests.read.max_in_queue, 5);
    assert_eq!(spec.requests.read.max_wait_in_queue, "1m30s");
    assert_eq!(spec.requests.write.max_running, 2);
    assert_eq!(spec.requests.write.max_wait_in_queue, "0s");
}

#[tokio::test]
async fn test_environment_overrides_mounted_configuration() {
    let mut env = BASE_ENV.to_vec();
    env.push(("REGISTRY_STORAGE_S3_BUCKET", "other-images"));
    let resources = FakeResources::new("default")
        .with_config_map("registry-config", &[("config.yml", S3_CONFIG)]);

    let result = migrate(&config_map_deployment_config(&env), &resources)
        .await
        .unwrap();

    match result.spec.storage {
        RegistryStorage::S3(s3) => assert_eq!(s3.bucket, "other-images"),
        other => panic!("expected s3 storage, got {other:?}"),
    }
}

#[tokio::test]
async fn test_tls_from_secret_volume() {
    let mut env = BASE_ENV.to_vec();
    env.push(("REGISTRY_HTTP_TLS_KEY", "/etc/secrets/tls.key"));
    env.push(("REGISTRY_HTTP_TLS_CERTIFICATE", "/etc/secrets/tls.crt"));
    let certs = Volume {
        name: "certs".to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some("registry-certificates".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };
    let dc = deployment_config(
        vec![registry_container(
            &env,
            vec![mount("certs", "/etc/secrets", None)],
        )],
        vec![certs],
    );
    let resources = FakeResources::new("default").with_secret(
        "registry-certificates",
        &[("tls.key", "KEY"), ("tls.crt", "CERT")],
    );

    let result = migrate(&dc, &resources).await.unwrap();

    assert!(result.spec.tls);
    let secret = result.tls_secret.unwrap();
    assert_eq!(secret.metadata.name.as_deref(), Some(TLS_SECRET_NAME));
    assert_eq!(secret.metadata.namespace.as_deref(), Some("default"));
    let data = secret.data.unwrap();
    assert_eq!(data[SECRET_TLS_KEY_KEY].0, b"KEY");
    assert_eq!(data[SECRET_TLS_CERT_KEY].0, b"CERT");
}

#[tokio::test]
async fn test_migration_is_repeatable() {
    let dc = config_map_deployment_config(&BASE_ENV);
    let resources = FakeResources::new("default")
        .with_config_map("registry-config", &[("config.yml", S3_CONFIG)]);

    let first = migrate(&dc, &resources).await.unwrap();
    let second = migrate(&dc, &resources).await.unwrap();

    assert_eq!(first, second);
    // Each run reads the configuration afresh
    assert_eq!(resources.fetch_count(), 2);
}

#[tokio::test]
async fn test_missing_template() {
    let mut dc = default_deployment_config();
    dc.spec.template = None;

    let err = migrate(&dc, &FakeResources::new("default")).await.unwrap_err();

    assert!(matches!(err.source, MigrateErrorKind::MissingTemplate));
}

#[tokio::test]
async fn test_multiple_containers() {
    let mut sidecar = registry_container(&BASE_ENV, Vec::new());
    sidecar.name = "proxy".to_string();
    let dc = deployment_config(
        vec![registry_container(&BASE_ENV, Vec::new()), sidecar],
        Vec::new(),
    );

    let err = migrate(&dc, &FakeResources::new("default")).await.unwrap_err();

    assert!(matches!(err.source, MigrateErrorKind::ContainerCount(2)));
    assert_eq!(
        err.to_string(),
        "unable to migrate DeploymentConfig default/docker-registry: \
         expected exactly one container, found 2"
    );
}

#[tokio::test]
async fn test_unexpected_container_name() {
    let mut container = registry_container(&BASE_ENV, Vec::new());
    container.name = "docker-registry".to_string();
    let dc = deployment_config(vec![container], Vec::new());

    let err = migrate(&dc, &FakeResources::new("default")).await.unwrap_err();

    match err.source {
        MigrateErrorKind::ContainerName(name) => assert_eq!(name, "docker-registry"),
        other => panic!("expected ContainerName, got {other:?}"),
    }
}

#[tokio::test]
async fn test_env_value_from_is_rejected() {
    let mut container = registry_container(&BASE_ENV, Vec::new());
    container.env.get_or_insert_with(Vec::new).push(EnvVar {
        name: "REGISTRY_HTTP_SECRET".to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: "registry-http".to_string().into(),
                key: "secret".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    });
    let dc = deployment_config(vec![container], Vec::new());

    let err = migrate(&dc, &FakeResources::new("default")).await.unwrap_err();

    match err.source {
        MigrateErrorKind::EnvValueFrom(name) => assert_eq!(name, "REGISTRY_HTTP_SECRET"),
        other => panic!("expected EnvValueFrom, got {other:?}"),
    }
}

#[tokio::test]
async fn test_hardcoded_env_must_match() {
    let env = [("REGISTRY_HTTP_ADDR", ":8080"), ("REGISTRY_HTTP_NET", "tcp")];
    let dc = deployment_config(vec![registry_container(&env, Vec::new())], Vec::new());

    let err = migrate(&dc, &FakeResources::new("default")).await.unwrap_err();

    match err.source {
        MigrateErrorKind::EnvMismatch {
            name,
            expected,
            actual,
        } => {
            assert_eq!(name, "REGISTRY_HTTP_ADDR");
            assert_eq!(expected, ":5000");
            assert_eq!(actual, ":8080");
        }
        other => panic!("expected EnvMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unsupported_env() {
    let mut env = BASE_ENV.to_vec();
    env.push(("HTTP_PROXY", "http://proxy.example.com:3128"));
    let dc = deployment_config(vec![registry_container(&env, Vec::new())], Vec::new());

    let err = migrate(&dc, &FakeResources::new("default")).await.unwrap_err();

    match err.source {
        MigrateErrorKind::UnsupportedEnv(name) => assert_eq!(name, "HTTP_PROXY"),
        other => panic!("expected UnsupportedEnv, got {other:?}"),
    }
}

#[tokio::test]
async fn test_custom_configuration_path_must_be_mounted() {
    let mut env = BASE_ENV.to_vec();
    env.push(("REGISTRY_CONFIGURATION_PATH", "/etc/registry/config.yml"));
    let dc = deployment_config(vec![registry_container(&env, Vec::new())], Vec::new());

    let err = migrate(&dc, &FakeResources::new("default")).await.unwrap_err();

    match err.source {
        MigrateErrorKind::ConfigFile { path, source } => {
            assert_eq!(path, "/etc/registry/config.yml");
            assert!(source.is_no_volume_mount());
        }
        other => panic!("expected ConfigFile, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_config_map_is_fatal() {
    let err = migrate(
        &config_map_deployment_config(&BASE_ENV),
        &FakeResources::new("default"),
    )
    .await
    .unwrap_err();

    match err.source {
        MigrateErrorKind::ConfigFile { source, .. } => assert!(!source.is_no_volume_mount()),
        other => panic!("expected ConfigFile, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unsupported_storage_backend() {
    let mut env = BASE_ENV.to_vec();
    env.push(("REGISTRY_STORAGE", "inmemory"));
    let dc = deployment_config(vec![registry_container(&env, Vec::new())], Vec::new());

    let err = migrate(&dc, &FakeResources::new("default")).await.unwrap_err();

    assert!(matches!(err.source, MigrateErrorKind::Storage(_)));
}

#[tokio::test]
async fn test_server_address_placeholder() {
    let env = [("REGISTRY_HTTP_ADDR", ":5000"), ("REGISTRY_HTTP_NET", "tcp")];
    let dc = deployment_config(vec![registry_container(&env, Vec::new())], Vec::new());
    let parser = RecordingParser::default();

    migrate_deployment_config(&dc, &FakeResources::new("default"), &parser)
        .await
        .unwrap();

    let seen = parser.env.lock().unwrap().take().unwrap();
    assert_eq!(seen.get(SERVER_ADDR_ENV), Some(SERVER_ADDR_PLACEHOLDER));
}

#[tokio::test]
async fn test_default_registry_skips_placeholder() {
    let parser = RecordingParser::default();

    migrate_deployment_config(
        &default_deployment_config(),
        &FakeResources::new("default"),
        &parser,
    )
    .await
    .unwrap();

    let seen = parser.env.lock().unwrap().take().unwrap();
    assert!(!seen.contains(SERVER_ADDR_ENV));
    assert!(!seen.contains(CONFIGURATION_PATH_ENV));
}

#[tokio::test]
async fn test_result_serializes_without_absent_secret() {
    let result = migrate(&default_deployment_config(), &FakeResources::new("default"))
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["spec"]["version"], VERSION_NONE);
    assert_eq!(json["spec"]["managementState"], "Managed");
    assert!(json.get("tlsSecret").is_none());
}
