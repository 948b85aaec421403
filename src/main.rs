use anyhow::Context as _;
use kube::{Api, Client};
use registry_migrator::crd::legacy::DeploymentConfig;
use registry_migrator::migration::{migrate_deployment_config, KubeResources, YamlConfigParser};
use registry_migrator::settings::MigratorConfig;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the migrated spec
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = MigratorConfig::from_env();
    info!(
        namespace = %config.namespace,
        deployment_config = %config.deployment_config,
        "Migrating legacy registry deployment"
    );

    let client = match Client::try_default().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(e.into());
        }
    };

    let deployment_configs: Api<DeploymentConfig> =
        Api::namespaced(client.clone(), &config.namespace);
    let dc = deployment_configs
        .get(&config.deployment_config)
        .await
        .with_context(|| {
            format!(
                "failed to get DeploymentConfig {}/{}",
                config.namespace, config.deployment_config
            )
        })?;

    let resources = KubeResources::new(client, &config.namespace);
    let result = match migrate_deployment_config(&dc, &resources, &YamlConfigParser).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Migration failed");
            return Err(e.into());
        }
    };

    info!(
        storage = result.spec.storage.kind(),
        tls = result.spec.tls,
        "Migration complete"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
