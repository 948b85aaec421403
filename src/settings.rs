//! Settings for the `registry-migrator` binary

/// Namespace of the legacy DeploymentConfig
pub const NAMESPACE_ENV: &str = "MIGRATOR_NAMESPACE";

/// Name of the legacy DeploymentConfig
pub const DEPLOYMENT_CONFIG_ENV: &str = "MIGRATOR_DEPLOYMENT_CONFIG";

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_DEPLOYMENT_CONFIG: &str = "docker-registry";

/// Which legacy deployment to migrate
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigratorConfig {
    pub namespace: String,
    pub deployment_config: String,
}

impl MigratorConfig {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; unset or empty values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str, default: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        MigratorConfig {
            namespace: read(NAMESPACE_ENV, DEFAULT_NAMESPACE),
            deployment_config: read(DEPLOYMENT_CONFIG_ENV, DEFAULT_DEPLOYMENT_CONFIG),
        }
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
