//! Registry configuration file model and parser
//!
//! The registry reads a YAML file and lets `REGISTRY_*` environment
//! variables override any setting. Variables reach the parser through an
//! `EnvironmentOverlay` rather than the process environment, so parsing has
//! no process-wide side effects and migrations may run concurrently.

use super::duration::parse_go_duration;
use super::params::{value_type, Parameters};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Prefix of environment variables overriding configuration settings
pub const ENV_PREFIX: &str = "REGISTRY_";

/// Variable naming the configuration file; never an override
pub const CONFIGURATION_PATH_ENV: &str = "REGISTRY_CONFIGURATION_PATH";

/// Fallback for `openshift.server.addr`
pub const DEFAULT_REGISTRY_ENV: &str = "OPENSHIFT_DEFAULT_REGISTRY";

/// Top-level sections environment overrides may target
const MODELLED_SECTIONS: [&str; 3] = ["storage", "http", "openshift"];

/// Storage sections configuring the registry rather than naming a backend
pub const RESERVED_STORAGE_SECTIONS: [&str; 4] = ["cache", "delete", "maintenance", "redirect"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid registry configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("registry configuration must be a YAML mapping")]
    NotAMapping,

    #[error("unable to apply environment variable {name}: {reason}")]
    Override { name: String, reason: String },

    #[error("storage section {0:?} must be a mapping")]
    InvalidStorageSection(String),

    #[error("no storage backend configured")]
    NoStorage,

    #[error("multiple storage backends configured: {0}")]
    MultipleStorage(String),
}

/// Environment variables handed to the configuration parser
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvironmentOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Set `name` unless it already has a value; returns whether it was set
    pub fn set_default(&mut self, name: &str, value: &str) -> bool {
        if self.vars.contains_key(name) {
            return false;
        }
        self.set(name, value);
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Configuration overrides as (variable, lowercase path) pairs
    ///
    /// Sorted by variable name, so `REGISTRY_STORAGE` precedes the
    /// parameters of the backend it selects.
    fn overrides(&self) -> impl Iterator<Item = (&str, Vec<String>, &str)> {
        self.iter().filter_map(|(name, value)| {
            if name == CONFIGURATION_PATH_ENV {
                return None;
            }
            let path = name.strip_prefix(ENV_PREFIX)?;
            if path.is_empty() {
                return None;
            }
            let segments = path.split('_').map(str::to_lowercase).collect();
            Some((name, segments, value))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentOverlay {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        EnvironmentOverlay {
            vars: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Parsed registry configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryConfiguration {
    pub storage: StorageSection,
    pub http: HttpSection,
    pub openshift: OpenShiftSection,
}

/// The `storage` section: backend and auxiliary sections by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageSection {
    sections: BTreeMap<String, Parameters>,
}

impl StorageSection {
    /// Name of the configured backend, e.g. `s3`
    pub fn storage_type(&self) -> Result<&str, ConfigError> {
        let backends: Vec<&str> = self
            .sections
            .keys()
            .map(String::as_str)
            .filter(|name| !RESERVED_STORAGE_SECTIONS.contains(name))
            .collect();
        match backends.as_slice() {
            [] => Err(ConfigError::NoStorage),
            [backend] => Ok(*backend),
            backends => Err(ConfigError::MultipleStorage(backends.join(", "))),
        }
    }

    /// Parameters of the configured backend
    pub fn parameters(&self) -> Result<&Parameters, ConfigError> {
        let backend = self.storage_type()?;
        self.sections
            .get(backend)
            .ok_or(ConfigError::NoStorage)
    }

    pub fn section(&self, name: &str) -> Option<&Parameters> {
        self.sections.get(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    #[serde(deserialize_with = "quoted_string")]
    pub addr: String,
    #[serde(deserialize_with = "quoted_string")]
    pub net: String,
    #[serde(deserialize_with = "quoted_string")]
    pub secret: String,
    pub tls: TlsSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TlsSection {
    #[serde(deserialize_with = "quoted_string")]
    pub certificate: String,
    #[serde(deserialize_with = "quoted_string")]
    pub key: String,
    #[serde(rename = "clientcas")]
    pub client_cas: Vec<String>,
    pub letsencrypt: LetsEncryptSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LetsEncryptSection {
    #[serde(rename = "cachefile", deserialize_with = "quoted_string")]
    pub cache_file: String,
    #[serde(deserialize_with = "quoted_string")]
    pub email: String,
}

/// OpenShift extension of the registry configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OpenShiftSection {
    pub server: ServerSection,
    pub requests: RequestsSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    #[serde(deserialize_with = "quoted_string")]
    pub addr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestsSection {
    pub read: RequestLimitsSection,
    pub write: RequestLimitsSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestLimitsSection {
    #[serde(rename = "maxrunning")]
    pub max_running: i32,
    #[serde(rename = "maxinqueue")]
    pub max_in_queue: i32,
    #[serde(rename = "maxwaitinqueue", deserialize_with = "go_duration")]
    pub max_wait_in_queue: Duration,
}

/// Top-level sections other than `storage`; unknown sections are ignored
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sections {
    http: HttpSection,
    openshift: OpenShiftSection,
}

/// String settings must be written as strings
///
/// An unquoted `0x1F` or `1e3` has already lost its original text once
/// parsed as a number, so it is rejected rather than re-rendered.
fn quoted_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!(
            "expected a quoted string, got {} {}",
            value_type(&other),
            serde_yaml::to_string(&other).unwrap_or_default().trim_end()
        ))),
    }
}

fn go_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(nanos) => nanos
            .as_u64()
            .map(Duration::from_nanos)
            .ok_or_else(|| D::Error::custom(format!("invalid duration {nanos}"))),
        Value::String(value) => parse_go_duration(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid duration {value:?}"))),
        Value::Null => Ok(Duration::ZERO),
        other => Err(D::Error::custom(format!(
            "expected a duration, got {other:?}"
        ))),
    }
}

/// Parses registry configuration files
///
/// Production code uses `YamlConfigParser`; the seam lets callers plug in
/// the registry's own parser.
pub trait ConfigParser: Send + Sync {
    fn parse(
        &self,
        content: &[u8],
        env: &EnvironmentOverlay,
    ) -> Result<RegistryConfiguration, ConfigError>;
}

/// YAML parser applying `REGISTRY_*` overrides from the overlay
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlConfigParser;

impl ConfigParser for YamlConfigParser {
    fn parse(
        &self,
        content: &[u8],
        env: &EnvironmentOverlay,
    ) -> Result<RegistryConfiguration, ConfigError> {
        let document: Value = if content.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_yaml::from_slice(content)?
        };
        let mut root = match document {
            Value::Null => Mapping::new(),
            Value::Mapping(root) => root,
            _ => return Err(ConfigError::NotAMapping),
        };

        for (name, path, value) in env.overrides() {
            let modelled = path
                .first()
                .is_some_and(|section| MODELLED_SECTIONS.contains(&section.as_str()));
            if !modelled {
                debug!(variable = name, "Ignoring environment variable for unmodelled setting");
                continue;
            }
            apply_override(&mut root, name, &path, value)?;
        }

        let storage = match root.remove("storage") {
            Some(storage) => parse_storage(storage)?,
            None => StorageSection::default(),
        };
        strip_nulls(&mut root);
        let sections: Sections = serde_yaml::from_value(Value::Mapping(root))?;

        let mut openshift = sections.openshift;
        if openshift.server.addr.is_empty() {
            if let Some(addr) = env.get(DEFAULT_REGISTRY_ENV) {
                openshift.server.addr = addr.to_string();
            }
        }

        storage.storage_type()?;

        Ok(RegistryConfiguration {
            storage,
            http: sections.http,
            openshift,
        })
    }
}

/// Settings whose override value is taken verbatim
///
/// Every `http` setting except `clientcas` and the OpenShift server address
/// are strings, so `REGISTRY_HTTP_SECRET=1e3` stays `"1e3"`.
fn is_string_setting(path: &[String]) -> bool {
    match path {
        [section, .., leaf] if section == "http" => leaf != "clientcas",
        [section, group, ..] if section == "openshift" && group == "server" => true,
        _ => false,
    }
}

/// Override values for typed settings are YAML scalars, so `true` is a bool
/// and `10` a number
fn parse_override_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    serde_yaml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Key of `node` matching `key` case-insensitively, or `key` itself
fn find_key(node: &Mapping, key: &str) -> Value {
    node.iter()
        .map(|(existing, _)| existing)
        .find(|existing| {
            existing
                .as_str()
                .is_some_and(|existing| existing.eq_ignore_ascii_case(key))
        })
        .cloned()
        .unwrap_or_else(|| Value::String(key.to_string()))
}

fn child_mapping<'m>(
    node: &'m mut Mapping,
    key: &str,
    name: &str,
) -> Result<&'m mut Mapping, ConfigError> {
    let key = find_key(node, key);
    let child = node
        .entry(key.clone())
        .or_insert(Value::Mapping(Mapping::new()));
    if child.is_null() {
        *child = Value::Mapping(Mapping::new());
    }
    child
        .as_mapping_mut()
        .ok_or_else(|| ConfigError::Override {
            name: name.to_string(),
            reason: format!("{} is not a mapping", key.as_str().unwrap_or("setting")),
        })
}

fn apply_override(
    root: &mut Mapping,
    name: &str,
    path: &[String],
    raw: &str,
) -> Result<(), ConfigError> {
    match path {
        // REGISTRY_STORAGE=<type> selects a backend and drops the others
        [section] if section == "storage" => {
            let storage = child_mapping(root, section, name)?;
            let kept: Mapping = std::mem::take(storage)
                .into_iter()
                .filter(|(key, _)| {
                    key.as_str()
                        .is_some_and(|key| RESERVED_STORAGE_SECTIONS.contains(&key))
                })
                .collect();
            *storage = kept;
            storage.insert(
                Value::String(raw.to_lowercase()),
                Value::Mapping(Mapping::new()),
            );
        }
        // Backend parameters are a flat map, the rest of the name is the key
        [section, backend, parameter @ ..]
            if section == "storage"
                && !parameter.is_empty()
                && !RESERVED_STORAGE_SECTIONS.contains(&backend.as_str()) =>
        {
            let storage = child_mapping(root, section, name)?;
            let params = child_mapping(storage, backend, name)?;
            params.insert(
                Value::String(parameter.join("_")),
                parse_override_value(raw),
            );
        }
        [parents @ .., leaf] => {
            let mut node = root;
            for segment in parents {
                node = child_mapping(node, segment, name)?;
            }
            let key = find_key(node, leaf);
            let value = if is_string_setting(path) {
                Value::String(raw.to_string())
            } else {
                parse_override_value(raw)
            };
            node.insert(key, value);
        }
        [] => {}
    }
    Ok(())
}

/// Settings written without a value count as absent
fn strip_nulls(node: &mut Mapping) {
    let taken = std::mem::take(node);
    *node = taken
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, mut value)| {
            if let Value::Mapping(child) = &mut value {
                strip_nulls(child);
            }
            (key, value)
        })
        .collect();
}

fn parse_storage(storage: Value) -> Result<StorageSection, ConfigError> {
    let storage = match storage {
        Value::Mapping(storage) => storage,
        _ => return Err(ConfigError::InvalidStorageSection("storage".to_string())),
    };

    let mut sections = BTreeMap::new();
    for (key, value) in storage {
        let name = key
            .as_str()
            .ok_or_else(|| ConfigError::InvalidStorageSection(format!("{key:?}")))?
            .to_string();
        let params: Parameters = match value {
            Value::Mapping(_) => serde_yaml::from_value(value)?,
            Value::Null => Parameters::new(),
            _ => return Err(ConfigError::InvalidStorageSection(name)),
        };
        sections.insert(name, params);
    }

    Ok(StorageSection { sections })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
