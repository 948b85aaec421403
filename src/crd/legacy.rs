//! Legacy registry workload types
//!
//! Only the parts of `apps.openshift.io/v1` DeploymentConfig that the
//! migrator reads are modelled here.

use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// DeploymentConfig runs the registry before it is adopted by the operator
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "apps.openshift.io",
    version = "v1",
    kind = "DeploymentConfig",
    namespaced
)]
pub struct DeploymentConfigSpec {
    /// Number of desired pods
    #[serde(default)]
    pub replicas: i32,

    /// Label query over pods that should match the replicas count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<BTreeMap<String, String>>,

    /// Template describes the pods that will be created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
}
