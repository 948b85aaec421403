//! Migration of a hand-configured image registry DeploymentConfig into the
//! declarative `ImageRegistry` spec reconciled by the operator.

pub mod crd;
pub mod migration;
pub mod settings;
