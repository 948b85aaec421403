//! Rule-driven migration of untyped storage parameters
//!
//! Every parameter must be claimed by a rule. A parameter nobody handles
//! fails the migration instead of being dropped.

use serde_yaml::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Parameters of one storage backend, as written in the registry configuration
pub type Parameters = BTreeMap<String, Value>;

/// Outcome of a single rule; the error is a human readable reason
pub type RuleResult = Result<(), String>;

type StringCheck<'a> = Box<dyn FnMut(&str, bool) -> RuleResult + Send + 'a>;
type BoolCheck<'a> = Box<dyn FnMut(bool, bool) -> RuleResult + Send + 'a>;

/// Validation and extraction step for one parameter
///
/// The check receives the value (or the zero value when absent) and whether
/// the parameter was present.
pub enum ParameterRule<'a> {
    String(StringCheck<'a>),
    Bool(BoolCheck<'a>),
}

impl<'a> ParameterRule<'a> {
    pub fn string(check: impl FnMut(&str, bool) -> RuleResult + Send + 'a) -> Self {
        ParameterRule::String(Box::new(check))
    }

    pub fn bool(check: impl FnMut(bool, bool) -> RuleResult + Send + 'a) -> Self {
        ParameterRule::Bool(Box::new(check))
    }

    fn expected_type(&self) -> &'static str {
        match self {
            ParameterRule::String(_) => "string",
            ParameterRule::Bool(_) => "bool",
        }
    }

    fn apply(&mut self, field: &str, value: Option<&Value>) -> Result<(), ParameterError> {
        let result = match (self, value) {
            (ParameterRule::String(check), None) => check("", false),
            (ParameterRule::String(check), Some(Value::String(value))) => check(value.as_str(), true),
            (ParameterRule::Bool(check), None) => check(false, false),
            (ParameterRule::Bool(check), Some(Value::Bool(value))) => check(*value, true),
            (rule, Some(value)) => {
                return Err(ParameterError::TypeMismatch {
                    field: field.to_string(),
                    actual: value_type(value),
                    expected: rule.expected_type(),
                })
            }
        };
        result.map_err(|reason| ParameterError::RuleViolation {
            field: field.to_string(),
            reason,
        })
    }
}

/// Rules of one storage backend, by parameter name
pub type RuleSet<'a> = BTreeMap<&'static str, ParameterRule<'a>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("failed to migrate field {field}: got {actual}, expected {expected}")]
    TypeMismatch {
        field: String,
        actual: &'static str,
        expected: &'static str,
    },

    #[error("failed to migrate field {field}: {reason}")]
    RuleViolation { field: String, reason: String },

    #[error("no rules to migrate field {field}")]
    NoRule { field: String },
}

pub(crate) fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Apply `rules` to `params`
///
/// Parameters without a rule are rejected before any rule runs, so an
/// unknown parameter is always reported as such. Every rule is then invoked,
/// including rules whose parameter is absent.
pub fn migrate_parameters(params: &Parameters, rules: RuleSet<'_>) -> Result<(), ParameterError> {
    if let Some(field) = params
        .keys()
        .find(|name| !rules.contains_key(name.as_str()))
    {
        return Err(ParameterError::NoRule {
            field: field.clone(),
        });
    }

    for (name, mut rule) in rules {
        rule.apply(name, params.get(name))?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "params_test.rs"]
mod tests;
