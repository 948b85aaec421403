#![allow(clippy::unwrap_used)] // Tests can use unwrap for brevity

use super::*;

fn params(yaml: &str) -> Parameters {
    serde_yaml::from_str(yaml).unwrap()
}

#[test]
fn test_rule_receives_present_value() {
    let mut bucket = String::new();
    let mut seen_present = false;
    {
        let mut rules = RuleSet::new();
        rules.insert(
            "bucket",
            ParameterRule::string(|value, present| {
                bucket = value.to_string();
                seen_present = present;
                Ok(())
            }),
        );
        migrate_parameters(&params("bucket: images"), rules).unwrap();
    }

    assert_eq!(bucket, "images");
    assert!(seen_present);
}

#[test]
fn test_rule_invoked_for_absent_parameter() {
    let mut calls = Vec::new();
    {
        let mut rules = RuleSet::new();
        rules.insert(
            "encrypt",
            ParameterRule::bool(|value, present| {
                calls.push((value, present));
                Ok(())
            }),
        );
        migrate_parameters(&Parameters::new(), rules).unwrap();
    }

    assert_eq!(calls, vec![(false, false)]);
}

#[test]
fn test_rule_violation_is_wrapped_with_field() {
    let mut rules = RuleSet::new();
    rules.insert(
        "rootdirectory",
        ParameterRule::string(|_, present| {
            if present {
                Ok(())
            } else {
                Err("field is required".to_string())
            }
        }),
    );

    let err = migrate_parameters(&Parameters::new(), rules).unwrap_err();

    assert_eq!(
        err.to_string(),
        "failed to migrate field rootdirectory: field is required"
    );
}

#[test]
fn test_type_mismatch() {
    let mut rules = RuleSet::new();
    rules.insert("encrypt", ParameterRule::bool(|_, _| Ok(())));

    let err = migrate_parameters(&params("encrypt: \"yes\""), rules).unwrap_err();

    assert_eq!(
        err,
        ParameterError::TypeMismatch {
            field: "encrypt".to_string(),
            actual: "string",
            expected: "bool",
        }
    );
}

#[test]
fn test_number_is_not_a_string() {
    let mut rules = RuleSet::new();
    rules.insert("bucket", ParameterRule::string(|_, _| Ok(())));

    let err = migrate_parameters(&params("bucket: 42"), rules).unwrap_err();

    assert!(matches!(
        err,
        ParameterError::TypeMismatch {
            actual: "number",
            ..
        }
    ));
}

#[test]
fn test_unknown_parameter_is_rejected() {
    let mut rules = RuleSet::new();
    rules.insert("bucket", ParameterRule::string(|_, _| Ok(())));

    let err = migrate_parameters(&params("bucket: b\nbadkey: x"), rules).unwrap_err();

    assert_eq!(
        err,
        ParameterError::NoRule {
            field: "badkey".to_string()
        }
    );
    assert_eq!(err.to_string(), "no rules to migrate field badkey");
}

#[test]
fn test_unknown_parameter_wins_over_invalid_values() {
    // A rule that always fails and a mistyped value must not hide the unknown key
    let cases = [
        "bucket: 42\nzone: x",
        "zone: x\nbucket: [a, b]",
        "zone: x",
    ];

    for case in cases {
        let mut rules = RuleSet::new();
        rules.insert("bucket", ParameterRule::string(|_, _| Ok(())));
        rules.insert(
            "region",
            ParameterRule::string(|_, _| Err("always fails".to_string())),
        );

        let err = migrate_parameters(&params(case), rules).unwrap_err();

        assert_eq!(
            err,
            ParameterError::NoRule {
                field: "zone".to_string()
            },
            "case {case:?}"
        );
    }
}

#[test]
fn test_rules_run_for_every_field() {
    let mut seen = Vec::new();
    {
        let seen = std::sync::Mutex::new(&mut seen);
        let mut rules = RuleSet::new();
        for name in ["authurl", "container"] {
            let seen = &seen;
            rules.insert(
                name,
                ParameterRule::string(move |value, present| {
                    seen.lock().unwrap().push((name, value.to_string(), present));
                    Ok(())
                }),
            );
        }
        migrate_parameters(&params("container: registry"), rules).unwrap();
    }

    assert_eq!(
        seen,
        vec![
            ("authurl", String::new(), false),
            ("container", "registry".to_string(), true),
        ]
    );
}
