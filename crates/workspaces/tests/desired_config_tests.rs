//! Integration tests for desired config validation, equality and diffing.
//!
//! Fixtures are full generator outputs validated against the bundled
//! schemas, so these also pin the shape of what the generator produces.

mod common;

use common::{generate, params, workspace, DEVFILE_WITH_POST_START};
use serde_json::{json, Value};
use workspaces::desired_config::{BLANK, ROOT_NOT_AN_ARRAY};
use workspaces::{
    is_valid_actual_state, is_valid_desired_state, DesiredConfig, DesiredState, DiffSign, Error,
    SchemaRegistry,
};

fn registry() -> SchemaRegistry {
    SchemaRegistry::bundled().unwrap()
}

fn running_config() -> DesiredConfig {
    generate(
        workspace(DesiredState::Running, DEVFILE_WITH_POST_START),
        params(),
    )
    .desired_config
    .unwrap()
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn object_and_null_roots_are_not_arrays() {
    for root in [json!({}), Value::Null] {
        let err = DesiredConfig::from_value(root, &registry()).unwrap_err();
        assert_eq!(err.messages().collect::<Vec<_>>(), vec![ROOT_NOT_AN_ARRAY]);
        assert_eq!(err.to_string(), "value at root is not an array");
    }
}

#[test]
fn empty_array_is_blank() {
    let err = DesiredConfig::from_value(json!([]), &registry()).unwrap_err();
    assert_eq!(err.messages().collect::<Vec<_>>(), vec![BLANK]);
    assert_eq!(err.to_string(), "can't be blank");
}

#[test]
fn generated_config_has_eleven_valid_documents() {
    let config = running_config();
    assert_eq!(config.len(), 11);
    assert!(config.documents()[0].is("ConfigMap"));
    assert!(config.documents()[10].is("Secret"));

    let reloaded = DesiredConfig::from_value(config.to_value(), &registry()).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn extra_field_on_configmap_is_reported_by_pointer() {
    let mut value = running_config().to_value();
    value[0]["invalid-field"] = json!("x");

    let err = DesiredConfig::from_value(value, &registry()).unwrap_err();
    let paths: Vec<_> = err.paths().collect();
    assert_eq!(paths, vec!["/0/invalid-field"]);
    assert!(err.to_string().starts_with("/0/invalid-field: "));
}

#[test]
fn nested_violations_carry_full_path() {
    let mut value = running_config().to_value();
    value[10]["data"]["broken"] = json!("not base64!");
    value[1]["spec"]["replicas"] = json!(3);

    let err = DesiredConfig::from_value(value, &registry()).unwrap_err();
    let paths: Vec<_> = err.paths().collect();
    assert!(paths.contains(&"/1/spec/replicas"), "{paths:?}");
    assert!(paths.contains(&"/10/data/broken"), "{paths:?}");
}

#[test]
fn invalid_config_converts_into_crate_error() {
    let err: Error = DesiredConfig::from_value(json!([]), &registry())
        .unwrap_err()
        .into();
    assert!(matches!(err, Error::DesiredConfig(_)));
    assert_eq!(err.to_string(), "desired config is invalid: can't be blank");
}

// =============================================================================
// Equality and diff
// =============================================================================

#[test]
fn independent_runs_are_equal() {
    assert_eq!(running_config(), running_config());
}

#[test]
fn diff_with_itself_is_empty() {
    let config = running_config();
    assert!(config.diff(&config).is_empty());
    assert!(config.try_diff(&config).unwrap().is_empty());
}

#[test]
fn diff_against_other_type_names_the_type() {
    let config = running_config();
    let err = config.try_diff(&json!([])).unwrap_err();
    match err {
        Error::ArgumentType { expected, actual } => {
            assert!(expected.ends_with("DesiredConfig"));
            assert!(actual.ends_with("Value"), "{actual}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn dropping_last_secret_is_a_single_removal() {
    let first = running_config();
    let mut value = first.to_value();
    let removed = value.as_array_mut().unwrap().pop().unwrap();
    let second = DesiredConfig::from_value(value, &registry()).unwrap();

    let diff = first.diff(&second);
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].sign, DiffSign::Removed);
    assert_eq!(diff[0].path, "[10]");
    assert!(diff[0].value.is("Secret"));
    assert_eq!(diff[0].value.clone().into_value(), removed);
}

#[test]
fn stopping_a_workspace_changes_only_replica_bearing_documents() {
    let running = running_config();
    let stopped = generate(
        workspace(DesiredState::Stopped, DEVFILE_WITH_POST_START),
        params(),
    )
    .desired_config
    .unwrap();

    let diff = running.diff(&stopped);
    assert_eq!(diff.len(), 2);
    assert_eq!(diff[0].sign, DiffSign::Removed);
    assert_eq!(diff[1].sign, DiffSign::Added);
    assert_eq!(diff[0].path, "[1]");
    assert_eq!(diff[1].path, "[1]");
    assert_eq!(diff[1].value.pointer("/spec/replicas"), Some(&json!(0)));
}

#[test]
fn manifest_stream_is_reparseable() {
    let config = running_config();
    let stream = config.to_manifest_stream().unwrap();
    let documents = workspaces::create::manifest_parser::parse_manifest_stream(&stream).unwrap();
    assert_eq!(DesiredConfig::new(documents, &registry()).unwrap(), config);
}

// =============================================================================
// State membership
// =============================================================================

#[test]
fn restart_requested_is_desired_only() {
    assert!(is_valid_desired_state("RestartRequested"));
    assert!(!is_valid_actual_state("RestartRequested"));
}

#[test]
fn shared_names_are_valid_in_both_sets() {
    for state in ["Running", "Stopped", "Terminated"] {
        assert!(is_valid_desired_state(state));
        assert!(is_valid_actual_state(state));
    }
    assert!(!is_valid_desired_state("Failed"));
    assert!(is_valid_actual_state("Failed"));
    assert!(!is_valid_actual_state("running"));
}
