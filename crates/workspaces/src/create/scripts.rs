//! Post-start command scripts: the scripts ConfigMap, the run scripts it
//! carries, and the container lifecycle hook that launches them.

use super::devfile::{PostStartCommand, ProcessedDevfile};
use super::scripts_volume::{ScriptsVolumeInserter, SCRIPTS_VOLUME_PATH};
use super::values_extractor::ExtractedValues;
use crate::document::{metadata, ResourceDocument};
use crate::types::{Error, Result};
use serde_json::{json, Map, Value};
use tracing::debug;

pub const RUN_INTERNAL_BLOCKING_POSTSTART_COMMANDS_SCRIPT: &str =
    "gl-run-internal-blocking-poststart-commands.sh";
pub const RUN_NON_BLOCKING_POSTSTART_COMMANDS_SCRIPT: &str =
    "gl-run-non-blocking-poststart-commands.sh";
pub const RUN_POSTSTART_COMMANDS_SCRIPT: &str = "gl-run-poststart-commands.sh";

const BLOCKING_POSTSTART_HOOK: &str = r##"#!/bin/sh

mkdir -p "${GL_WORKSPACE_LOGS_DIR}"
ln -sf "${GL_WORKSPACE_LOGS_DIR}" /tmp

{
    echo "$(date -Iseconds): ----------------------------------------"
    echo "$(date -Iseconds): Running poststart commands for workspace..."

    echo "$(date -Iseconds): ----------------------------------------"
    echo "$(date -Iseconds): Running internal blocking poststart commands script..."
} >> "${GL_WORKSPACE_LOGS_DIR}/poststart-stdout.log"

"/workspace-scripts/gl-run-internal-blocking-poststart-commands.sh" 1>>"${GL_WORKSPACE_LOGS_DIR}/poststart-stdout.log" 2>>"${GL_WORKSPACE_LOGS_DIR}/poststart-stderr.log"

{
    echo "$(date -Iseconds): ----------------------------------------"
    echo "$(date -Iseconds): Running non-blocking poststart commands script..."
} >> "${GL_WORKSPACE_LOGS_DIR}/poststart-stdout.log"

"/workspace-scripts/gl-run-non-blocking-poststart-commands.sh" 1>>"${GL_WORKSPACE_LOGS_DIR}/poststart-stdout.log" 2>>"${GL_WORKSPACE_LOGS_DIR}/poststart-stderr.log" &
"##;

const LEGACY_POSTSTART_HOOK: &str = r##"#!/bin/sh

mkdir -p "${GL_WORKSPACE_LOGS_DIR}"
ln -sf "${GL_WORKSPACE_LOGS_DIR}" /tmp
"/workspace-scripts/gl-run-poststart-commands.sh" 1>>"${GL_WORKSPACE_LOGS_DIR}/poststart-stdout.log" 2>>"${GL_WORKSPACE_LOGS_DIR}/poststart-stderr.log"
"##;

/// Append the scripts ConfigMap and wire the scripts volume and post-start
/// hooks into the Deployment. A devfile without post-start events leaves
/// `documents` unchanged.
pub fn append_scripts_resources(
    mut documents: Vec<ResourceDocument>,
    devfile: &ProcessedDevfile,
    namespace: &str,
    values: &ExtractedValues,
) -> Result<Vec<ResourceDocument>> {
    if !devfile.has_post_start_events() {
        return Ok(documents);
    }
    let commands = devfile.post_start_commands();

    documents.push(scripts_configmap(
        &values.scripts_configmap_name,
        namespace,
        values,
        &commands,
    ));

    let pod_spec = documents
        .iter_mut()
        .find(|document| document.is("Deployment"))
        .and_then(|deployment| deployment.pointer_mut("/spec/template/spec"))
        .and_then(Value::as_object_mut)
        .ok_or(Error::MissingResource("Deployment"))?;

    let volumes = take_array(pod_spec, "volumes");
    let containers = take_array(pod_spec, "containers");
    let (volumes, mut collections) = ScriptsVolumeInserter::new(&values.scripts_configmap_name)
        .insert(volumes, vec![containers])?;
    let mut containers = collections.pop().unwrap_or_default();
    insert_poststart_hooks(&mut containers, &commands);

    pod_spec.insert("volumes".to_string(), Value::Array(volumes));
    pod_spec.insert("containers".to_string(), Value::Array(containers));

    debug!(
        configmap = %values.scripts_configmap_name,
        commands = commands.len(),
        "Appended post-start scripts resources"
    );
    Ok(documents)
}

fn take_array(map: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match map.get_mut(key) {
        Some(Value::Array(items)) => std::mem::take(items),
        _ => Vec::new(),
    }
}

#[must_use]
pub fn scripts_configmap(
    name: &str,
    namespace: &str,
    values: &ExtractedValues,
    commands: &[PostStartCommand<'_>],
) -> ResourceDocument {
    let mut data = Map::new();
    for command in commands {
        data.insert(
            command.id.to_string(),
            Value::from(command.exec.command_line.as_str()),
        );
    }
    for (key, script) in run_scripts(commands) {
        data.insert(key.to_string(), Value::from(script));
    }

    ResourceDocument::new(
        "v1",
        "ConfigMap",
        metadata(
            name,
            namespace,
            &values.labels,
            &values.workspace_inventory_annotations_for_partial_reconciliation,
        ),
    )
    .with_field("data", Value::Object(data))
}

fn is_blocking_mode(commands: &[PostStartCommand<'_>]) -> bool {
    commands.iter().any(|command| command.exec.is_internal_blocking())
}

/// The run scripts keyed by their file name under the scripts volume.
#[must_use]
pub fn run_scripts(commands: &[PostStartCommand<'_>]) -> Vec<(&'static str, String)> {
    if !is_blocking_mode(commands) {
        return vec![(RUN_POSTSTART_COMMANDS_SCRIPT, run_script(commands.iter()))];
    }

    let (blocking, non_blocking): (Vec<_>, Vec<_>) = commands
        .iter()
        .partition(|command| command.exec.is_internal_blocking());
    vec![
        (
            RUN_INTERNAL_BLOCKING_POSTSTART_COMMANDS_SCRIPT,
            run_script(blocking.into_iter()),
        ),
        (
            RUN_NON_BLOCKING_POSTSTART_COMMANDS_SCRIPT,
            run_script(non_blocking.into_iter()),
        ),
    ]
}

fn run_script<'a, 'b: 'a>(commands: impl Iterator<Item = &'a PostStartCommand<'b>>) -> String {
    let mut script = String::from("#!/bin/sh\n");
    for command in commands {
        let path = format!("{SCRIPTS_VOLUME_PATH}/{}", command.id);
        script.push_str("echo \"$(date -Iseconds): ----------------------------------------\"\n");
        script.push_str(&format!("echo \"$(date -Iseconds): Running {path}...\"\n"));
        script.push_str(&format!("{path} || true\n"));
        script.push_str(&format!("echo \"$(date -Iseconds): Finished running {path}.\"\n"));
    }
    script
}

/// Add a `lifecycle.postStart` exec hook to every container that is the
/// component of a post-start command.
pub fn insert_poststart_hooks(containers: &mut [Value], commands: &[PostStartCommand<'_>]) {
    let hook = if is_blocking_mode(commands) {
        BLOCKING_POSTSTART_HOOK
    } else {
        LEGACY_POSTSTART_HOOK
    };

    for container in containers.iter_mut().filter_map(Value::as_object_mut) {
        let Some(name) = container.get("name").and_then(Value::as_str) else {
            continue;
        };
        if !commands.iter().any(|command| command.exec.component == name) {
            continue;
        }
        container.insert(
            "lifecycle".to_string(),
            json!({"postStart": {"exec": {"command": ["/bin/sh", "-c", hook]}}}),
        );
    }
}
