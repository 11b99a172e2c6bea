//! Hardens and wires up the Deployment the transformer produced.
//!
//! Only fields are rewritten; documents are never added or removed here.

use super::values_extractor::ExtractedValues;
use crate::config::WorkspacesAgentConfig;
use crate::document::ResourceDocument;
use crate::types::Result;
use serde_json::{json, Map, Value};

pub const VARIABLES_VOLUME_NAME: &str = "gl-workspace-variables";
pub const VARIABLES_VOLUME_PATH: &str = "/.workspace-data/variables/file";
pub const VARIABLES_VOLUME_DEFAULT_MODE: u32 = 0o774;
pub const RUN_AS_USER: i64 = 5001;

pub fn modify_devfile_resources(
    documents: Vec<ResourceDocument>,
    workspace_name: &str,
    config: &WorkspacesAgentConfig,
    values: &ExtractedValues,
) -> Result<Vec<ResourceDocument>> {
    let default_resources = config
        .default_resources_per_workspace_container
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;

    Ok(documents
        .into_iter()
        .map(|mut document| {
            if document.is("Deployment") {
                if let Some(Value::Object(pod_spec)) = document.pointer_mut("/spec/template/spec") {
                    modify_pod_spec(
                        pod_spec,
                        workspace_name,
                        config,
                        values,
                        default_resources.as_ref(),
                    );
                }
            }
            document
        })
        .collect())
}

fn modify_pod_spec(
    pod_spec: &mut Map<String, Value>,
    workspace_name: &str,
    config: &WorkspacesAgentConfig,
    values: &ExtractedValues,
    default_resources: Option<&Value>,
) {
    for key in ["containers", "initContainers"] {
        if let Some(Value::Array(containers)) = pod_spec.get_mut(key) {
            for container in containers.iter_mut().filter_map(Value::as_object_mut) {
                modify_container(container, config, values, default_resources);
            }
        }
    }

    push_entry(
        pod_spec,
        "volumes",
        json!({
            "name": VARIABLES_VOLUME_NAME,
            "projected": {
                "defaultMode": VARIABLES_VOLUME_DEFAULT_MODE,
                "sources": [{"secret": {"name": values.file_secret_name}}]
            }
        }),
    );

    pod_spec.insert(
        "securityContext".to_string(),
        json!({
            "fsGroup": 0,
            "fsGroupChangePolicy": "OnRootMismatch",
            "runAsNonRoot": true,
            "runAsUser": RUN_AS_USER
        }),
    );
    pod_spec.insert("serviceAccountName".to_string(), json!(workspace_name));
    if !config.default_runtime_class.is_empty() {
        pod_spec.insert(
            "runtimeClassName".to_string(),
            json!(config.default_runtime_class),
        );
    }
    if config.use_kubernetes_user_namespaces {
        pod_spec.insert("hostUsers".to_string(), json!(true));
    }
}

fn modify_container(
    container: &mut Map<String, Value>,
    config: &WorkspacesAgentConfig,
    values: &ExtractedValues,
    default_resources: Option<&Value>,
) {
    push_entry(
        container,
        "envFrom",
        json!({"secretRef": {"name": values.env_secret_name}}),
    );
    push_entry(
        container,
        "volumeMounts",
        json!({"name": VARIABLES_VOLUME_NAME, "mountPath": VARIABLES_VOLUME_PATH}),
    );
    container.insert(
        "securityContext".to_string(),
        json!({
            "allowPrivilegeEscalation": config.allow_privilege_escalation,
            "privileged": false,
            "runAsNonRoot": true,
            "runAsUser": RUN_AS_USER
        }),
    );

    if let Some(defaults) = default_resources {
        let mut resources = defaults.clone();
        if let Some(own) = container.get("resources") {
            deep_merge(&mut resources, own);
        }
        container.insert("resources".to_string(), resources);
    }
}

/// Append `item` to the array at `map[key]`, creating the array if absent.
pub(crate) fn push_entry(map: &mut Map<String, Value>, key: &str, item: Value) {
    match map.get_mut(key) {
        Some(Value::Array(items)) => items.push(item),
        _ => {
            map.insert(key.to_string(), Value::Array(vec![item]));
        }
    }
}

/// Merge `overlay` into `base`, with `overlay` winning on conflicts.
fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResourceQuantities, ResourceRequirements};
    use crate::create::values_extractor;
    use crate::states::{ActualState, DesiredState};
    use crate::workspace::Workspace;

    fn deployment() -> ResourceDocument {
        ResourceDocument::try_from(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "ws", "namespace": "ns"},
            "spec": {
                "replicas": 1,
                "template": {
                    "spec": {
                        "containers": [
                            {"name": "tooling", "image": "udi", "volumeMounts": [{"name": "data", "mountPath": "/projects"}]},
                            {"name": "sidecar", "image": "sc", "resources": {"limits": {"memory": "2Gi"}}}
                        ],
                        "initContainers": [{"name": "init", "image": "udi"}],
                        "volumes": [{"name": "data", "persistentVolumeClaim": {"claimName": "ws-data"}}]
                    }
                }
            }
        }))
        .unwrap()
    }

    fn config() -> WorkspacesAgentConfig {
        WorkspacesAgentConfig {
            dns_zone: "example.dev".to_string(),
            default_runtime_class: "standard".to_string(),
            default_resources_per_workspace_container: Some(ResourceRequirements {
                limits: ResourceQuantities {
                    cpu: "1".to_string(),
                    memory: "1Gi".to_string(),
                },
                requests: ResourceQuantities {
                    cpu: "0.5".to_string(),
                    memory: "512Mi".to_string(),
                },
            }),
            ..WorkspacesAgentConfig::default()
        }
    }

    fn modified(config: &WorkspacesAgentConfig) -> ResourceDocument {
        let workspace = Workspace {
            id: 7,
            name: "ws".to_string(),
            namespace: "ns".to_string(),
            desired_state: DesiredState::Running,
            actual_state: ActualState::CreationRequested,
            processed_devfile: String::new(),
            workspaces_agent_config: config.clone(),
            variables: Vec::new(),
        };
        let values = values_extractor::extract(1, &workspace).unwrap();
        let mut documents =
            modify_devfile_resources(vec![deployment()], "ws", config, &values).unwrap();
        documents.remove(0)
    }

    #[test]
    fn pod_spec_is_hardened() {
        let doc = modified(&config());
        let pod = doc.pointer("/spec/template/spec").unwrap();
        assert_eq!(pod["serviceAccountName"], json!("ws"));
        assert_eq!(pod["runtimeClassName"], json!("standard"));
        assert_eq!(pod["securityContext"]["runAsUser"], json!(5001));
        assert_eq!(pod["securityContext"]["fsGroupChangePolicy"], json!("OnRootMismatch"));
        assert!(pod.get("hostUsers").is_none());
    }

    #[test]
    fn variables_volume_is_added_and_mounted_everywhere() {
        let doc = modified(&config());
        let pod = doc.pointer("/spec/template/spec").unwrap();
        let volumes = pod["volumes"].as_array().unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[1]["projected"]["defaultMode"], json!(0o774));
        assert_eq!(volumes[1]["projected"]["sources"][0]["secret"]["name"], json!("ws-file"));

        for pointer in ["/containers/0", "/containers/1", "/initContainers/0"] {
            let container = pod.pointer(pointer).unwrap();
            let mounts = container["volumeMounts"].as_array().unwrap();
            assert_eq!(mounts.last().unwrap()["mountPath"], json!(VARIABLES_VOLUME_PATH));
            assert_eq!(container["envFrom"][0]["secretRef"]["name"], json!("ws-env-var"));
            assert_eq!(container["securityContext"]["allowPrivilegeEscalation"], json!(false));
        }
    }

    #[test]
    fn container_resources_overlay_defaults() {
        let doc = modified(&config());
        let pod = doc.pointer("/spec/template/spec").unwrap();
        assert_eq!(
            pod["containers"][0]["resources"],
            json!({"limits": {"cpu": "1", "memory": "1Gi"}, "requests": {"cpu": "0.5", "memory": "512Mi"}})
        );
        assert_eq!(
            pod["containers"][1]["resources"],
            json!({"limits": {"cpu": "1", "memory": "2Gi"}, "requests": {"cpu": "0.5", "memory": "512Mi"}})
        );
    }

    #[test]
    fn default_resources_reach_init_containers() {
        let config = config();
        let values = ExtractedValues::default();
        let documents =
            modify_devfile_resources(vec![deployment()], "ws", &config, &values).unwrap();
        assert_eq!(
            documents[0].pointer("/spec/template/spec/initContainers/0/resources"),
            Some(&json!({"limits": {"cpu": "1", "memory": "1Gi"}, "requests": {"cpu": "0.5", "memory": "512Mi"}}))
        );
    }

    #[test]
    fn optional_pod_settings_follow_config() {
        let config = WorkspacesAgentConfig {
            default_runtime_class: String::new(),
            use_kubernetes_user_namespaces: true,
            default_resources_per_workspace_container: None,
            ..config()
        };
        let doc = modified(&config);
        let pod = doc.pointer("/spec/template/spec").unwrap();
        assert!(pod.get("runtimeClassName").is_none());
        assert_eq!(pod["hostUsers"], json!(true));
        assert!(pod["containers"][0].get("resources").is_none());
    }

    #[test]
    fn other_kinds_are_untouched() {
        let service = ResourceDocument::try_from(json!({"kind": "Service", "metadata": {"name": "ws"}})).unwrap();
        let config = config();
        let workspace_values = ExtractedValues::default();
        let documents =
            modify_devfile_resources(vec![service.clone()], "ws", &config, &workspace_values)
                .unwrap();
        assert_eq!(documents, vec![service]);
    }
}
