//! Builders for the resources the generator adds next to the
//! transformer output.

use super::values_extractor::{LABEL_INVENTORY_ID, LABEL_WORKSPACE_ID};
use crate::config::{ImagePullSecret, WorkspacesAgentConfig};
use crate::document::{metadata, ResourceDocument};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Secret file holding the actual state the desired config was computed for.
pub const RECONCILED_ACTUAL_STATE_FILE_NAME: &str = "gl_workspace_reconciled_actual_state.txt";

const KUBE_SYSTEM_NAMESPACE: &str = "kube-system";
const WORKSPACES_PROXY_APP_NAME: &str = "gitlab-workspaces-proxy";
const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";

/// Inventory ConfigMap. It also labels itself with its own inventory id.
#[must_use]
pub fn inventory_configmap(
    name: &str,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> ResourceDocument {
    let mut labels = labels.clone();
    labels.insert(LABEL_INVENTORY_ID.to_string(), name.to_string());
    ResourceDocument::new("v1", "ConfigMap", metadata(name, namespace, &labels, annotations))
}

#[must_use]
pub fn image_pull_secrets_service_account(
    name: &str,
    namespace: &str,
    image_pull_secrets: &[ImagePullSecret],
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> ResourceDocument {
    let secrets: Vec<Value> = image_pull_secrets
        .iter()
        .map(|secret| json!({"name": secret.name}))
        .collect();

    ResourceDocument::new("v1", "ServiceAccount", metadata(name, namespace, labels, annotations))
        .with_field("automountServiceAccountToken", json!(false))
        .with_field("imagePullSecrets", Value::Array(secrets))
}

/// Workspace NetworkPolicy, or `None` when policies are disabled.
///
/// Ingress is limited to the workspaces proxy. Egress allows DNS to
/// kube-system plus each configured CIDR rule. In a shared namespace the
/// policy selects only this workspace's pods.
#[must_use]
pub fn network_policy(
    name: &str,
    namespace: &str,
    config: &WorkspacesAgentConfig,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> Option<ResourceDocument> {
    if !config.network_policy_enabled {
        return None;
    }

    let mut egress = vec![json!({
        "ports": [{"port": 53, "protocol": "TCP"}, {"port": 53, "protocol": "UDP"}],
        "to": [{"namespaceSelector": {"matchLabels": {NAMESPACE_NAME_LABEL: KUBE_SYSTEM_NAMESPACE}}}]
    })];
    egress.extend(config.network_policy_egress.iter().map(|rule| {
        json!({"to": [{"ipBlock": {"cidr": rule.allow, "except": rule.except}}]})
    }));

    let ingress = json!([{
        "from": [{
            "namespaceSelector": {
                "matchLabels": {NAMESPACE_NAME_LABEL: config.gitlab_workspaces_proxy_namespace}
            },
            "podSelector": {
                "matchLabels": {"app.kubernetes.io/name": WORKSPACES_PROXY_APP_NAME}
            }
        }]
    }]);

    let mut pod_selector = json!({});
    if let Some(workspace_id) = labels.get(LABEL_WORKSPACE_ID) {
        pod_selector["matchLabels"] = json!({ LABEL_WORKSPACE_ID: workspace_id });
    }

    Some(
        ResourceDocument::new(
            "networking.k8s.io/v1",
            "NetworkPolicy",
            metadata(name, namespace, labels, annotations),
        )
        .with_field(
            "spec",
            json!({
                "egress": egress,
                "ingress": ingress,
                "podSelector": pod_selector,
                "policyTypes": ["Ingress", "Egress"]
            }),
        ),
    )
}

/// ResourceQuota capping the whole workspace namespace.
///
/// Skipped when no ceiling is configured or when workspaces share a
/// namespace, where a quota would cap every workspace together.
#[must_use]
pub fn resource_quota(
    name: &str,
    namespace: &str,
    config: &WorkspacesAgentConfig,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> Option<ResourceDocument> {
    if config.has_shared_namespace() {
        return None;
    }
    let max = config.max_resources_per_workspace.as_ref()?;

    Some(
        ResourceDocument::new("v1", "ResourceQuota", metadata(name, namespace, labels, annotations))
            .with_field(
                "spec",
                json!({
                    "hard": {
                        "limits.cpu": max.limits.cpu,
                        "limits.memory": max.limits.memory,
                        "requests.cpu": max.requests.cpu,
                        "requests.memory": max.requests.memory
                    }
                }),
            ),
    )
}

/// Secret with base64-encoded `data`. Empty `data` yields `data: {}`.
#[must_use]
pub fn secret<'a>(
    name: &str,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
    data: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> ResourceDocument {
    let data: Map<String, Value> = data
        .into_iter()
        .map(|(key, value)| (key.to_string(), Value::from(STANDARD.encode(value))))
        .collect();

    ResourceDocument::new("v1", "Secret", metadata(name, namespace, labels, annotations))
        .with_field("data", Value::Object(data))
}
