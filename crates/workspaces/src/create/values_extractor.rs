//! Derives names, labels, annotations and counts from a workspace.
//!
//! Pure: the same workspace and agent id always give the same values, which
//! keeps successive desired configs comparable.

use crate::types::Result;
use crate::workspace::Workspace;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const LABEL_AGENT_ID: &str = "agent.gitlab.com/id";
pub const LABEL_WORKSPACE_ID: &str = "workspaces.gitlab.com/id";
pub const LABEL_INVENTORY_ID: &str = "cli-utils.sigs.k8s.io/inventory-id";

pub const ANNOTATION_HOST_TEMPLATE: &str = "workspaces.gitlab.com/host-template";
pub const ANNOTATION_WORKSPACE_ID: &str = "workspaces.gitlab.com/id";
pub const ANNOTATION_MAX_RESOURCES_SHA256: &str =
    "workspaces.gitlab.com/max-resources-per-workspace-sha256";
pub const ANNOTATION_OWNING_INVENTORY: &str = "config.k8s.io/owning-inventory";
pub const ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION: &str =
    "workspaces.gitlab.com/include-in-partial-reconciliation";

/// Values shared by every stage of one generator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedValues {
    pub labels: BTreeMap<String, String>,
    pub common_annotations: BTreeMap<String, String>,
    pub common_annotations_for_partial_reconciliation: BTreeMap<String, String>,
    pub workspace_inventory_annotations: BTreeMap<String, String>,
    pub workspace_inventory_annotations_for_partial_reconciliation: BTreeMap<String, String>,
    pub secrets_inventory_annotations: BTreeMap<String, String>,
    pub replicas: u32,
    pub domain_template: String,
    pub workspace_inventory_name: String,
    pub secrets_inventory_name: String,
    pub scripts_configmap_name: String,
    pub env_secret_name: String,
    pub file_secret_name: String,
}

pub fn extract(agent_id: u64, workspace: &Workspace) -> Result<ExtractedValues> {
    let config = &workspace.workspaces_agent_config;
    let name = workspace.name.as_str();

    let workspace_inventory_name = format!("{name}-workspace-inventory");
    let secrets_inventory_name = format!("{name}-secrets-inventory");
    let domain_template = format!("{{{{.port}}}}-{name}.{}", config.dns_zone);

    let mut labels = config.labels.clone();
    labels.insert(LABEL_AGENT_ID.to_string(), agent_id.to_string());
    if config.has_shared_namespace() {
        labels.insert(LABEL_WORKSPACE_ID.to_string(), workspace.id.to_string());
    }

    let max_resources_sha256 = max_resources_sha256(workspace)?;

    let mut common_annotations = config.annotations.clone();
    common_annotations.insert(ANNOTATION_HOST_TEMPLATE.to_string(), domain_template.clone());
    common_annotations.insert(ANNOTATION_WORKSPACE_ID.to_string(), workspace.id.to_string());
    common_annotations.insert(
        ANNOTATION_MAX_RESOURCES_SHA256.to_string(),
        max_resources_sha256,
    );

    let workspace_inventory_annotations =
        with_entry(&common_annotations, ANNOTATION_OWNING_INVENTORY, &workspace_inventory_name);
    let secrets_inventory_annotations =
        with_entry(&common_annotations, ANNOTATION_OWNING_INVENTORY, &secrets_inventory_name);

    Ok(ExtractedValues {
        common_annotations_for_partial_reconciliation: for_partial_reconciliation(
            &common_annotations,
        ),
        workspace_inventory_annotations_for_partial_reconciliation: for_partial_reconciliation(
            &workspace_inventory_annotations,
        ),
        labels,
        common_annotations,
        workspace_inventory_annotations,
        secrets_inventory_annotations,
        replicas: u32::from(workspace.desired_state.is_running()),
        domain_template,
        workspace_inventory_name,
        secrets_inventory_name,
        scripts_configmap_name: format!("{name}-scripts-configmap"),
        env_secret_name: format!("{name}-env-var"),
        file_secret_name: format!("{name}-file"),
    })
}

fn with_entry(
    base: &BTreeMap<String, String>,
    key: &str,
    value: &str,
) -> BTreeMap<String, String> {
    let mut map = base.clone();
    map.insert(key.to_string(), value.to_string());
    map
}

fn for_partial_reconciliation(base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    with_entry(base, ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION, "true")
}

/// Hex sha256 of the canonical JSON of the per-workspace resource ceiling.
///
/// Any change to the ceiling changes the annotation and therefore every
/// resource, so the agent re-applies them together.
///
/// The value is stable across runs of this crate but is not byte-compatible
/// with agents that hashed a language-specific rendering of the ceiling.
/// Switching an existing agent over changes the annotation once, which
/// triggers a single re-apply of its workspaces.
fn max_resources_sha256(workspace: &Workspace) -> Result<String> {
    let canonical = match &workspace.workspaces_agent_config.max_resources_per_workspace {
        Some(max) => serde_json::to_string(max)?,
        None => "{}".to_string(),
    };
    Ok(hex::encode(Sha256::digest(canonical.as_bytes()).as_slice()))
}
