//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use workspaces::config::{ImagePullSecret, ResourceQuantities, ResourceRequirements};
use workspaces::{
    ActualState, DesiredConfigGenerator, DesiredState, DevfileTransformer, ParentContext, Params,
    SchemaRegistry, TransformArgs, TransformerError, VariableType, Workspace, WorkspaceVariable,
    WorkspacesAgentConfig,
};

pub const AGENT_ID: u64 = 991;

pub const DEVFILE_WITH_POST_START: &str = r#"
schemaVersion: 2.2.0
components:
  - name: tooling-container
    attributes:
      gl/inject-editor: true
    container:
      image: quay.io/mloriedo/universal-developer-image:ubi8-dw-demo
commands:
  - id: gl-clone-project-command
    exec:
      commandLine: "git clone https://gitlab.example.com/test-group/project.git /projects/project"
      component: tooling-container
      label: gl-internal-blocking
  - id: gl-start-sshd-command
    exec:
      commandLine: "/usr/sbin/sshd -D"
      component: tooling-container
events:
  postStart:
    - gl-clone-project-command
    - gl-start-sshd-command
"#;

pub const DEVFILE_WITHOUT_POST_START: &str = r#"
schemaVersion: 2.2.0
components:
  - name: tooling-container
    container:
      image: quay.io/mloriedo/universal-developer-image:ubi8-dw-demo
"#;

// =============================================================================
// Fake devfile transformer
// =============================================================================

/// Stands in for the external transformer binary.
///
/// Emits a Deployment, Service and PersistentVolumeClaim built from the
/// arguments it receives, the way the real tool does for a single-component
/// devfile.
#[derive(Default)]
pub struct FakeTransformer {
    calls: AtomicUsize,
    last_args: Mutex<Option<TransformArgs>>,
    failure: Option<String>,
}

impl FakeTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transformer that rejects every devfile with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_args(&self) -> Option<TransformArgs> {
        self.last_args.lock().unwrap().clone()
    }
}

impl DevfileTransformer for FakeTransformer {
    fn transform(&self, args: &TransformArgs) -> Result<String, TransformerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_args.lock().unwrap() = Some(args.clone());

        if let Some(message) = &self.failure {
            return Err(TransformerError::ToolFailure {
                workspace: args.name.clone(),
                message: message.clone(),
            });
        }

        let labels: BTreeMap<String, String> = serde_yaml::from_str(&args.labels_yaml).unwrap();
        let annotations: BTreeMap<String, String> =
            serde_yaml::from_str(&args.annotations_yaml).unwrap();

        let documents = [
            deployment(args, &labels, &annotations),
            service(args, &labels, &annotations),
            persistent_volume_claim(args, &labels, &annotations),
        ];
        let mut stream = String::new();
        for document in &documents {
            stream.push_str("---\n");
            stream.push_str(&serde_yaml::to_string(document).unwrap());
        }
        Ok(stream)
    }
}

fn object_meta(
    name: &str,
    args: &TransformArgs,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> Value {
    json!({
        "annotations": annotations,
        "creationTimestamp": null,
        "labels": labels,
        "name": name,
        "namespace": args.namespace,
    })
}

fn deployment(
    args: &TransformArgs,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": object_meta(&args.name, args, labels, annotations),
        "spec": {
            "replicas": args.replicas,
            "selector": {"matchLabels": labels},
            "strategy": {"type": "Recreate"},
            "template": {
                "metadata": {
                    "annotations": annotations,
                    "creationTimestamp": null,
                    "labels": labels,
                    "name": args.name,
                    "namespace": args.namespace,
                },
                "spec": {
                    "containers": [{
                        "name": "tooling-container",
                        "image": "quay.io/mloriedo/universal-developer-image:ubi8-dw-demo",
                        "imagePullPolicy": "Always",
                        "ports": [{"containerPort": 60001, "name": "editor-server", "protocol": "TCP"}],
                        "volumeMounts": [{"name": "gl-workspace-data", "mountPath": "/projects"}]
                    }],
                    "initContainers": [{
                        "name": "gl-project-cloner",
                        "image": "alpine/git:2.36.3",
                        "volumeMounts": [{"name": "gl-workspace-data", "mountPath": "/projects"}]
                    }],
                    "volumes": [{
                        "name": "gl-workspace-data",
                        "persistentVolumeClaim": {"claimName": format!("{}-gl-workspace-data", args.name)}
                    }]
                }
            }
        },
        "status": {}
    })
}

fn service(
    args: &TransformArgs,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": object_meta(&args.name, args, labels, annotations),
        "spec": {
            "ports": [{"name": "editor-server", "port": 60001, "targetPort": 60001}],
            "selector": labels
        },
        "status": {"loadBalancer": {}}
    })
}

fn persistent_volume_claim(
    args: &TransformArgs,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> Value {
    let name = format!("{}-gl-workspace-data", args.name);
    json!({
        "apiVersion": "v1",
        "kind": "PersistentVolumeClaim",
        "metadata": object_meta(&name, args, labels, annotations),
        "spec": {
            "accessModes": ["ReadWriteOnce"],
            "resources": {"requests": {"storage": "15Gi"}}
        },
        "status": {}
    })
}

// =============================================================================
// Workspace fixtures
// =============================================================================

pub fn agent_config() -> WorkspacesAgentConfig {
    WorkspacesAgentConfig {
        dns_zone: "workspaces.localdev.me".to_string(),
        labels: BTreeMap::from([("some-label".to_string(), "value".to_string())]),
        annotations: BTreeMap::from([("some/annotation".to_string(), "value".to_string())]),
        default_resources_per_workspace_container: Some(ResourceRequirements {
            limits: ResourceQuantities {
                cpu: "1.5".to_string(),
                memory: "786Mi".to_string(),
            },
            requests: ResourceQuantities {
                cpu: "0.6".to_string(),
                memory: "512Mi".to_string(),
            },
        }),
        max_resources_per_workspace: Some(ResourceRequirements {
            limits: ResourceQuantities {
                cpu: "5".to_string(),
                memory: "5Gi".to_string(),
            },
            requests: ResourceQuantities {
                cpu: "3".to_string(),
                memory: "3Gi".to_string(),
            },
        }),
        image_pull_secrets: vec![ImagePullSecret {
            name: "registry-secret".to_string(),
            namespace: "default".to_string(),
        }],
        ..WorkspacesAgentConfig::default()
    }
}

pub fn workspace(desired_state: DesiredState, processed_devfile: &str) -> Workspace {
    Workspace {
        id: 993,
        name: "workspace-991-990-fedcba".to_string(),
        namespace: "gl-rd-ns-991-990-fedcba".to_string(),
        desired_state,
        actual_state: ActualState::Running,
        processed_devfile: processed_devfile.to_string(),
        workspaces_agent_config: agent_config(),
        variables: vec![
            WorkspaceVariable {
                key: "ENV_VAR1".to_string(),
                value: "env-var-value1".to_string(),
                variable_type: VariableType::Environment,
            },
            WorkspaceVariable {
                key: "FILE_VAR1".to_string(),
                value: "file-var-value1".to_string(),
                variable_type: VariableType::File,
            },
        ],
    }
}

pub fn params() -> Params {
    Params {
        agent_id: AGENT_ID,
        ..Params::default()
    }
}

pub fn generator(transformer: Arc<FakeTransformer>) -> DesiredConfigGenerator {
    DesiredConfigGenerator::new(transformer, Arc::new(SchemaRegistry::bundled().unwrap()))
}

/// Generate with a fresh fake transformer and return the populated context.
pub fn generate(workspace: Workspace, params: Params) -> ParentContext {
    generator(Arc::new(FakeTransformer::new()))
        .generate(&ParentContext::new(params, workspace))
        .unwrap()
}

pub fn kinds(parent: &ParentContext) -> Vec<String> {
    parent
        .desired_config
        .as_ref()
        .unwrap()
        .iter()
        .map(|doc| doc.kind().unwrap_or_default().to_string())
        .collect()
}
