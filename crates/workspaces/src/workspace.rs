//! Workspace record consumed by the generator.

use crate::config::WorkspacesAgentConfig;
use crate::states::{ActualState, DesiredState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableType {
    Environment,
    File,
}

/// User-defined variable injected into the workspace through a Secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceVariable {
    pub key: String,
    pub value: String,
    pub variable_type: VariableType,
}

/// Read-only view of a workspace. Nothing in this crate mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: u64,
    pub name: String,
    pub namespace: String,
    pub desired_state: DesiredState,
    pub actual_state: ActualState,
    pub processed_devfile: String,
    pub workspaces_agent_config: WorkspacesAgentConfig,
    #[serde(default)]
    pub variables: Vec<WorkspaceVariable>,
}

impl Workspace {
    pub fn environment_variables(&self) -> impl Iterator<Item = &WorkspaceVariable> {
        self.variables
            .iter()
            .filter(|v| v.variable_type == VariableType::Environment)
    }

    pub fn file_variables(&self) -> impl Iterator<Item = &WorkspaceVariable> {
        self.variables
            .iter()
            .filter(|v| v.variable_type == VariableType::File)
    }
}
