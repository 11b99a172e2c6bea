//! Derives a workspace's actual state from what the agent reports.

use crate::states::ActualState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Termination progress reported by the agent for a workspace being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationProgress {
    Terminating,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    /// The agent failed to apply the desired config.
    Applier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    pub error_type: ErrorType,
    #[serde(default)]
    pub error_message: Option<String>,
}

const PROGRESS_DEADLINE_EXCEEDED: &str = "ProgressDeadlineExceeded";
const NEW_REPLICA_SET_AVAILABLE: &str = "NewReplicaSetAvailable";
const NEW_REPLICA_SET_CREATED: &str = "NewReplicaSetCreated";
const FOUND_NEW_REPLICA_SET: &str = "FoundNewReplicaSet";
const REPLICA_SET_UPDATED: &str = "ReplicaSetUpdated";
const MINIMUM_REPLICAS_AVAILABLE: &str = "MinimumReplicasAvailable";
const MINIMUM_REPLICAS_UNAVAILABLE: &str = "MinimumReplicasUnavailable";

/// Compute the actual state.
///
/// A finished termination wins over everything, then a reported error, then
/// an in-progress termination. Otherwise the state is read off the
/// Deployment's `spec.replicas` and its `Progressing`/`Available` conditions.
#[must_use]
pub fn calculate_actual_state(
    latest_deployment: Option<&Value>,
    termination_progress: Option<TerminationProgress>,
    error_details: Option<&ErrorDetails>,
) -> ActualState {
    match termination_progress {
        Some(TerminationProgress::Terminated) => return ActualState::Terminated,
        _ if error_details.is_some() => return ActualState::Error,
        Some(TerminationProgress::Terminating) => return ActualState::Terminating,
        None => {}
    }

    latest_deployment.map_or(ActualState::Unknown, state_from_deployment)
}

fn state_from_deployment(deployment: &Value) -> ActualState {
    let Some(replicas) = deployment.pointer("/spec/replicas").and_then(Value::as_u64) else {
        return ActualState::Unknown;
    };
    // More than one replica is never generated.
    if replicas > 1 {
        return ActualState::Unknown;
    }
    let Some(conditions) = deployment
        .pointer("/status/conditions")
        .and_then(Value::as_array)
    else {
        return ActualState::Unknown;
    };

    let progressing = condition_reason(conditions, "Progressing");
    let available = condition_reason(conditions, "Available");

    let state = match (progressing, available, replicas) {
        (Some(PROGRESS_DEADLINE_EXCEEDED), _, _) => ActualState::Failed,
        (Some(NEW_REPLICA_SET_AVAILABLE), Some(MINIMUM_REPLICAS_AVAILABLE), 1) => {
            ActualState::Running
        }
        (Some(NEW_REPLICA_SET_AVAILABLE), Some(MINIMUM_REPLICAS_AVAILABLE), _) => {
            ActualState::Stopped
        }
        (Some(NEW_REPLICA_SET_AVAILABLE), Some(MINIMUM_REPLICAS_UNAVAILABLE), 1) => {
            ActualState::Starting
        }
        (Some(NEW_REPLICA_SET_AVAILABLE), Some(MINIMUM_REPLICAS_UNAVAILABLE), _) => {
            ActualState::Stopping
        }
        (Some(NEW_REPLICA_SET_CREATED | FOUND_NEW_REPLICA_SET | REPLICA_SET_UPDATED), _, 1) => {
            ActualState::Starting
        }
        (Some(REPLICA_SET_UPDATED), _, _) => ActualState::Stopping,
        _ => ActualState::Unknown,
    };

    if state == ActualState::Unknown {
        debug!(?progressing, ?available, replicas, "Unrecognized deployment conditions");
    }
    state
}

fn condition_reason<'a>(conditions: &'a [Value], condition_type: &str) -> Option<&'a str> {
    conditions
        .iter()
        .find(|condition| condition.get("type").and_then(Value::as_str) == Some(condition_type))
        .and_then(|condition| condition.get("reason"))
        .and_then(Value::as_str)
}
