//! Workspace desired and actual states.
//!
//! The control plane writes `desired_state`; the agent reports `actual_state`.
//! The two sets are closed and independent: a value valid in one is not
//! implied to be valid in the other (`RestartRequested` is desired-only,
//! `Starting` is actual-only). Only membership is checked here, transitions
//! are not.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid {set} state")]
pub struct UnknownStateError {
    pub set: &'static str,
    pub value: String,
}

/// State the control plane wants the workspace to be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DesiredState {
    Running,
    Stopped,
    RestartRequested,
    Terminated,
}

impl DesiredState {
    pub const ALL: [DesiredState; 4] = [
        Self::Running,
        Self::Stopped,
        Self::RestartRequested,
        Self::Terminated,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::RestartRequested => "RestartRequested",
            Self::Terminated => "Terminated",
        }
    }

    #[must_use]
    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    #[must_use]
    pub fn is_terminated(self) -> bool {
        self == Self::Terminated
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DesiredState {
    type Err = UnknownStateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == value)
            .ok_or_else(|| UnknownStateError {
                set: "desired",
                value: value.to_string(),
            })
    }
}

/// State last observed for the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActualState {
    CreationRequested,
    Starting,
    Running,
    Stopping,
    Stopped,
    Terminating,
    Terminated,
    Failed,
    Error,
    Unknown,
}

impl ActualState {
    pub const ALL: [ActualState; 10] = [
        Self::CreationRequested,
        Self::Starting,
        Self::Running,
        Self::Stopping,
        Self::Stopped,
        Self::Terminating,
        Self::Terminated,
        Self::Failed,
        Self::Error,
        Self::Unknown,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreationRequested => "CreationRequested",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Terminating => "Terminating",
            Self::Terminated => "Terminated",
            Self::Failed => "Failed",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ActualState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActualState {
    type Err = UnknownStateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == value)
            .ok_or_else(|| UnknownStateError {
                set: "actual",
                value: value.to_string(),
            })
    }
}

/// Returns true if `value` names a member of the desired state set.
#[must_use]
pub fn is_valid_desired_state(value: &str) -> bool {
    value.parse::<DesiredState>().is_ok()
}

/// Returns true if `value` names a member of the actual state set.
#[must_use]
pub fn is_valid_actual_state(value: &str) -> bool {
    value.parse::<ActualState>().is_ok()
}
