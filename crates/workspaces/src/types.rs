//! Shared error type for desired config generation.

use crate::create::devfile_transformer::TransformerError;
use crate::desired_config::DesiredConfigError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The generated resources failed root or per-kind schema validation
    #[error("desired config is invalid: {0}")]
    DesiredConfig(#[from] DesiredConfigError),

    /// The external devfile transformer failed or could not be executed
    #[error(transparent)]
    Transformer(#[from] TransformerError),

    #[error("failed to parse manifest stream: {0}")]
    ManifestParse(String),

    #[error("failed to parse processed devfile: {0}")]
    Devfile(#[source] serde_yaml::Error),

    #[error("schema registry error: {0}")]
    Schema(String),

    /// Contract violation: an operation received a value of the wrong type
    #[error("expected argument of type {expected}, got {actual}")]
    ArgumentType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("pipeline context is missing required value '{0}'")]
    MissingContextValue(&'static str),

    #[error("volume '{volume}' has already been inserted into the pod spec")]
    ScriptsVolumeAlreadyInserted { volume: String },

    #[error("devfile transformer output has no {0}")]
    MissingResource(&'static str),

    #[error("invalid workspaces agent config: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
