//! Adapter for the external devfile-to-manifest transformer.
//!
//! The transformer is a black box with a fixed positional argument contract:
//!
//! 1. processed devfile text
//! 2. workspace name
//! 3. workspace namespace
//! 4. labels, YAML-serialized
//! 5. annotations, YAML-serialized
//! 6. replica count
//! 7. domain template
//! 8. mode flag, always `none`
//!
//! It returns a multi-document YAML stream on stdout.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

pub const MODE_FLAG: &str = "none";

#[derive(Debug, Error)]
pub enum TransformerError {
    /// The tool ran and rejected the devfile. Retrying is pointless until the
    /// devfile changes.
    #[error("devfile transformer failed for workspace '{workspace}': {message}")]
    ToolFailure { workspace: String, message: String },

    /// The tool could not be run at all, e.g. a wrong-architecture binary.
    #[error("devfile transformer could not run for workspace '{workspace}': {source}")]
    Environment {
        workspace: String,
        #[source]
        source: io::Error,
    },
}

impl TransformerError {
    #[must_use]
    pub fn is_retryable_after_devfile_fix(&self) -> bool {
        matches!(self, Self::ToolFailure { .. })
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::ToolFailure { message, .. } => message.clone(),
            Self::Environment { source, .. } => source.to_string(),
        }
    }
}

/// Arguments for one transformer call, already serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformArgs {
    pub processed_devfile: String,
    pub name: String,
    pub namespace: String,
    pub labels_yaml: String,
    pub annotations_yaml: String,
    pub replicas: u32,
    pub domain_template: String,
}

impl TransformArgs {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        processed_devfile: &str,
        name: &str,
        namespace: &str,
        labels: &BTreeMap<String, String>,
        annotations: &BTreeMap<String, String>,
        replicas: u32,
        domain_template: &str,
    ) -> Result<Self, serde_yaml::Error> {
        Ok(Self {
            processed_devfile: processed_devfile.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels_yaml: serde_yaml::to_string(labels)?,
            annotations_yaml: serde_yaml::to_string(annotations)?,
            replicas,
            domain_template: domain_template.to_string(),
        })
    }

    /// Positional argument vector in contract order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        vec![
            self.processed_devfile.clone(),
            self.name.clone(),
            self.namespace.clone(),
            self.labels_yaml.clone(),
            self.annotations_yaml.clone(),
            self.replicas.to_string(),
            self.domain_template.clone(),
            MODE_FLAG.to_string(),
        ]
    }
}

/// Turns a processed devfile into a raw manifest stream.
pub trait DevfileTransformer: Send + Sync {
    fn transform(&self, args: &TransformArgs) -> Result<String, TransformerError>;
}

/// Runs the transformer as a child process and blocks until it exits.
///
/// There is no timeout; callers that need one must impose it.
#[derive(Debug, Clone)]
pub struct CommandDevfileTransformer {
    program: PathBuf,
}

impl CommandDevfileTransformer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DevfileTransformer for CommandDevfileTransformer {
    fn transform(&self, args: &TransformArgs) -> Result<String, TransformerError> {
        debug!(
            program = %self.program.display(),
            workspace_name = %args.name,
            "Running devfile transformer"
        );

        let output = Command::new(&self.program)
            .args(args.to_vec())
            .output()
            .map_err(|source| TransformerError::Environment {
                workspace: args.name.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(TransformerError::ToolFailure {
                workspace: args.name.clone(),
                message,
            });
        }

        String::from_utf8(output.stdout).map_err(|e| TransformerError::Environment {
            workspace: args.name.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })
    }
}
