#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]

//! Desired-state compiler for remote development workspaces.
//!
//! Given a workspace and the settings of the agent hosting it, this crate
//! computes every Kubernetes resource the workspace should have, validates
//! the set against per-kind JSON schemas, and diffs it against a previously
//! computed set so a reconciliation loop only applies what changed.
//!
//! ## Pipeline
//!
//! ```text
//! workspace + agent config
//!     -> values extractor          (labels, annotations, names, replicas)
//!     -> devfile transformer       (external binary, YAML stream out)
//!     -> manifest parser           (ordered resource documents)
//!     -> modifiers and appenders   (hardening, secrets, scripts, policies)
//!     -> DesiredConfig             (schema-validated, diffable)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use workspaces::{DesiredConfigGenerator, GeneratorConfig, ParentContext, Params};
//!
//! let generator = DesiredConfigGenerator::from_config(&GeneratorConfig::default())?;
//! let parent = ParentContext::new(Params { agent_id: 1, ..Params::default() }, workspace);
//! let generated = generator.generate(&parent)?;
//! let changes = previous.diff(generated.desired_config.as_ref().unwrap());
//! ```

pub mod actual_state;
pub mod config;
pub mod create;
pub mod desired_config;
pub mod document;
pub mod states;
pub mod telemetry;
pub mod types;
pub mod workspace;

pub use actual_state::{calculate_actual_state, ErrorDetails, ErrorType, TerminationProgress};
pub use config::{GeneratorConfig, WorkspacesAgentConfig};
pub use create::devfile_transformer::{
    CommandDevfileTransformer, DevfileTransformer, TransformArgs, TransformerError,
};
pub use create::{DesiredConfigGenerator, ParentContext, Params, ReconciliationScope};
pub use desired_config::{
    DesiredConfig, DesiredConfigError, DiffEntry, DiffSign, SchemaRegistry, ValidationIssue,
};
pub use document::ResourceDocument;
pub use states::{is_valid_actual_state, is_valid_desired_state, ActualState, DesiredState};
pub use types::{Error, Result};
pub use workspace::{VariableType, Workspace, WorkspaceVariable};
