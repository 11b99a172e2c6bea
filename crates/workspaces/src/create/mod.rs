//! Desired config generation for a single workspace.
//!
//! [`DesiredConfigGenerator::generate`] threads a private context through an
//! ordered list of stages with `Result::and_then`. The first failing stage
//! aborts the rest, and the caller's [`ParentContext`] is only ever borrowed,
//! so a failed run leaves it exactly as it was.

pub mod appenders;
pub mod devfile;
pub mod devfile_transformer;
pub mod manifest_parser;
pub mod modifier;
pub mod scripts;
pub mod scripts_volume;
pub mod values_extractor;

use crate::config::GeneratorConfig;
use crate::desired_config::{DesiredConfig, SchemaRegistry};
use crate::document::ResourceDocument;
use crate::types::{Error, Result};
use crate::workspace::Workspace;
use devfile::ProcessedDevfile;
use devfile_transformer::{CommandDevfileTransformer, DevfileTransformer, TransformArgs};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use values_extractor::ExtractedValues;

/// Which resources a run produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconciliationScope {
    /// Every resource, including the secrets inventory, quota and Secrets
    #[default]
    Full,
    /// Only resources annotated for partial reconciliation
    Partial,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Params {
    pub agent_id: u64,
    #[serde(default)]
    pub scope: ReconciliationScope,
    /// Fill the env and file Secrets from the workspace variables
    #[serde(default)]
    pub include_secret_data: bool,
}

/// Caller-owned input and output of a generator run.
#[derive(Debug, Clone)]
pub struct ParentContext {
    pub params: Params,
    pub workspace: Workspace,
    pub desired_config: Option<DesiredConfig>,
}

impl ParentContext {
    #[must_use]
    pub fn new(params: Params, workspace: Workspace) -> Self {
        Self {
            params,
            workspace,
            desired_config: None,
        }
    }
}

/// Values accumulated by the stages of one run.
struct Context<'a> {
    params: &'a Params,
    workspace: &'a Workspace,
    values: Option<ExtractedValues>,
    manifest_stream: Option<String>,
    documents: Vec<ResourceDocument>,
}

impl<'a> Context<'a> {
    fn new(parent: &'a ParentContext) -> Self {
        Self {
            params: &parent.params,
            workspace: &parent.workspace,
            values: None,
            manifest_stream: None,
            documents: Vec::new(),
        }
    }

    fn values(&self) -> Result<&ExtractedValues> {
        require(self.values.as_ref(), "values")
    }
}

fn require<T>(value: Option<T>, key: &'static str) -> Result<T> {
    value.ok_or(Error::MissingContextValue(key))
}

/// Computes the desired config of a workspace.
#[derive(Clone)]
pub struct DesiredConfigGenerator {
    transformer: Arc<dyn DevfileTransformer>,
    registry: Arc<SchemaRegistry>,
}

impl std::fmt::Debug for DesiredConfigGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesiredConfigGenerator")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl DesiredConfigGenerator {
    pub fn new(transformer: Arc<dyn DevfileTransformer>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            transformer,
            registry,
        }
    }

    /// Generator running the configured transformer binary, validating against
    /// the configured schema directory or the bundled schemas.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let registry = match &config.schema_dir {
            Some(dir) => SchemaRegistry::from_dir(dir)?,
            None => SchemaRegistry::bundled()?,
        };
        info!(
            transformer = %config.devfile_transformer_path.display(),
            kinds = ?registry.kinds().collect::<Vec<_>>(),
            "Initialized desired config generator"
        );
        Ok(Self::new(
            Arc::new(CommandDevfileTransformer::new(&config.devfile_transformer_path)),
            Arc::new(registry),
        ))
    }

    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Run the pipeline and return a copy of `parent` carrying the new
    /// desired config.
    #[instrument(
        skip_all,
        fields(
            workspace_name = %parent.workspace.name,
            workspace_namespace = %parent.workspace.namespace,
            desired_state = %parent.workspace.desired_state,
        )
    )]
    pub fn generate(&self, parent: &ParentContext) -> Result<ParentContext> {
        let context = Ok(Context::new(parent))
            .and_then(Self::extract_values)
            .and_then(Self::append_workspace_inventory);

        let context = if parent.workspace.desired_state.is_terminated() {
            context.and_then(Self::append_secrets_inventory)
        } else {
            context
                .and_then(|context| self.invoke_transformer(context))
                .and_then(Self::append_devfile_resources)
                .and_then(Self::modify_devfile_resources)
                .and_then(Self::append_service_account)
                .and_then(Self::append_network_policy)
                .and_then(Self::append_scripts_resources)
                .and_then(Self::append_full_scope_resources)
        };

        let desired_config = context.and_then(|context| self.build_desired_config(context))?;
        info!(
            documents = desired_config.len(),
            scope = ?parent.params.scope,
            "Generated desired config"
        );

        let mut result = parent.clone();
        result.desired_config = Some(desired_config);
        Ok(result)
    }

    fn extract_values(mut context: Context<'_>) -> Result<Context<'_>> {
        context.workspace.workspaces_agent_config.validate()?;
        context.values = Some(values_extractor::extract(
            context.params.agent_id,
            context.workspace,
        )?);
        Ok(context)
    }

    fn append_workspace_inventory(mut context: Context<'_>) -> Result<Context<'_>> {
        let values = context.values()?;
        let inventory = appenders::inventory_configmap(
            &values.workspace_inventory_name,
            &context.workspace.namespace,
            &values.labels,
            &values.common_annotations_for_partial_reconciliation,
        );
        context.documents.push(inventory);
        Ok(context)
    }

    fn append_secrets_inventory(mut context: Context<'_>) -> Result<Context<'_>> {
        let values = context.values()?;
        let inventory = appenders::inventory_configmap(
            &values.secrets_inventory_name,
            &context.workspace.namespace,
            &values.labels,
            &values.common_annotations,
        );
        context.documents.push(inventory);
        Ok(context)
    }

    fn invoke_transformer<'a>(&self, mut context: Context<'a>) -> Result<Context<'a>> {
        let workspace = context.workspace;
        let values = context.values()?;
        let args = TransformArgs::new(
            &workspace.processed_devfile,
            &workspace.name,
            &workspace.namespace,
            &values.labels,
            &values.workspace_inventory_annotations_for_partial_reconciliation,
            values.replicas,
            &values.domain_template,
        )?;

        match self.transformer.transform(&args) {
            Ok(stream) => {
                debug!(bytes = stream.len(), "Devfile transformer succeeded");
                context.manifest_stream = Some(stream);
                Ok(context)
            }
            Err(e) => {
                error!(
                    workspace_name = %workspace.name,
                    workspace_namespace = %workspace.namespace,
                    error = %e.message(),
                    retryable = e.is_retryable_after_devfile_fix(),
                    "Devfile transformer failed"
                );
                Err(e.into())
            }
        }
    }

    fn append_devfile_resources(mut context: Context<'_>) -> Result<Context<'_>> {
        let stream = require(context.manifest_stream.take(), "manifest_stream")?;
        let documents = manifest_parser::parse_manifest_stream(&stream)?;
        if documents.is_empty() {
            return Err(Error::MissingResource("resources"));
        }
        context.documents.extend(documents);
        Ok(context)
    }

    fn modify_devfile_resources(mut context: Context<'_>) -> Result<Context<'_>> {
        let documents = std::mem::take(&mut context.documents);
        let values = context.values()?;
        context.documents = modifier::modify_devfile_resources(
            documents,
            &context.workspace.name,
            &context.workspace.workspaces_agent_config,
            values,
        )?;
        Ok(context)
    }

    fn append_service_account(mut context: Context<'_>) -> Result<Context<'_>> {
        let workspace = context.workspace;
        let values = context.values()?;
        let service_account = appenders::image_pull_secrets_service_account(
            &workspace.name,
            &workspace.namespace,
            &workspace.workspaces_agent_config.image_pull_secrets,
            &values.labels,
            &values.workspace_inventory_annotations_for_partial_reconciliation,
        );
        context.documents.push(service_account);
        Ok(context)
    }

    fn append_network_policy(mut context: Context<'_>) -> Result<Context<'_>> {
        let workspace = context.workspace;
        let values = context.values()?;
        let policy = appenders::network_policy(
            &workspace.name,
            &workspace.namespace,
            &workspace.workspaces_agent_config,
            &values.labels,
            &values.workspace_inventory_annotations_for_partial_reconciliation,
        );
        context.documents.extend(policy);
        Ok(context)
    }

    fn append_scripts_resources(mut context: Context<'_>) -> Result<Context<'_>> {
        let devfile = ProcessedDevfile::parse(&context.workspace.processed_devfile)?;
        let documents = std::mem::take(&mut context.documents);
        let values = context.values()?;
        context.documents = scripts::append_scripts_resources(
            documents,
            &devfile,
            &context.workspace.namespace,
            values,
        )?;
        Ok(context)
    }

    fn append_full_scope_resources(mut context: Context<'_>) -> Result<Context<'_>> {
        if context.params.scope == ReconciliationScope::Partial {
            return Ok(context);
        }

        let workspace = context.workspace;
        let include_data = context.params.include_secret_data;
        let values = context.values()?;
        let namespace = workspace.namespace.as_str();
        let mut appended = Vec::with_capacity(4);

        appended.push(appenders::inventory_configmap(
            &values.secrets_inventory_name,
            namespace,
            &values.labels,
            &values.common_annotations,
        ));
        appended.extend(appenders::resource_quota(
            &workspace.name,
            namespace,
            &workspace.workspaces_agent_config,
            &values.labels,
            &values.workspace_inventory_annotations,
        ));

        let env_data: Vec<(&str, &str)> = if include_data {
            workspace
                .environment_variables()
                .map(|v| (v.key.as_str(), v.value.as_str()))
                .collect()
        } else {
            Vec::new()
        };
        appended.push(appenders::secret(
            &values.env_secret_name,
            namespace,
            &values.labels,
            &values.secrets_inventory_annotations,
            env_data,
        ));

        let mut file_data: Vec<(&str, &str)> = Vec::new();
        if include_data {
            file_data.extend(
                workspace
                    .file_variables()
                    .map(|v| (v.key.as_str(), v.value.as_str())),
            );
            file_data.push((
                appenders::RECONCILED_ACTUAL_STATE_FILE_NAME,
                workspace.actual_state.as_str(),
            ));
        }
        appended.push(appenders::secret(
            &values.file_secret_name,
            namespace,
            &values.labels,
            &values.secrets_inventory_annotations,
            file_data,
        ));

        context.documents.extend(appended);
        Ok(context)
    }

    fn build_desired_config(&self, context: Context<'_>) -> Result<DesiredConfig> {
        DesiredConfig::new(context.documents, &self.registry).map_err(|e| {
            error!(issues = e.issues.len(), error = %e, "Generated desired config is invalid");
            Error::from(e)
        })
    }
}
