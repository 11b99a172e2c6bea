//! Agent-level workspace settings and generator configuration.

use crate::types::{Error, Result};
use anyhow::Context as _;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Environment variable overriding the devfile transformer binary path.
pub const ENV_DEVFILE_TRANSFORMER: &str = "WORKSPACES_DEVFILE_TRANSFORMER";

/// Environment variable overriding the schema directory.
pub const ENV_SCHEMA_DIR: &str = "WORKSPACES_SCHEMA_DIR";

const DNS_ZONE_PATTERN: &str = r"^[a-z0-9\-.]*$";

/// CPU and memory quantities, in Kubernetes quantity notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuantities {
    pub cpu: String,
    pub memory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub limits: ResourceQuantities,
    pub requests: ResourceQuantities,
}

/// One egress allow rule: a CIDR block with exceptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressRule {
    pub allow: String,
    #[serde(default)]
    pub except: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePullSecret {
    pub name: String,
    pub namespace: String,
}

/// Settings an agent applies to every workspace it hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspacesAgentConfig {
    pub dns_zone: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default = "default_network_policy_enabled")]
    pub network_policy_enabled: bool,

    #[serde(default = "default_network_policy_egress")]
    pub network_policy_egress: Vec<EgressRule>,

    #[serde(default = "default_proxy_namespace")]
    pub gitlab_workspaces_proxy_namespace: String,

    #[serde(default)]
    pub default_resources_per_workspace_container: Option<ResourceRequirements>,

    #[serde(default)]
    pub max_resources_per_workspace: Option<ResourceRequirements>,

    /// Empty means no runtime class is set on workspace pods
    #[serde(default)]
    pub default_runtime_class: String,

    #[serde(default)]
    pub allow_privilege_escalation: bool,

    #[serde(default)]
    pub use_kubernetes_user_namespaces: bool,

    #[serde(default)]
    pub image_pull_secrets: Vec<ImagePullSecret>,

    /// Empty means every workspace gets its own namespace
    #[serde(default)]
    pub shared_namespace: String,
}

fn default_network_policy_enabled() -> bool {
    true
}

fn default_network_policy_egress() -> Vec<EgressRule> {
    vec![EgressRule {
        allow: "0.0.0.0/0".to_string(),
        except: vec![
            "10.0.0.0/8".to_string(),
            "172.16.0.0/12".to_string(),
            "192.168.0.0/16".to_string(),
        ],
    }]
}

fn default_proxy_namespace() -> String {
    "gitlab-workspaces".to_string()
}

impl Default for WorkspacesAgentConfig {
    fn default() -> Self {
        Self {
            dns_zone: String::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            network_policy_enabled: default_network_policy_enabled(),
            network_policy_egress: default_network_policy_egress(),
            gitlab_workspaces_proxy_namespace: default_proxy_namespace(),
            default_resources_per_workspace_container: None,
            max_resources_per_workspace: None,
            default_runtime_class: String::new(),
            allow_privilege_escalation: false,
            use_kubernetes_user_namespaces: false,
            image_pull_secrets: Vec::new(),
            shared_namespace: String::new(),
        }
    }
}

impl WorkspacesAgentConfig {
    /// Load agent config from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read agent config file {}", path.display()))?;
        let config: WorkspacesAgentConfig =
            serde_yaml::from_str(&content).context("Failed to parse agent config YAML")?;
        Ok(config)
    }

    #[must_use]
    pub fn has_shared_namespace(&self) -> bool {
        !self.shared_namespace.is_empty()
    }

    /// Check the settings for combinations the generator cannot honour.
    pub fn validate(&self) -> Result<()> {
        let dns_zone_pattern =
            Regex::new(DNS_ZONE_PATTERN).map_err(|e| Error::Config(e.to_string()))?;
        if !dns_zone_pattern.is_match(&self.dns_zone) {
            return Err(Error::Config(
                "dns_zone contains invalid characters (valid characters: [a-z0-9\\-])".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for secret in &self.image_pull_secrets {
            if secret.name.is_empty() || secret.namespace.is_empty() {
                return Err(Error::Config(
                    "image_pull_secrets entries must have a name and a namespace".to_string(),
                ));
            }
            if !seen.insert(secret.name.as_str()) {
                return Err(Error::Config(format!(
                    "image_pull_secrets name '{}' is not unique",
                    secret.name
                )));
            }
            if self.has_shared_namespace() && secret.namespace != self.shared_namespace {
                return Err(Error::Config(format!(
                    "image_pull_secrets namespace '{}' must match shared_namespace '{}'",
                    secret.namespace, self.shared_namespace
                )));
            }
        }

        if self.allow_privilege_escalation
            && !self.use_kubernetes_user_namespaces
            && self.default_runtime_class.is_empty()
        {
            return Err(Error::Config(
                "allow_privilege_escalation can be true only if use_kubernetes_user_namespaces \
                 is true or default_runtime_class is non-empty"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Process-level settings for building a generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    #[serde(default = "default_transformer_path")]
    pub devfile_transformer_path: PathBuf,

    /// Directory of per-kind JSON schemas; bundled schemas are used when unset
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,
}

fn default_transformer_path() -> PathBuf {
    PathBuf::from("devfile-transformer")
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            devfile_transformer_path: default_transformer_path(),
            schema_dir: None,
        }
    }
}

impl GeneratorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read generator config file {}", path.display()))?;
        let config: GeneratorConfig =
            serde_yaml::from_str(&content).context("Failed to parse generator config YAML")?;
        Ok(config.with_env_overrides())
    }

    /// Apply `WORKSPACES_DEVFILE_TRANSFORMER` and `WORKSPACES_SCHEMA_DIR`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var(ENV_DEVFILE_TRANSFORMER) {
            if !path.is_empty() {
                self.devfile_transformer_path = PathBuf::from(path);
            }
        }
        if let Ok(dir) = std::env::var(ENV_SCHEMA_DIR) {
            if !dir.is_empty() {
                self.schema_dir = Some(PathBuf::from(dir));
            }
        }
        self
    }
}
