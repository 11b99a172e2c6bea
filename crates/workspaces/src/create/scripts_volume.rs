//! Inserts the post-start scripts volume into a pod spec.
//!
//! The insertion takes ownership of the volumes and container collections and
//! hands back the updated ones. Running it twice against the same pod spec is
//! a caller bug, so a second insertion fails instead of silently producing a
//! duplicate volume.

use crate::types::{Error, Result};
use serde_json::{json, Value};
use tracing::debug;

pub const SCRIPTS_VOLUME_NAME: &str = "gl-workspace-scripts";
pub const SCRIPTS_VOLUME_PATH: &str = "/workspace-scripts";
pub const SCRIPTS_VOLUME_DEFAULT_MODE: u32 = 0o555;

#[derive(Debug, Clone)]
pub struct ScriptsVolumeInserter {
    configmap_name: String,
    default_mode: u32,
}

impl ScriptsVolumeInserter {
    pub fn new(configmap_name: impl Into<String>) -> Self {
        Self {
            configmap_name: configmap_name.into(),
            default_mode: SCRIPTS_VOLUME_DEFAULT_MODE,
        }
    }

    #[must_use]
    pub fn default_mode(mut self, mode: u32) -> Self {
        self.default_mode = mode;
        self
    }

    /// Append the projected volume to `volumes` and a mount to every container
    /// in every collection of `container_collections`.
    pub fn insert(
        &self,
        mut volumes: Vec<Value>,
        container_collections: Vec<Vec<Value>>,
    ) -> Result<(Vec<Value>, Vec<Vec<Value>>)> {
        if volumes
            .iter()
            .any(|volume| volume.get("name").and_then(Value::as_str) == Some(SCRIPTS_VOLUME_NAME))
        {
            return Err(Error::ScriptsVolumeAlreadyInserted {
                volume: SCRIPTS_VOLUME_NAME.to_string(),
            });
        }

        volumes.push(json!({
            "name": SCRIPTS_VOLUME_NAME,
            "projected": {
                "defaultMode": self.default_mode,
                "sources": [{"configMap": {"name": self.configmap_name}}]
            }
        }));

        let container_collections = container_collections
            .into_iter()
            .map(|containers| {
                containers
                    .into_iter()
                    .map(|mut container| {
                        if let Some(container) = container.as_object_mut() {
                            super::modifier::push_entry(
                                container,
                                "volumeMounts",
                                json!({"name": SCRIPTS_VOLUME_NAME, "mountPath": SCRIPTS_VOLUME_PATH}),
                            );
                        }
                        container
                    })
                    .collect()
            })
            .collect();

        debug!(configmap = %self.configmap_name, "Inserted scripts volume");
        Ok((volumes, container_collections))
    }
}
