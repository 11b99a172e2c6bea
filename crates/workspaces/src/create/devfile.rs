//! The parts of a processed devfile the generator reads directly.
//!
//! Everything else in the devfile is opaque here and only consumed by the
//! external transformer.

use crate::types::{Error, Result};
use serde::Deserialize;

/// Label marking a post-start command that must finish before the others run.
pub const INTERNAL_BLOCKING_COMMAND_LABEL: &str = "gl-internal-blocking";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessedDevfile {
    #[serde(default)]
    pub commands: Vec<DevfileCommand>,
    #[serde(default)]
    pub events: DevfileEvents,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevfileCommand {
    pub id: String,
    #[serde(default)]
    pub exec: Option<ExecCommand>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCommand {
    pub command_line: String,
    pub component: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl ExecCommand {
    #[must_use]
    pub fn is_internal_blocking(&self) -> bool {
        self.label.as_deref() == Some(INTERNAL_BLOCKING_COMMAND_LABEL)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevfileEvents {
    #[serde(default)]
    pub pre_start: Vec<String>,
    #[serde(default)]
    pub post_start: Vec<String>,
}

/// A post-start event resolved to its exec command.
#[derive(Debug, Clone, Copy)]
pub struct PostStartCommand<'a> {
    pub id: &'a str,
    pub exec: &'a ExecCommand,
}

impl ProcessedDevfile {
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::Devfile)
    }

    #[must_use]
    pub fn has_post_start_events(&self) -> bool {
        !self.events.post_start.is_empty()
    }

    /// Post-start exec commands in event order. Events naming unknown or
    /// non-exec commands are skipped.
    #[must_use]
    pub fn post_start_commands(&self) -> Vec<PostStartCommand<'_>> {
        self.events
            .post_start
            .iter()
            .filter_map(|event| {
                self.commands
                    .iter()
                    .find(|command| &command.id == event)
                    .and_then(|command| {
                        command.exec.as_ref().map(|exec| PostStartCommand {
                            id: &command.id,
                            exec,
                        })
                    })
            })
            .collect()
    }
}
