//! Kind-tagged Kubernetes resource documents.
//!
//! A [`ResourceDocument`] is a JSON object with no static type per kind.
//! Per-kind shape is enforced only by schema validation when documents are
//! wrapped in a [`DesiredConfig`](crate::desired_config::DesiredConfig).

use crate::types::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceDocument(Map<String, Value>);

impl ResourceDocument {
    /// Start a document with `apiVersion`, `kind` and `metadata` set.
    #[must_use]
    pub fn new(api_version: &str, kind: &str, metadata: Value) -> Self {
        let mut map = Map::new();
        map.insert("apiVersion".to_string(), Value::from(api_version));
        map.insert("kind".to_string(), Value::from(kind));
        map.insert("metadata".to_string(), metadata);
        Self(map)
    }

    #[must_use]
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(Value::as_str)
    }

    #[must_use]
    pub fn api_version(&self) -> Option<&str> {
        self.0.get("apiVersion").and_then(Value::as_str)
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata_str("name")
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.metadata_str("namespace")
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.0
            .get("metadata")
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }

    #[must_use]
    pub fn is(&self, kind: &str) -> bool {
        self.kind() == Some(kind)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Look up a nested value by JSON pointer, e.g. `/spec/template/spec`.
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let (first, rest) = split_pointer(pointer)?;
        let value = self.0.get(&first)?;
        if rest.is_empty() {
            Some(value)
        } else {
            value.pointer(rest)
        }
    }

    pub fn pointer_mut(&mut self, pointer: &str) -> Option<&mut Value> {
        let (first, rest) = split_pointer(pointer)?;
        let value = self.0.get_mut(&first)?;
        if rest.is_empty() {
            Some(value)
        } else {
            value.pointer_mut(rest)
        }
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Split `/a/b/c` into the unescaped `a` and the remaining `/b/c`.
fn split_pointer(pointer: &str) -> Option<(String, &str)> {
    let body = pointer.strip_prefix('/')?;
    let (first, rest) = match body.find('/') {
        Some(idx) => (&body[..idx], &body[idx..]),
        None => (body, ""),
    };
    Some((first.replace("~1", "/").replace("~0", "~"), rest))
}

impl From<Map<String, Value>> for ResourceDocument {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ResourceDocument {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::ManifestParse(format!(
                "resource document must be a mapping, got {}",
                json_type_name(&other)
            ))),
        }
    }
}

impl From<ResourceDocument> for Value {
    fn from(document: ResourceDocument) -> Self {
        document.into_value()
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Build a standard `metadata` object.
#[must_use]
pub fn metadata(
    name: &str,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> Value {
    serde_json::json!({
        "name": name,
        "namespace": namespace,
        "labels": labels,
        "annotations": annotations,
    })
}
