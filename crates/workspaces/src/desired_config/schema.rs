//! Per-kind JSON schema registry.
//!
//! Schemas are data, not code: each file declares the kind it applies to via
//! `properties.kind.const`. A schema without that constant is the fallback
//! used for kinds with no dedicated schema.

use super::ValidationIssue;
use crate::types::{Error, Result};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

const BUNDLED_SCHEMAS: &[(&str, &str)] = &[
    ("base.json", include_str!("../../schemas/base.json")),
    ("configmap.json", include_str!("../../schemas/configmap.json")),
    ("deployment.json", include_str!("../../schemas/deployment.json")),
    ("networkpolicy.json", include_str!("../../schemas/networkpolicy.json")),
    (
        "persistentvolumeclaim.json",
        include_str!("../../schemas/persistentvolumeclaim.json"),
    ),
    ("resourcequota.json", include_str!("../../schemas/resourcequota.json")),
    ("secret.json", include_str!("../../schemas/secret.json")),
    ("service.json", include_str!("../../schemas/service.json")),
    ("serviceaccount.json", include_str!("../../schemas/serviceaccount.json")),
];

pub struct SchemaRegistry {
    schemas: BTreeMap<String, JSONSchema>,
    fallback: Option<JSONSchema>,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("kinds", &self.schemas.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl SchemaRegistry {
    /// Registry with no schemas. Every document is accepted.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schemas: BTreeMap::new(),
            fallback: None,
        }
    }

    /// Registry built from the schemas shipped with this crate.
    pub fn bundled() -> Result<Self> {
        let mut registry = Self::empty();
        for (file, content) in BUNDLED_SCHEMAS {
            let schema: Value = serde_json::from_str(content)
                .map_err(|e| Error::Schema(format!("bundled schema {file}: {e}")))?;
            registry.register(&schema)?;
        }
        Ok(registry)
    }

    /// Registry built from every `*.json` file in `dir`.
    ///
    /// If the directory has no fallback schema the bundled one is used.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::empty();
        let mut paths = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect::<Vec<_>>();
        paths.sort();

        for path in paths {
            let content = std::fs::read_to_string(&path)?;
            let schema: Value = serde_json::from_str(&content)
                .map_err(|e| Error::Schema(format!("{}: {e}", path.display())))?;
            registry.register(&schema)?;
            debug!(path = %path.display(), "Loaded resource schema");
        }

        if registry.fallback.is_none() {
            let base: Value = serde_json::from_str(BUNDLED_SCHEMAS[0].1)?;
            registry.register(&base)?;
        }
        Ok(registry)
    }

    /// Compile and add one schema, replacing any previous schema for its kind.
    pub fn register(&mut self, schema: &Value) -> Result<()> {
        let kind = schema
            .pointer("/properties/kind/const")
            .and_then(Value::as_str)
            .map(str::to_string);

        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| {
                Error::Schema(format!(
                    "failed to compile schema for {}: {e}",
                    kind.as_deref().unwrap_or("fallback")
                ))
            })?;

        match kind {
            Some(kind) => {
                self.schemas.insert(kind, compiled);
            }
            None => self.fallback = Some(compiled),
        }
        Ok(())
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    #[must_use]
    pub fn has_kind(&self, kind: &str) -> bool {
        self.schemas.contains_key(kind)
    }

    /// Validate the document at `index` against the schema for its kind.
    ///
    /// Issue paths are JSON pointers rooted at the enclosing array, so a
    /// disallowed key `foo` on document 3 is reported at `/3/foo`.
    pub(crate) fn validate(&self, index: usize, document: &Value) -> Vec<ValidationIssue> {
        let schema = document
            .get("kind")
            .and_then(Value::as_str)
            .and_then(|kind| self.schemas.get(kind))
            .or(self.fallback.as_ref());

        let Some(schema) = schema else {
            return Vec::new();
        };

        let mut issues = Vec::new();
        if let Err(errors) = schema.validate(document) {
            for error in errors {
                let path = format!("/{index}{}", error.instance_path);
                let message = error.to_string();
                match &error.kind {
                    ValidationErrorKind::AdditionalProperties { unexpected } => {
                        for key in unexpected {
                            issues.push(ValidationIssue::new(
                                format!("{path}/{}", escape_pointer_token(key)),
                                message.clone(),
                            ));
                        }
                    }
                    _ => issues.push(ValidationIssue::new(path, message)),
                }
            }
        }
        issues
    }
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
