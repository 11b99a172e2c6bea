//! Validated, immutable set of resources a workspace should have.
//!
//! A [`DesiredConfig`] can only be obtained through validation:
//!
//! - the root must be an array (`value at root is not an array`)
//! - the array must not be empty (`can't be blank`)
//! - every element must satisfy the schema registered for its `kind`
//!
//! Two configs compare equal when their documents are deeply equal, and
//! [`DesiredConfig::diff`] gives the whole-document edit script between them.

mod diff;
mod schema;

pub use diff::{DiffEntry, DiffSign};
pub use schema::SchemaRegistry;

use crate::document::{json_type_name, ResourceDocument};
use crate::types::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use thiserror::Error;

pub const ROOT_NOT_AN_ARRAY: &str = "value at root is not an array";
pub const BLANK: &str = "can't be blank";

/// A single validation failure, located by JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Empty for root-level failures
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub(crate) fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    fn root(message: &str) -> Self {
        Self::new(String::new(), message)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_issues(.issues))]
pub struct DesiredConfigError {
    pub issues: Vec<ValidationIssue>,
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DesiredConfigError {
    fn single(message: &str) -> Self {
        Self {
            issues: vec![ValidationIssue::root(message)],
        }
    }

    /// Messages of every issue, in report order.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|issue| issue.message.as_str())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|issue| issue.path.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DesiredConfig {
    documents: Vec<ResourceDocument>,
}

impl DesiredConfig {
    /// Validate an arbitrary JSON value as a desired config.
    pub fn from_value(
        value: Value,
        registry: &SchemaRegistry,
    ) -> std::result::Result<Self, DesiredConfigError> {
        let Value::Array(items) = value else {
            return Err(DesiredConfigError::single(ROOT_NOT_AN_ARRAY));
        };
        if items.is_empty() {
            return Err(DesiredConfigError::single(BLANK));
        }

        let mut issues = Vec::new();
        for (index, item) in items.iter().enumerate() {
            if !item.is_object() {
                issues.push(ValidationIssue::new(
                    format!("/{index}"),
                    format!("expected object, got {}", json_type_name(item)),
                ));
                continue;
            }
            issues.extend(registry.validate(index, item));
        }
        if !issues.is_empty() {
            return Err(DesiredConfigError { issues });
        }

        let documents = items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(ResourceDocument::from(map)),
                _ => None,
            })
            .collect();
        Ok(Self { documents })
    }

    /// Validate an already-built document sequence.
    pub fn new(
        documents: Vec<ResourceDocument>,
        registry: &SchemaRegistry,
    ) -> std::result::Result<Self, DesiredConfigError> {
        let value = Value::Array(documents.into_iter().map(Value::from).collect());
        Self::from_value(value, registry)
    }

    #[must_use]
    pub fn documents(&self) -> &[ResourceDocument] {
        &self.documents
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResourceDocument> {
        self.documents.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Always false for a constructed config; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(self.documents.iter().cloned().map(Value::from).collect())
    }

    /// Documents present in only one of `self` and `other`.
    #[must_use]
    pub fn diff(&self, other: &DesiredConfig) -> Vec<DiffEntry> {
        diff::diff_documents(&self.documents, &other.documents)
    }

    /// Like [`diff`](Self::diff) for callers holding a type-erased value.
    ///
    /// Fails with [`Error::ArgumentType`] when `other` is not a `DesiredConfig`.
    pub fn try_diff<T: Any>(&self, other: &T) -> Result<Vec<DiffEntry>> {
        match (other as &dyn Any).downcast_ref::<DesiredConfig>() {
            Some(other) => Ok(self.diff(other)),
            None => Err(Error::ArgumentType {
                expected: std::any::type_name::<DesiredConfig>(),
                actual: std::any::type_name::<T>(),
            }),
        }
    }

    /// Render as a `---` separated YAML stream, the form an agent applies.
    pub fn to_manifest_stream(&self) -> Result<String> {
        let mut stream = String::new();
        for document in &self.documents {
            stream.push_str("---\n");
            stream.push_str(&serde_yaml::to_string(document)?);
        }
        Ok(stream)
    }
}

impl<'a> IntoIterator for &'a DesiredConfig {
    type Item = &'a ResourceDocument;
    type IntoIter = std::slice::Iter<'a, ResourceDocument>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}
