//! Splits a multi-document YAML stream into resource documents.

use crate::document::ResourceDocument;
use crate::types::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use serde_yaml::Value as YamlValue;

/// Parse `stream` into documents, preserving order.
///
/// Empty documents are skipped. Every mapping key, at any depth, becomes a
/// string: `1: x` and `true: x` are read as `"1"` and `"true"`.
pub fn parse_manifest_stream(stream: &str) -> Result<Vec<ResourceDocument>> {
    let mut documents = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(stream).enumerate() {
        let value = YamlValue::deserialize(document)
            .map_err(|e| Error::ManifestParse(format!("document {index}: {e}")))?;
        if value.is_null() {
            continue;
        }
        match normalize(value)? {
            Value::Object(map) => documents.push(ResourceDocument::from(map)),
            other => {
                return Err(Error::ManifestParse(format!(
                    "document {index} is not a mapping: {other}"
                )))
            }
        }
    }
    Ok(documents)
}

fn normalize(value: YamlValue) -> Result<Value> {
    Ok(match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(b),
        YamlValue::Number(n) => number(&n)?,
        YamlValue::String(s) => Value::String(s),
        YamlValue::Sequence(items) => {
            Value::Array(items.into_iter().map(normalize).collect::<Result<_>>()?)
        }
        YamlValue::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(key_string(&key)?, normalize(value)?);
            }
            Value::Object(map)
        }
        YamlValue::Tagged(tagged) => normalize(tagged.value)?,
    })
}

fn number(n: &serde_yaml::Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Value::from(u));
    }
    n.as_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| Error::ManifestParse(format!("number {n} has no JSON representation")))
}

fn key_string(key: &YamlValue) -> Result<String> {
    Ok(match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Null => "null".to_string(),
        YamlValue::Tagged(tagged) => key_string(&tagged.value)?,
        complex => serde_yaml::to_string(complex)?.trim_end().to_string(),
    })
}
