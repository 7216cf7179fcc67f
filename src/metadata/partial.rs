use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Key carrying the origin of a partial record.
pub const SOURCE_TAG: &str = "_src";

/// Key carrying the backend that produced an embedded record.
pub const BACKEND_TAG: &str = "_backend";

/// The three independent metadata producers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Path,
    Embedded,
    Api,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Path, SourceKind::Embedded, SourceKind::Api];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Path => "path",
            SourceKind::Embedded => "embedded",
            SourceKind::Api => "api",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" => Ok(SourceKind::Path),
            "embedded" => Ok(SourceKind::Embedded),
            "api" => Ok(SourceKind::Api),
            other => Err(Error::UnknownSource(other.to_string())),
        }
    }
}

/// Source-tagged bag of fields produced by one source for one extraction.
///
/// Keys starting with `_` are markers (`_src`, `_backend`), not fields.
/// `raw` keeps the untouched payload the source worked from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialRecord {
    fields: Map<String, Value>,
    raw: Value,
}

impl PartialRecord {
    pub fn new(source: SourceKind) -> Self {
        let mut fields = Map::new();
        fields.insert(SOURCE_TAG.to_string(), Value::from(source.as_str()));
        Self {
            fields,
            raw: Value::Null,
        }
    }

    /// Wrap an untyped JSON object (e.g. `{"_src": "api", "title": ...}`).
    /// Non-object values produce an empty, untagged record.
    pub fn from_value(value: Value) -> Self {
        let fields = match &value {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        Self { fields, raw: value }
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    pub fn with_backend(mut self, backend: &str) -> Self {
        self.fields
            .insert(BACKEND_TAG.to_string(), Value::from(backend));
        self
    }

    /// The `_src` tag as written, if any
    pub fn tag(&self) -> Option<&str> {
        self.fields.get(SOURCE_TAG).and_then(Value::as_str)
    }

    pub fn source(&self) -> Option<SourceKind> {
        self.tag().and_then(|t| t.parse().ok())
    }

    pub fn backend(&self) -> Option<&str> {
        self.fields.get(BACKEND_TAG).and_then(Value::as_str)
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Set a field. Values that are not meaningful are still stored; the
    /// merger decides whether they count.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// Set a field only when there is something to set
    pub fn set_opt<T: Into<Value>>(&mut self, field: &str, value: Option<T>) {
        if let Some(v) = value {
            self.set(field, v);
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Field entries, markers excluded
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter().filter(|(k, _)| !k.starts_with('_'))
    }

    /// True when no field carries a meaningful value
    pub fn is_empty(&self) -> bool {
        !self.fields().any(|(_, v)| is_meaningful(v))
    }
}

/// A value counts as provided when it is not null, not a blank string, and
/// not an empty collection.
pub fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}
