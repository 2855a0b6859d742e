//! Per-node attribute bags.
//!
//! Input records carry arbitrary extra fields (`Size`, `Version`, whatever an
//! analyzer emits). Nodes keep the well-known ones as typed fields and park
//! everything else in an ordered extension map. Keys are case-insensitive:
//! they are lower-cased on the way in, so `Name`, `NAME` and `name` are the
//! same attribute.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON value into a scalar. Arrays and objects are flattened to
    /// their compact JSON text.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or_default()), Self::Int),
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Attributes attached to a node.
///
/// `name`, `size` and `version` are the fields every flavour of tree reads;
/// the rest is carried through to exports untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    name: Option<String>,
    size: Option<u64>,
    version: Option<String>,
    extra: BTreeMap<String, Scalar>,
}

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes holding only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Build from a JSON object, lower-casing every key.
    #[must_use]
    pub fn from_json_map(map: &serde_json::Map<String, Value>) -> Self {
        let mut attrs = Self::default();
        for (key, value) in map {
            attrs.set(key, Scalar::from_json(value));
        }
        attrs
    }

    /// Set an attribute. Well-known keys are coerced into their typed slot;
    /// a value that cannot be coerced lands in the extension map instead.
    pub fn set(&mut self, key: &str, value: Scalar) {
        let key = key.to_lowercase();
        match (key.as_str(), value) {
            ("name", Scalar::Text(s)) => self.name = Some(s),
            ("size", Scalar::Int(i)) if i >= 0 => self.size = u64::try_from(i).ok(),
            ("version", Scalar::Text(s)) => self.version = Some(s),
            ("version", v @ (Scalar::Int(_) | Scalar::Float(_))) => {
                self.version = Some(v.to_string());
            }
            (_, value) => {
                self.extra.insert(key, value);
            }
        }
    }

    /// Look up an attribute by (case-insensitive) key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Scalar> {
        let key = key.to_lowercase();
        match key.as_str() {
            "name" if self.name.is_some() => self.name.clone().map(Scalar::Text),
            "size" if self.size.is_some() => self
                .size
                .and_then(|s| i64::try_from(s).ok())
                .map(Scalar::Int),
            "version" if self.version.is_some() => self.version.clone().map(Scalar::Text),
            _ => self.extra.get(&key).cloned(),
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        self.size
    }

    pub const fn set_size(&mut self, size: u64) {
        self.size = Some(size);
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Overlay `other` on top of `self`; keys present in both take `other`'s value.
    pub fn merge(&mut self, other: &Self) {
        if other.name.is_some() {
            self.name.clone_from(&other.name);
        }
        if other.size.is_some() {
            self.size = other.size;
        }
        if other.version.is_some() {
            self.version.clone_from(&other.version);
        }
        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Number of attributes set.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.name.is_some())
            + usize::from(self.size.is_some())
            + usize::from(self.version.is_some())
            + self.extra.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        if let Some(name) = &self.name {
            map.serialize_entry("name", name)?;
        }
        if let Some(size) = self.size {
            map.serialize_entry("size", &size)?;
        }
        if let Some(version) = &self.version {
            map.serialize_entry("version", version)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
