use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Structural description of the data a socket carries.
///
/// Serialized in a JSON-Schema-like shape (`{"type": "object", "properties": {...}}`)
/// so that persisted documents stay readable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Schema {
    #[default]
    Any,
    Null,
    Boolean,
    Number,
    String,
    Array {
        items: Box<Schema>,
    },
    Object {
        #[serde(default)]
        properties: BTreeMap<String, Schema>,
    },
}

impl Schema {
    pub fn array(items: Schema) -> Self {
        Schema::Array {
            items: Box::new(items),
        }
    }

    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        Schema::Object {
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Short name used as the default socket type name.
    pub fn name(&self) -> &'static str {
        match self {
            Schema::Any => "any",
            Schema::Null => "null",
            Schema::Boolean => "boolean",
            Schema::Number => "number",
            Schema::String => "string",
            Schema::Array { .. } => "array",
            Schema::Object { .. } => "object",
        }
    }

    pub fn properties(&self) -> Option<&BTreeMap<String, Schema>> {
        match self {
            Schema::Object { properties } => Some(properties),
            _ => None,
        }
    }

    /// Returns `true` if data described by `self` may flow into a port expecting `target`.
    ///
    /// `Any` accepts everything, arrays are compared by item, and objects use width
    /// subtyping: every property the target names must exist on the source and be
    /// compatible itself.
    pub fn is_compatible_with(&self, target: &Schema) -> bool {
        match (self, target) {
            (_, Schema::Any) => true,
            (Schema::Array { items: source }, Schema::Array { items: target }) => {
                source.is_compatible_with(target)
            }
            (
                Schema::Object { properties: source },
                Schema::Object { properties: target },
            ) => target.iter().all(|(key, expected)| {
                source
                    .get(key)
                    .is_some_and(|found| found.is_compatible_with(expected))
            }),
            (source, target) => source == target,
        }
    }

    /// Infers the narrowest schema describing a JSON value.
    ///
    /// Empty or mixed arrays infer `Array<Any>`.
    pub fn infer(value: &Value) -> Schema {
        match value {
            Value::Null => Schema::Null,
            Value::Bool(_) => Schema::Boolean,
            Value::Number(_) => Schema::Number,
            Value::String(_) => Schema::String,
            Value::Array(items) => {
                let mut inferred = items.iter().map(Schema::infer);
                let item = match inferred.next() {
                    Some(first) if inferred.all(|other| other == first) => first,
                    _ => Schema::Any,
                };
                Schema::array(item)
            }
            Value::Object(map) => Schema::Object {
                properties: map
                    .iter()
                    .map(|(k, v)| (k.clone(), Schema::infer(v)))
                    .collect(),
            },
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Array { items } => write!(f, "array<{}>", items),
            Schema::Object { properties } => {
                write!(f, "{{")?;
                for (i, (key, schema)) in properties.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, schema)?;
                }
                write!(f, "}}")
            }
            other => write!(f, "{}", other.name()),
        }
    }
}
