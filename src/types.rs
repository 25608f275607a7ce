//! Core types shared by the field catalogue.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::field::FieldRef;

/// Role used when the caller does not ask for one.
pub const DEFAULT_ROLE: &str = "default";

/// Dialect marker stamped on top-level document schemas.
pub const DRAFT4_SCHEMA_URI: &str = "http://json-schema.org/draft-04/schema#";

/// Name that makes a `DocumentField` point back at the document owning it.
pub const RECURSIVE_REFERENCE: &str = "self";

/// Named sub-schemas hoisted to the root `definitions` object.
pub type Definitions = Map<String, Value>;

/// Keys emitted first, in this order, when ordered output is requested.
const LEADING_KEYS: &[&str] = &[
    "id",
    "$schema",
    "type",
    "$ref",
    "oneOf",
    "anyOf",
    "allOf",
    "not",
    "title",
    "description",
    "enum",
    "default",
];

/// Keys emitted last when ordered output is requested.
const TRAILING_KEYS: &[&str] = &["definitions"];

/// A literal value or a zero-argument producer evaluated at resolution time.
#[derive(Clone)]
pub enum Deferred<T> {
    Value(T),
    Producer(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T: Clone> Deferred<T> {
    /// Wrap a producer that is called every time the value is resolved.
    pub fn lazy(producer: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Deferred::Producer(Arc::new(producer))
    }

    /// Return the literal, or run the producer.
    pub fn evaluate(&self) -> T {
        match self {
            Deferred::Value(value) => value.clone(),
            Deferred::Producer(producer) => producer(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Deferred::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Policy for `additionalItems` / `additionalProperties`.
#[derive(Debug, Clone)]
pub enum Additional {
    /// Emitted as a boolean.
    Allowed(bool),
    /// Extra entries must match this field's schema.
    Schema(FieldRef),
}

impl From<bool> for Additional {
    fn from(allowed: bool) -> Self {
        Additional::Allowed(allowed)
    }
}

impl From<FieldRef> for Additional {
    fn from(field: FieldRef) -> Self {
        Additional::Schema(field)
    }
}

/// Finish an emitted schema object, reordering keys when `ordered` is set.
///
/// Ordering only moves conventional keys (`id`, `type`, `title`, ...) in
/// front of structural ones; it never changes the set of keys.
pub(crate) fn finish_schema(schema: Map<String, Value>, ordered: bool) -> Value {
    if !ordered {
        return Value::Object(schema);
    }

    let mut leading: Vec<Option<Value>> = vec![None; LEADING_KEYS.len()];
    let mut trailing: Vec<Option<Value>> = vec![None; TRAILING_KEYS.len()];
    let mut rest = Map::new();
    for (key, value) in schema {
        if let Some(idx) = LEADING_KEYS.iter().position(|k| *k == key) {
            leading[idx] = Some(value);
        } else if let Some(idx) = TRAILING_KEYS.iter().position(|k| *k == key) {
            trailing[idx] = Some(value);
        } else {
            rest.insert(key, value);
        }
    }

    let mut result = Map::new();
    for (key, value) in LEADING_KEYS.iter().zip(leading) {
        if let Some(value) = value {
            result.insert((*key).to_string(), value);
        }
    }
    result.extend(rest);
    for (key, value) in TRAILING_KEYS.iter().zip(trailing) {
        if let Some(value) = value {
            result.insert((*key).to_string(), value);
        }
    }
    Value::Object(result)
}
