//! Leaf fields: booleans, strings and numbers.

use serde_json::{Map, Value};

use crate::document::DocumentSet;
use crate::error::{validate_regex, SchemaError};
use crate::field::{common_builders, resolve_opt, CompileContext, Common, Field};
use crate::roles::Resolvable;
use crate::scope::ResolutionScope;
use crate::types::{finish_schema, Definitions};

/// A boolean field.
#[derive(Debug, Clone)]
pub struct BooleanField {
    common: Common,
}

impl BooleanField {
    pub fn new() -> Self {
        Self {
            common: Common::default(),
        }
    }

    common_builders!();
}

impl Field for BooleanField {
    fn required(&self) -> &Resolvable<bool> {
        &self.common.required
    }

    fn definitions_and_schema(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
        scope: &ResolutionScope,
        _ref_documents: &DocumentSet,
    ) -> Result<(Definitions, Value), SchemaError> {
        let (id, _) = scope.alter(&self.common.id);
        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::from("boolean"));
        self.common.write_into(&mut schema, &id, role);
        Ok((Definitions::new(), finish_schema(schema, ctx.ordered)))
    }
}

/// A string field.
#[derive(Debug, Clone)]
pub struct StringField {
    common: Common,
    pattern: Option<Resolvable<String>>,
    format: Option<Resolvable<String>>,
    min_length: Option<Resolvable<u64>>,
    max_length: Option<Resolvable<u64>>,
}

impl StringField {
    pub fn new() -> Self {
        Self {
            common: Common::default(),
            pattern: None,
            format: None,
            min_length: None,
            max_length: None,
        }
    }

    /// String with `"format": "email"`.
    pub fn email() -> Self {
        Self::new().format("email")
    }

    /// String with `"format": "ipv4"`.
    pub fn ipv4() -> Self {
        Self::new().format("ipv4")
    }

    /// ISO 8601 date-time string.
    pub fn date_time() -> Self {
        Self::new().format("date-time")
    }

    /// String with `"format": "uri"`.
    pub fn uri() -> Self {
        Self::new().format("uri")
    }

    common_builders!();

    /// Regular expression values must match. Every variant is checked here.
    pub fn pattern(mut self, pattern: impl Into<Resolvable<String>>) -> Result<Self, SchemaError> {
        let pattern = pattern.into();
        for value in pattern.iter_possible_values() {
            validate_regex(value)?;
        }
        self.pattern = Some(pattern);
        Ok(self)
    }

    pub fn format(mut self, format: impl Into<Resolvable<String>>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn min_length(mut self, min_length: impl Into<Resolvable<u64>>) -> Self {
        self.min_length = Some(min_length.into());
        self
    }

    pub fn max_length(mut self, max_length: impl Into<Resolvable<u64>>) -> Self {
        self.max_length = Some(max_length.into());
        self
    }
}

impl Field for StringField {
    fn required(&self) -> &Resolvable<bool> {
        &self.common.required
    }

    fn definitions_and_schema(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
        scope: &ResolutionScope,
        _ref_documents: &DocumentSet,
    ) -> Result<(Definitions, Value), SchemaError> {
        let (id, _) = scope.alter(&self.common.id);
        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::from("string"));
        self.common.write_into(&mut schema, &id, role);

        if let Some(pattern) = resolve_opt(&self.pattern, role).filter(|p| !p.is_empty()) {
            schema.insert("pattern".to_string(), Value::from(pattern.as_str()));
        }
        if let Some(min_length) = resolve_opt(&self.min_length, role) {
            schema.insert("minLength".to_string(), Value::from(*min_length));
        }
        if let Some(max_length) = resolve_opt(&self.max_length, role) {
            schema.insert("maxLength".to_string(), Value::from(*max_length));
        }
        if let Some(format) = resolve_opt(&self.format, role) {
            schema.insert("format".to_string(), Value::from(format.as_str()));
        }
        Ok((Definitions::new(), finish_schema(schema, ctx.ordered)))
    }
}

/// A number field; [`NumberField::integer`] emits `"type": "integer"`.
#[derive(Debug, Clone)]
pub struct NumberField {
    common: Common,
    number_type: &'static str,
    multiple_of: Option<Resolvable<Value>>,
    minimum: Option<Resolvable<Value>>,
    exclusive_minimum: Option<Resolvable<bool>>,
    maximum: Option<Resolvable<Value>>,
    exclusive_maximum: Option<Resolvable<bool>>,
}

impl NumberField {
    pub fn new() -> Self {
        Self::with_type("number")
    }

    pub fn integer() -> Self {
        Self::with_type("integer")
    }

    fn with_type(number_type: &'static str) -> Self {
        Self {
            common: Common::default(),
            number_type,
            multiple_of: None,
            minimum: None,
            exclusive_minimum: None,
            maximum: None,
            exclusive_maximum: None,
        }
    }

    common_builders!();

    pub fn multiple_of(mut self, multiple_of: impl Into<Resolvable<Value>>) -> Self {
        self.multiple_of = Some(multiple_of.into());
        self
    }

    pub fn minimum(mut self, minimum: impl Into<Resolvable<Value>>) -> Self {
        self.minimum = Some(minimum.into());
        self
    }

    pub fn exclusive_minimum(mut self, exclusive: impl Into<Resolvable<bool>>) -> Self {
        self.exclusive_minimum = Some(exclusive.into());
        self
    }

    pub fn maximum(mut self, maximum: impl Into<Resolvable<Value>>) -> Self {
        self.maximum = Some(maximum.into());
        self
    }

    pub fn exclusive_maximum(mut self, exclusive: impl Into<Resolvable<bool>>) -> Self {
        self.exclusive_maximum = Some(exclusive.into());
        self
    }
}

impl Field for NumberField {
    fn required(&self) -> &Resolvable<bool> {
        &self.common.required
    }

    fn definitions_and_schema(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
        scope: &ResolutionScope,
        _ref_documents: &DocumentSet,
    ) -> Result<(Definitions, Value), SchemaError> {
        let (id, _) = scope.alter(&self.common.id);
        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::from(self.number_type));
        self.common.write_into(&mut schema, &id, role);

        if let Some(multiple_of) = resolve_opt(&self.multiple_of, role) {
            schema.insert("multipleOf".to_string(), multiple_of.clone());
        }
        if let Some(minimum) = resolve_opt(&self.minimum, role) {
            schema.insert("minimum".to_string(), minimum.clone());
        }
        if resolve_opt(&self.exclusive_minimum, role) == Some(&true) {
            schema.insert("exclusiveMinimum".to_string(), Value::Bool(true));
        }
        if let Some(maximum) = resolve_opt(&self.maximum, role) {
            schema.insert("maximum".to_string(), maximum.clone());
        }
        if resolve_opt(&self.exclusive_maximum, role) == Some(&true) {
            schema.insert("exclusiveMaximum".to_string(), Value::Bool(true));
        }
        Ok((Definitions::new(), finish_schema(schema, ctx.ordered)))
    }
}
