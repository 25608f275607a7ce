//! Object fields.

use std::sync::Weak;

use serde_json::{Map, Value};

use crate::document::{Document, DocumentSet};
use crate::error::{validate_regex, SchemaError};
use crate::field::{
    common_builders, compile_into, resolve_child, resolve_opt, CompileContext, Common, Field,
    FieldRef,
};
use crate::roles::Resolvable;
use crate::scope::ResolutionScope;
use crate::types::{finish_schema, Additional, Definitions};

/// Ordered property declarations: name and (possibly role-dependent) field.
pub type Properties = Vec<(String, Resolvable<FieldRef>)>;

impl From<Properties> for Resolvable<Properties> {
    fn from(properties: Properties) -> Self {
        Resolvable::Value(properties)
    }
}

/// Build a [`Properties`] list from `(name, field)` pairs.
pub fn properties<I, K, F>(entries: I) -> Properties
where
    I: IntoIterator<Item = (K, F)>,
    K: Into<String>,
    F: Into<Resolvable<FieldRef>>,
{
    entries
        .into_iter()
        .map(|(name, field)| (name.into(), field.into()))
        .collect()
}

/// A dictionary (object) field.
#[derive(Debug, Clone)]
pub struct DictField {
    common: Common,
    properties: Option<Resolvable<Properties>>,
    pattern_properties: Option<Resolvable<Properties>>,
    additional_properties: Option<Resolvable<Additional>>,
    min_properties: Option<Resolvable<u64>>,
    max_properties: Option<Resolvable<u64>>,
}

impl DictField {
    pub fn new() -> Self {
        Self {
            common: Common::default(),
            properties: None,
            pattern_properties: None,
            additional_properties: None,
            min_properties: None,
            max_properties: None,
        }
    }

    common_builders!();

    pub fn properties(mut self, properties: impl Into<Resolvable<Properties>>) -> Self {
        self.properties = Some(properties.into());
        self
    }

    /// Fields for properties whose names match a regular expression.
    ///
    /// Keys of every variant are validated here, so an invalid expression
    /// fails while the field is declared rather than when it is compiled.
    pub fn pattern_properties(
        mut self,
        pattern_properties: impl Into<Resolvable<Properties>>,
    ) -> Result<Self, SchemaError> {
        let pattern_properties = pattern_properties.into();
        for properties in pattern_properties.iter_possible_values() {
            for (pattern, _) in properties {
                validate_regex(pattern)?;
            }
        }
        self.pattern_properties = Some(pattern_properties);
        Ok(self)
    }

    pub fn additional_properties(mut self, additional: impl Into<Resolvable<Additional>>) -> Self {
        self.additional_properties = Some(additional.into());
        self
    }

    pub fn min_properties(mut self, min_properties: impl Into<Resolvable<u64>>) -> Self {
        self.min_properties = Some(min_properties.into());
        self
    }

    pub fn max_properties(mut self, max_properties: impl Into<Resolvable<u64>>) -> Self {
        self.max_properties = Some(max_properties.into());
        self
    }

    /// Present `(name, field, role)` entries of a property map for `role`,
    /// or `None` when the map itself resolves to nothing.
    fn resolve_properties(
        ctx: &CompileContext<'_>,
        properties: &Option<Resolvable<Properties>>,
        role: &str,
    ) -> Result<Option<Vec<(String, FieldRef, String)>>, SchemaError> {
        let Some(properties) = properties else {
            return Ok(None);
        };
        let resolution = properties.resolve_2(role);
        let Some(entries) = resolution.value else {
            return Ok(None);
        };
        let mut resolved = Vec::with_capacity(entries.len());
        for (name, field) in entries {
            if let Some((field, field_role)) = resolve_child(ctx, field, &resolution.role)? {
                resolved.push((name.clone(), field, field_role));
            }
        }
        Ok(Some(resolved))
    }

    fn process_properties(
        ctx: &CompileContext<'_>,
        entries: &[(String, FieldRef, String)],
        scope: &ResolutionScope,
        ref_documents: &DocumentSet,
        definitions: &mut Definitions,
    ) -> Result<(Map<String, Value>, Vec<Value>), SchemaError> {
        let mut schema = Map::new();
        let mut required = Vec::new();
        for (name, field, field_role) in entries {
            let field_schema =
                compile_into(ctx, field, field_role, scope, ref_documents, definitions)?;
            if field.required().resolve(field_role) == Some(&true) {
                required.push(Value::String(name.clone()));
            }
            schema.insert(name.clone(), field_schema);
        }
        Ok((schema, required))
    }
}

impl Field for DictField {
    fn required(&self) -> &Resolvable<bool> {
        &self.common.required
    }

    fn definitions_and_schema(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
        scope: &ResolutionScope,
        ref_documents: &DocumentSet,
    ) -> Result<(Definitions, Value), SchemaError> {
        let (id, scope) = scope.alter(&self.common.id);
        let mut definitions = Definitions::new();
        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::from("object"));
        self.common.write_into(&mut schema, &id, role);

        if let Some(entries) = Self::resolve_properties(ctx, &self.properties, role)? {
            let (properties, required) =
                Self::process_properties(ctx, &entries, &scope, ref_documents, &mut definitions)?;
            schema.insert("properties".to_string(), Value::Object(properties));
            if !required.is_empty() {
                schema.insert("required".to_string(), Value::Array(required));
            }
        }

        if let Some(entries) = Self::resolve_properties(ctx, &self.pattern_properties, role)? {
            let (properties, _) =
                Self::process_properties(ctx, &entries, &scope, ref_documents, &mut definitions)?;
            schema.insert("patternProperties".to_string(), Value::Object(properties));
        }

        if let Some(additional) = &self.additional_properties {
            let resolution = additional.resolve_2(role);
            match resolution.value {
                Some(Additional::Allowed(allowed)) => {
                    schema.insert("additionalProperties".to_string(), Value::Bool(*allowed));
                }
                Some(Additional::Schema(field)) => {
                    let field_schema = compile_into(
                        ctx,
                        field,
                        &resolution.role,
                        &scope,
                        ref_documents,
                        &mut definitions,
                    )?;
                    schema.insert("additionalProperties".to_string(), field_schema);
                }
                None => {}
            }
        }

        if let Some(min_properties) = resolve_opt(&self.min_properties, role) {
            schema.insert("minProperties".to_string(), Value::from(*min_properties));
        }
        if let Some(max_properties) = resolve_opt(&self.max_properties, role) {
            schema.insert("maxProperties".to_string(), Value::from(*max_properties));
        }

        Ok((definitions, finish_schema(schema, ctx.ordered)))
    }

    fn iter_fields(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
    ) -> Result<Vec<(FieldRef, String)>, SchemaError> {
        let mut fields = Vec::new();
        for properties in [&self.properties, &self.pattern_properties] {
            if let Some(entries) = Self::resolve_properties(ctx, properties, role)? {
                fields.extend(
                    entries
                        .into_iter()
                        .map(|(_, field, field_role)| (field, field_role)),
                );
            }
        }
        if let Some(additional) = &self.additional_properties {
            let resolution = additional.resolve_2(role);
            if let Some(Additional::Schema(field)) = resolution.value {
                fields.push((field.clone(), resolution.role));
            }
        }
        Ok(fields)
    }

    fn bind_owner(&self, owner: &Weak<Document>) {
        for properties in [&self.properties, &self.pattern_properties]
            .into_iter()
            .flatten()
        {
            for entries in properties.iter_possible_values() {
                for field in entries.iter().flat_map(|(_, f)| f.iter_possible_values()) {
                    field.bind_owner(owner);
                }
            }
        }
        for additional in self
            .additional_properties
            .iter()
            .flat_map(|a| a.iter_possible_values())
        {
            if let Additional::Schema(field) = additional {
                field.bind_owner(owner);
            }
        }
    }
}
