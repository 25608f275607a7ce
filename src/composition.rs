//! Composition fields: `oneOf`, `anyOf`, `allOf` and `not`.

use std::sync::Weak;

use serde_json::{Map, Value};

use crate::document::{Document, DocumentSet};
use crate::error::SchemaError;
use crate::field::{
    common_builders, compile_into, resolve_child, CompileContext, Common, Field, FieldRef,
};
use crate::roles::Resolvable;
use crate::scope::ResolutionScope;
use crate::types::{finish_schema, Definitions};

/// Keyword emitted by an [`OfField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfKeyword {
    OneOf,
    AnyOf,
    AllOf,
}

impl OfKeyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfKeyword::OneOf => "oneOf",
            OfKeyword::AnyOf => "anyOf",
            OfKeyword::AllOf => "allOf",
        }
    }
}

/// List of alternatives; each entry may itself be role-dependent.
pub type FieldList = Vec<Resolvable<FieldRef>>;

impl From<FieldList> for Resolvable<FieldList> {
    fn from(fields: FieldList) -> Self {
        Resolvable::Value(fields)
    }
}

/// A field combining other fields under `oneOf`, `anyOf` or `allOf`.
#[derive(Debug, Clone)]
pub struct OfField {
    common: Common,
    keyword: OfKeyword,
    fields: Resolvable<FieldList>,
}

impl OfField {
    pub fn new(keyword: OfKeyword, fields: impl Into<Resolvable<FieldList>>) -> Self {
        Self {
            common: Common::default(),
            keyword,
            fields: fields.into(),
        }
    }

    /// Exactly one of the fields describes the data.
    pub fn one_of(fields: impl Into<Resolvable<FieldList>>) -> Self {
        Self::new(OfKeyword::OneOf, fields)
    }

    /// At least one of the fields describes the data.
    pub fn any_of(fields: impl Into<Resolvable<FieldList>>) -> Self {
        Self::new(OfKeyword::AnyOf, fields)
    }

    /// All of the fields describe the data.
    pub fn all_of(fields: impl Into<Resolvable<FieldList>>) -> Self {
        Self::new(OfKeyword::AllOf, fields)
    }

    common_builders!();

    fn present_fields(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
    ) -> Result<Vec<(FieldRef, String)>, SchemaError> {
        let resolution = self.fields.resolve_2(role);
        let mut present = Vec::new();
        for field in resolution.value.into_iter().flatten() {
            if let Some(child) = resolve_child(ctx, field, &resolution.role)? {
                present.push(child);
            }
        }
        Ok(present)
    }
}

impl Field for OfField {
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
        let mut alternatives = Vec::new();
        for (field, field_role) in self.present_fields(ctx, role)? {
            alternatives.push(compile_into(
                ctx,
                &field,
                &field_role,
                &scope,
                ref_documents,
                &mut definitions,
            )?);
        }

        let mut schema = Map::new();
        schema.insert(
            self.keyword.as_str().to_string(),
            Value::Array(alternatives),
        );
        self.common.write_into(&mut schema, &id, role);
        Ok((definitions, finish_schema(schema, ctx.ordered)))
    }

    fn iter_fields(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
    ) -> Result<Vec<(FieldRef, String)>, SchemaError> {
        self.present_fields(ctx, role)
    }

    fn bind_owner(&self, owner: &Weak<Document>) {
        for fields in self.fields.iter_possible_values() {
            for field in fields.iter().flat_map(|f| f.iter_possible_values()) {
                field.bind_owner(owner);
            }
        }
    }
}

/// A field negating another field. A child that resolves to nothing
/// negates the empty schema.
#[derive(Debug, Clone)]
pub struct NotField {
    common: Common,
    field: Resolvable<FieldRef>,
}

impl NotField {
    pub fn new(field: impl Into<Resolvable<FieldRef>>) -> Self {
        Self {
            common: Common::default(),
            field: field.into(),
        }
    }

    common_builders!();
}

impl Field for NotField {
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
        let negated = match resolve_child(ctx, &self.field, role)? {
            Some((field, field_role)) => compile_into(
                ctx,
                &field,
                &field_role,
                &scope,
                ref_documents,
                &mut definitions,
            )?,
            None => Value::Object(Map::new()),
        };

        let mut schema = Map::new();
        schema.insert("not".to_string(), negated);
        self.common.write_into(&mut schema, &id, role);
        Ok((definitions, finish_schema(schema, ctx.ordered)))
    }

    fn iter_fields(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
    ) -> Result<Vec<(FieldRef, String)>, SchemaError> {
        Ok(resolve_child(ctx, &self.field, role)?.into_iter().collect())
    }

    fn bind_owner(&self, owner: &Weak<Document>) {
        for field in self.field.iter_possible_values() {
            field.bind_owner(owner);
        }
    }
}
