//! Array fields.

use std::sync::Weak;

use serde_json::{Map, Value};

use crate::document::{Document, DocumentSet};
use crate::error::SchemaError;
use crate::field::{
    common_builders, compile_into, resolve_child, resolve_opt, CompileContext, Common, Field,
    FieldRef,
};
use crate::roles::Resolvable;
use crate::scope::ResolutionScope;
use crate::types::{finish_schema, Additional, Definitions};

/// Item typing of an array.
#[derive(Debug, Clone)]
pub enum Items {
    /// Every item matches this field.
    Single(Resolvable<FieldRef>),
    /// The item at each index matches the field at that index.
    Tuple(Vec<Resolvable<FieldRef>>),
}

impl From<FieldRef> for Resolvable<Items> {
    fn from(field: FieldRef) -> Self {
        Resolvable::Value(Items::Single(Resolvable::Value(field)))
    }
}

impl From<Items> for Resolvable<Items> {
    fn from(items: Items) -> Self {
        Resolvable::Value(items)
    }
}

impl<F: Field + 'static> From<F> for Resolvable<Items> {
    fn from(field: F) -> Self {
        Resolvable::Value(Items::Single(field.into()))
    }
}

/// An array field.
#[derive(Debug, Clone)]
pub struct ArrayField {
    common: Common,
    items: Resolvable<Items>,
    additional_items: Option<Resolvable<Additional>>,
    min_items: Option<Resolvable<u64>>,
    max_items: Option<Resolvable<u64>>,
    unique_items: Option<Resolvable<bool>>,
}

impl ArrayField {
    pub fn new(items: impl Into<Resolvable<Items>>) -> Self {
        Self {
            common: Common::default(),
            items: items.into(),
            additional_items: None,
            min_items: None,
            max_items: None,
            unique_items: None,
        }
    }

    /// Array typed positionally by `items`.
    pub fn tuple<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Resolvable<FieldRef>>,
    {
        Self::new(Items::Tuple(items.into_iter().map(Into::into).collect()))
    }

    common_builders!();

    /// Schema (or permission) for items past the end of a tuple.
    pub fn additional_items(mut self, additional: impl Into<Resolvable<Additional>>) -> Self {
        self.additional_items = Some(additional.into());
        self
    }

    pub fn min_items(mut self, min_items: impl Into<Resolvable<u64>>) -> Self {
        self.min_items = Some(min_items.into());
        self
    }

    pub fn max_items(mut self, max_items: impl Into<Resolvable<u64>>) -> Self {
        self.max_items = Some(max_items.into());
        self
    }

    pub fn unique_items(mut self, unique_items: impl Into<Resolvable<bool>>) -> Self {
        self.unique_items = Some(unique_items.into());
        self
    }

    /// Present item fields for `role`.
    fn resolve_items(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
    ) -> Result<Option<ResolvedItems>, SchemaError> {
        let resolution = self.items.resolve_2(role);
        let Some(items) = resolution.value else {
            return Ok(None);
        };
        let resolved = match items {
            Items::Single(item) => {
                ResolvedItems::Single(resolve_child(ctx, item, &resolution.role)?)
            }
            Items::Tuple(items) => {
                let mut fields = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(field) = resolve_child(ctx, item, &resolution.role)? {
                        fields.push(field);
                    }
                }
                ResolvedItems::Tuple(fields)
            }
        };
        Ok(Some(resolved))
    }
}

enum ResolvedItems {
    Single(Option<(FieldRef, String)>),
    Tuple(Vec<(FieldRef, String)>),
}

impl Field for ArrayField {
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
        schema.insert("type".to_string(), Value::from("array"));

        match self.resolve_items(ctx, role)? {
            // A variant item that resolves to nothing leaves the array untyped.
            None | Some(ResolvedItems::Single(None)) => {}
            Some(ResolvedItems::Single(Some((field, field_role)))) => {
                self.common.write_into(&mut schema, &id, role);
                let item = compile_into(
                    ctx,
                    &field,
                    &field_role,
                    &scope,
                    ref_documents,
                    &mut definitions,
                )?;
                schema.insert("items".to_string(), item);
            }
            Some(ResolvedItems::Tuple(fields)) => {
                self.common.write_into(&mut schema, &id, role);
                let mut items = Vec::with_capacity(fields.len());
                for (field, field_role) in &fields {
                    items.push(compile_into(
                        ctx,
                        field,
                        field_role,
                        &scope,
                        ref_documents,
                        &mut definitions,
                    )?);
                }
                schema.insert("items".to_string(), Value::Array(items));
            }
        }

        if let Some(additional) = &self.additional_items {
            let resolution = additional.resolve_2(role);
            match resolution.value {
                Some(Additional::Allowed(allowed)) => {
                    schema.insert("additionalItems".to_string(), Value::Bool(*allowed));
                }
                Some(Additional::Schema(field)) => {
                    let item = compile_into(
                        ctx,
                        field,
                        &resolution.role,
                        &scope,
                        ref_documents,
                        &mut definitions,
                    )?;
                    schema.insert("additionalItems".to_string(), item);
                }
                None => {}
            }
        }

        if let Some(min_items) = resolve_opt(&self.min_items, role) {
            schema.insert("minItems".to_string(), Value::from(*min_items));
        }
        if let Some(max_items) = resolve_opt(&self.max_items, role) {
            schema.insert("maxItems".to_string(), Value::from(*max_items));
        }
        if resolve_opt(&self.unique_items, role) == Some(&true) {
            schema.insert("uniqueItems".to_string(), Value::Bool(true));
        }

        Ok((definitions, finish_schema(schema, ctx.ordered)))
    }

    fn iter_fields(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
    ) -> Result<Vec<(FieldRef, String)>, SchemaError> {
        let mut fields = match self.resolve_items(ctx, role)? {
            None | Some(ResolvedItems::Single(None)) => Vec::new(),
            Some(ResolvedItems::Single(Some(field))) => vec![field],
            Some(ResolvedItems::Tuple(fields)) => fields,
        };
        if let Some(additional) = &self.additional_items {
            let resolution = additional.resolve_2(role);
            if let Some(Additional::Schema(field)) = resolution.value {
                fields.push((field.clone(), resolution.role));
            }
        }
        Ok(fields)
    }

    fn bind_owner(&self, owner: &Weak<Document>) {
        for items in self.items.iter_possible_values() {
            match items {
                Items::Single(item) => {
                    for field in item.iter_possible_values() {
                        field.bind_owner(owner);
                    }
                }
                Items::Tuple(items) => {
                    for field in items.iter().flat_map(|item| item.iter_possible_values()) {
                        field.bind_owner(owner);
                    }
                }
            }
        }
        for additional in self.additional_items.iter().flat_map(|a| a.iter_possible_values()) {
            if let Additional::Schema(field) = additional {
                field.bind_owner(owner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::SchemaOptions;
    use crate::primitives::{NumberField, StringField};
    use crate::roles::Var;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn role_1<T>(value: T) -> Var<T> {
        Var::new().when("role_1", value)
    }

    #[test]
    fn items_resolve_per_role() {
        let string = StringField::new().into_ref();
        let number = NumberField::new().into_ref();
        let field = ArrayField::new(
            Var::new()
                .when("role_1", Items::Single(string.into()))
                .when("role_2", Items::Single(number.into())),
        );

        let schema = field.get_schema(&SchemaOptions::new().role("role_1")).unwrap();
        assert_eq!(schema["items"], json!({ "type": "string" }));

        let schema = field.get_schema(&SchemaOptions::new().role("role_2")).unwrap();
        assert_eq!(schema["items"], json!({ "type": "number" }));

        let schema = field.get_schema(&SchemaOptions::new()).unwrap();
        assert!(schema.get("items").is_none());
    }

    #[test]
    fn array_constraints_resolve_per_role() {
        let field = ArrayField::new(StringField::new())
            .min_items(role_1(1))
            .max_items(role_1(2))
            .unique_items(role_1(true))
            .additional_items(role_1(Additional::Allowed(true)));

        assert_eq!(
            field.get_schema(&SchemaOptions::new()).unwrap(),
            json!({ "type": "array", "items": { "type": "string" } })
        );
        assert_eq!(
            field.get_schema(&SchemaOptions::new().role("role_1")).unwrap(),
            json!({
                "type": "array",
                "items": { "type": "string" },
                "minItems": 1,
                "maxItems": 2,
                "uniqueItems": true,
                "additionalItems": true
            })
        );
    }

    #[test]
    fn tuple_items_skip_absent_positions() {
        let items: [Resolvable<FieldRef>; 2] = [
            StringField::new().into(),
            Var::new().when("role_1", NumberField::new().into_ref()).into(),
        ];
        let field = ArrayField::tuple(items).additional_items(NumberField::integer());

        assert_eq!(
            field.get_schema(&SchemaOptions::new()).unwrap(),
            json!({
                "type": "array",
                "items": [{ "type": "string" }],
                "additionalItems": { "type": "integer" }
            })
        );
        assert_eq!(
            field.get_schema(&SchemaOptions::new().role("role_1")).unwrap()["items"],
            json!([{ "type": "string" }, { "type": "number" }])
        );
    }

    #[test]
    fn iter_fields_lists_items_and_additional_items() {
        let string = StringField::new().into_ref();
        let integer = NumberField::integer().into_ref();
        let field = ArrayField::new(string.clone()).additional_items(integer.clone());
        let ctx = CompileContext::default();
        let fields = field.iter_fields(&ctx, "default").unwrap();
        assert_eq!(fields.len(), 2);
        assert!(std::sync::Arc::ptr_eq(&fields[0].0, &string));
        assert!(std::sync::Arc::ptr_eq(&fields[1].0, &integer));
    }
}
