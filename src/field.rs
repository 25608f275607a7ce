//! The field protocol shared by every node of a schema tree.

use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::{Map, Value};

use crate::document::{Document, DocumentField, DocumentSet};
use crate::error::SchemaError;
use crate::resolver::DocumentResolver;
use crate::roles::Resolvable;
use crate::scope::ResolutionScope;
use crate::types::{Deferred, Definitions, DEFAULT_ROLE};

/// Shared handle to a field. The same field may appear in several places.
pub type FieldRef = Arc<dyn Field>;

/// Settings shared by every node during one compilation or walk.
#[derive(Clone, Copy, Default)]
pub struct CompileContext<'a> {
    /// Reorder emitted keys for readability.
    pub ordered: bool,
    /// Lookup for documents referenced by name.
    pub resolver: Option<&'a dyn DocumentResolver>,
}

impl fmt::Debug for CompileContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileContext")
            .field("ordered", &self.ordered)
            .field("resolver", &self.resolver.map(|_| ".."))
            .finish()
    }
}

/// Options for [`Field::get_schema`] and [`Document::get_schema`].
#[derive(Clone)]
pub struct SchemaOptions<'a> {
    pub role: String,
    pub ordered: bool,
    pub scope: ResolutionScope,
    pub resolver: Option<&'a dyn DocumentResolver>,
}

impl Default for SchemaOptions<'_> {
    fn default() -> Self {
        Self {
            role: DEFAULT_ROLE.to_string(),
            ordered: false,
            scope: ResolutionScope::default(),
            resolver: None,
        }
    }
}

impl<'a> SchemaOptions<'a> {
    /// Options for the default role, unordered output, empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn scope(mut self, scope: ResolutionScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn resolver(mut self, resolver: &'a dyn DocumentResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub(crate) fn context(&self) -> CompileContext<'a> {
        CompileContext {
            ordered: self.ordered,
            resolver: self.resolver,
        }
    }
}

/// A node of the schema tree.
///
/// Implementations must not mutate themselves while compiling: the same tree
/// is compiled concurrently under different roles.
pub trait Field: fmt::Debug + Send + Sync {
    /// Whether the parent object lists this field in `required`.
    fn required(&self) -> &Resolvable<bool>;

    /// Compile this field for `role`, returning the definitions it references
    /// and its schema.
    ///
    /// Documents in `ref_documents` are never inlined; references to them
    /// compile to `$ref`s and their schemas are expected to be placed into
    /// the root definitions by the caller.
    fn definitions_and_schema(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
        scope: &ResolutionScope,
        ref_documents: &DocumentSet,
    ) -> Result<(Definitions, Value), SchemaError>;

    /// Present children for `role`, each paired with the role it resolves under.
    fn iter_fields(
        &self,
        _ctx: &CompileContext<'_>,
        _role: &str,
    ) -> Result<Vec<(FieldRef, String)>, SchemaError> {
        Ok(Vec::new())
    }

    /// False when the field resolves to nothing for `role` and should be
    /// skipped by its container.
    fn is_present(&self, _ctx: &CompileContext<'_>, _role: &str) -> Result<bool, SchemaError> {
        Ok(true)
    }

    /// Record `owner` on every document reference in this subtree that has
    /// none yet. Called once while a document is built.
    fn bind_owner(&self, _owner: &Weak<Document>) {}

    fn as_document_field(&self) -> Option<&DocumentField> {
        None
    }

    /// JSON Schema for this field with its definitions lifted under
    /// `definitions`.
    fn get_schema(&self, options: &SchemaOptions<'_>) -> Result<Value, SchemaError> {
        let ctx = options.context();
        let (definitions, mut schema) = self.definitions_and_schema(
            &ctx,
            &options.role,
            &options.scope,
            &DocumentSet::new(),
        )?;
        if !definitions.is_empty() {
            if let Value::Object(map) = &mut schema {
                map.insert("definitions".to_string(), Value::Object(definitions));
            }
        }
        Ok(schema)
    }

    fn into_ref(self) -> FieldRef
    where
        Self: Sized + 'static,
    {
        Arc::new(self)
    }
}

/// Attributes carried by every schema-bearing field.
#[derive(Debug, Clone)]
pub struct Common {
    pub id: String,
    pub required: Resolvable<bool>,
    pub title: Option<Resolvable<String>>,
    pub description: Option<Resolvable<String>>,
    pub enum_values: Option<Resolvable<Deferred<Vec<Value>>>>,
    pub default: Option<Resolvable<Deferred<Value>>>,
}

impl Default for Common {
    fn default() -> Self {
        Self {
            id: String::new(),
            required: Resolvable::Value(false),
            title: None,
            description: None,
            enum_values: None,
            default: None,
        }
    }
}

impl Common {
    pub fn get_enum(&self, role: &str) -> Option<Vec<Value>> {
        self.enum_values
            .as_ref()
            .and_then(|e| e.resolve(role))
            .map(Deferred::evaluate)
    }

    pub fn get_default(&self, role: &str) -> Option<Value> {
        self.default
            .as_ref()
            .and_then(|d| d.resolve(role))
            .map(Deferred::evaluate)
            .filter(|v| !v.is_null())
    }

    /// Write `id`, `title`, `description`, `enum` and `default` into `schema`.
    pub fn write_into(&self, schema: &mut Map<String, Value>, id: &str, role: &str) {
        if !id.is_empty() {
            schema.insert("id".to_string(), Value::String(id.to_string()));
        }
        if let Some(title) = resolve_opt(&self.title, role) {
            schema.insert("title".to_string(), Value::String(title.clone()));
        }
        if let Some(description) = resolve_opt(&self.description, role) {
            schema.insert(
                "description".to_string(),
                Value::String(description.clone()),
            );
        }
        if let Some(values) = self.get_enum(role).filter(|v| !v.is_empty()) {
            schema.insert("enum".to_string(), Value::Array(values));
        }
        if let Some(default) = self.get_default(role) {
            schema.insert("default".to_string(), default);
        }
    }
}

/// Resolve an optional attribute.
pub(crate) fn resolve_opt<'a, T>(value: &'a Option<Resolvable<T>>, role: &str) -> Option<&'a T> {
    value.as_ref().and_then(|v| v.resolve(role))
}

/// Resolve a child slot to a present field and the role it compiles under.
pub(crate) fn resolve_child(
    ctx: &CompileContext<'_>,
    child: &Resolvable<FieldRef>,
    role: &str,
) -> Result<Option<(FieldRef, String)>, SchemaError> {
    let resolution = child.resolve_2(role);
    let Some(field) = resolution.value else {
        return Ok(None);
    };
    if !field.is_present(ctx, &resolution.role)? {
        return Ok(None);
    }
    Ok(Some((Arc::clone(field), resolution.role)))
}

/// Compile a field and merge its definitions into `definitions`.
pub(crate) fn compile_into(
    ctx: &CompileContext<'_>,
    field: &FieldRef,
    role: &str,
    scope: &ResolutionScope,
    ref_documents: &DocumentSet,
    definitions: &mut Definitions,
) -> Result<Value, SchemaError> {
    let (nested, schema) = field.definitions_and_schema(ctx, role, scope, ref_documents)?;
    definitions.extend(nested);
    Ok(schema)
}

/// Builder methods for the attributes in [`Common`].
macro_rules! common_builders {
    () => {
        /// Local schema `id`, altering the resolution scope of nested fields.
        pub fn id(mut self, id: impl Into<String>) -> Self {
            self.common.id = id.into();
            self
        }

        pub fn required(
            mut self,
            required: impl Into<$crate::roles::Resolvable<bool>>,
        ) -> Self {
            self.common.required = required.into();
            self
        }

        pub fn title(mut self, title: impl Into<$crate::roles::Resolvable<String>>) -> Self {
            self.common.title = Some(title.into());
            self
        }

        pub fn description(
            mut self,
            description: impl Into<$crate::roles::Resolvable<String>>,
        ) -> Self {
            self.common.description = Some(description.into());
            self
        }

        /// Allowed values. A [`Deferred`](crate::Deferred) producer is called
        /// each time the schema is compiled.
        pub fn enum_values(
            mut self,
            values: impl Into<
                $crate::roles::Resolvable<$crate::types::Deferred<Vec<serde_json::Value>>>,
            >,
        ) -> Self {
            self.common.enum_values = Some(values.into());
            self
        }

        /// Default value, possibly a [`Deferred`](crate::Deferred) producer.
        pub fn default(
            mut self,
            default: impl Into<$crate::roles::Resolvable<$crate::types::Deferred<serde_json::Value>>>,
        ) -> Self {
            self.common.default = Some(default.into());
            self
        }
    };
}

pub(crate) use common_builders;
