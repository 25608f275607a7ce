//! Documents and references to them.
//!
//! A [`Document`] is a named, ordered set of properties compiled to an object
//! schema. Other fields point at documents through a [`DocumentField`],
//! either directly, through the self-reference sentinel, or by name via a
//! [`DocumentResolver`](crate::DocumentResolver). Documents that can reach
//! themselves through such references are hoisted into `definitions` and
//! referenced with `$ref`, which keeps self and mutual references finite.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, Weak};

use serde_json::{Map, Value};
use tracing::debug;

use crate::dict::{DictField, Properties};
use crate::error::SchemaError;
use crate::field::{CompileContext, Field, FieldRef, SchemaOptions};
use crate::roles::Resolvable;
use crate::scope::ResolutionScope;
use crate::types::{
    finish_schema, Additional, Definitions, DRAFT4_SCHEMA_URI, RECURSIVE_REFERENCE,
};
use crate::walker::Walker;

/// Shared handle to a document; its address is its identity.
pub type DocumentRef = Arc<Document>;

/// Identity set of documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: HashMap<usize, DocumentRef>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, document: &DocumentRef) -> bool {
        self.documents.contains_key(&key(document))
    }

    /// Returns false if the document was already present.
    pub fn insert(&mut self, document: &DocumentRef) -> bool {
        self.documents
            .insert(key(document), Arc::clone(document))
            .is_none()
    }

    /// A copy of this set that also contains `document`.
    pub fn with(&self, document: &DocumentRef) -> Self {
        let mut set = self.clone();
        set.insert(document);
        set
    }

    pub(crate) fn len(&self) -> usize {
        self.documents.len()
    }
}

impl FromIterator<DocumentRef> for DocumentSet {
    fn from_iter<I: IntoIterator<Item = DocumentRef>>(iter: I) -> Self {
        let mut set = Self::new();
        for document in iter {
            set.insert(&document);
        }
        set
    }
}

fn key(document: &DocumentRef) -> usize {
    Arc::as_ptr(document) as usize
}

/// A named collection of properties compiled to an object schema.
#[derive(Debug)]
pub struct Document {
    name: String,
    namespace: Option<String>,
    definition_id: String,
    schema_uri: String,
    schema_id: String,
    backend: DictField,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl Document {
    /// Start declaring a document. `name` also serves as the default
    /// definition id.
    pub fn builder(name: impl Into<String>) -> DocumentBuilder {
        DocumentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace used as a fallback when resolving document names.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// `namespace.name`, or just the name without a namespace.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}.{}", namespace, self.name),
            None => self.name.clone(),
        }
    }

    pub fn definition_id(&self) -> &str {
        &self.definition_id
    }

    /// Present fields of this document for `role`.
    pub fn iter_fields(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
    ) -> Result<Vec<(FieldRef, String)>, SchemaError> {
        self.backend.iter_fields(ctx, role)
    }

    /// True when this document can reach itself through document references
    /// under `role`.
    pub fn is_recursive(
        self: &Arc<Self>,
        ctx: &CompileContext<'_>,
        role: &str,
    ) -> Result<bool, SchemaError> {
        let walker = Walker::new(*ctx).through_document_fields(true);
        for field in walker.walk_document(self, role)? {
            if let Some(reference) = field.as_document_field() {
                if let Some(target) = reference.document(ctx, role)? {
                    if Arc::ptr_eq(&target, self) {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Compile this document, returning nested definitions and its schema.
    ///
    /// A recursive document adds itself to `ref_documents`, moves its own
    /// schema into the returned definitions and returns a `$ref` to it.
    pub fn definitions_and_schema(
        self: &Arc<Self>,
        ctx: &CompileContext<'_>,
        role: &str,
        scope: &ResolutionScope,
        ref_documents: &DocumentSet,
    ) -> Result<(Definitions, Value), SchemaError> {
        if !self.is_recursive(ctx, role)? {
            return self
                .backend
                .definitions_and_schema(ctx, role, scope, ref_documents);
        }

        let ref_documents = ref_documents.with(self);
        let (mut definitions, schema) =
            self.backend
                .definitions_and_schema(ctx, role, scope, &ref_documents)?;
        debug!(
            document = %self.name,
            definition_id = %self.definition_id,
            role,
            "hoisting recursive document into definitions"
        );
        definitions.insert(self.definition_id.clone(), schema);
        Ok((definitions, scope.create_ref(&self.definition_id)))
    }

    /// Full JSON Schema for this document, with `$schema` and `definitions`.
    pub fn get_schema(
        self: &Arc<Self>,
        options: &SchemaOptions<'_>,
    ) -> Result<Value, SchemaError> {
        let ctx = options.context();
        let scope = if options.scope == ResolutionScope::default() {
            ResolutionScope::new(self.schema_id.as_str())
        } else {
            options.scope.clone()
        };
        let (definitions, schema) =
            self.definitions_and_schema(&ctx, &options.role, &scope, &DocumentSet::new())?;

        let mut schema = match schema {
            Value::Object(map) => map,
            other => return Ok(other),
        };
        schema.insert("$schema".to_string(), Value::from(self.schema_uri.as_str()));
        if !definitions.is_empty() {
            schema.insert("definitions".to_string(), Value::Object(definitions));
        }
        Ok(finish_schema(schema, ctx.ordered))
    }
}

/// Builder for [`Document`]: an explicit ordered list of properties plus
/// document options.
#[derive(Debug)]
pub struct DocumentBuilder {
    name: String,
    namespace: Option<String>,
    definition_id: Option<String>,
    schema_uri: String,
    id: String,
    properties: Properties,
    title: Option<Resolvable<String>>,
    description: Option<Resolvable<String>>,
    additional_properties: Resolvable<Additional>,
    pattern_properties: Option<Resolvable<Properties>>,
    min_properties: Option<Resolvable<u64>>,
    max_properties: Option<Resolvable<u64>>,
}

impl DocumentBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            definition_id: None,
            schema_uri: DRAFT4_SCHEMA_URI.to_string(),
            id: String::new(),
            properties: Properties::new(),
            title: None,
            description: None,
            additional_properties: Resolvable::Value(Additional::Allowed(false)),
            pattern_properties: None,
            min_properties: None,
            max_properties: None,
        }
    }

    /// Declare a property. Properties keep declaration order.
    pub fn field(
        mut self,
        name: impl Into<String>,
        field: impl Into<Resolvable<FieldRef>>,
    ) -> Self {
        self.properties.push((name.into(), field.into()));
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn definition_id(mut self, definition_id: impl Into<String>) -> Self {
        self.definition_id = Some(definition_id.into());
        self
    }

    /// Dialect URI stamped as `$schema`.
    pub fn schema_uri(mut self, schema_uri: impl Into<String>) -> Self {
        self.schema_uri = schema_uri.into();
        self
    }

    /// Schema `id`; also the base URI of the top-level resolution scope.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn title(mut self, title: impl Into<Resolvable<String>>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<Resolvable<String>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Policy for undeclared properties. Defaults to `false`.
    pub fn additional_properties(
        mut self,
        additional: impl Into<Resolvable<Additional>>,
    ) -> Self {
        self.additional_properties = additional.into();
        self
    }

    /// Validated by [`DocumentBuilder::build`].
    pub fn pattern_properties(
        mut self,
        pattern_properties: impl Into<Resolvable<Properties>>,
    ) -> Self {
        self.pattern_properties = Some(pattern_properties.into());
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

    /// Finish the document and bind it as owner of its document references.
    pub fn build(self) -> Result<DocumentRef, SchemaError> {
        let mut backend = DictField::new()
            .id(self.id.clone())
            .properties(self.properties)
            .additional_properties(self.additional_properties);
        if let Some(title) = self.title {
            backend = backend.title(title);
        }
        if let Some(description) = self.description {
            backend = backend.description(description);
        }
        if let Some(pattern_properties) = self.pattern_properties {
            backend = backend.pattern_properties(pattern_properties)?;
        }
        if let Some(min_properties) = self.min_properties {
            backend = backend.min_properties(min_properties);
        }
        if let Some(max_properties) = self.max_properties {
            backend = backend.max_properties(max_properties);
        }

        let document = Arc::new(Document {
            definition_id: self.definition_id.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            namespace: self.namespace,
            schema_uri: self.schema_uri,
            schema_id: self.id,
            backend,
        });
        document.backend.bind_owner(&Arc::downgrade(&document));
        Ok(document)
    }
}

/// What a [`DocumentField`] points at.
#[derive(Debug, Clone)]
pub enum DocumentTarget {
    Document(DocumentRef),
    /// The document owning the field.
    Recursive,
    /// A dotted name looked up through the configured resolver.
    Named(String),
}

impl DocumentTarget {
    /// Target for a name; [`RECURSIVE_REFERENCE`] means the owning document.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == RECURSIVE_REFERENCE {
            DocumentTarget::Recursive
        } else {
            DocumentTarget::Named(name)
        }
    }
}

impl From<DocumentRef> for DocumentTarget {
    fn from(document: DocumentRef) -> Self {
        DocumentTarget::Document(document)
    }
}

impl From<DocumentRef> for Resolvable<DocumentTarget> {
    fn from(document: DocumentRef) -> Self {
        Resolvable::Value(DocumentTarget::Document(document))
    }
}

impl From<DocumentTarget> for Resolvable<DocumentTarget> {
    fn from(target: DocumentTarget) -> Self {
        Resolvable::Value(target)
    }
}

/// A reference to a document.
#[derive(Debug)]
pub struct DocumentField {
    target: Resolvable<DocumentTarget>,
    owner: OnceLock<Weak<Document>>,
    as_ref: bool,
    required: Resolvable<bool>,
}

impl DocumentField {
    pub fn new(target: impl Into<Resolvable<DocumentTarget>>) -> Self {
        Self {
            target: target.into(),
            owner: OnceLock::new(),
            as_ref: false,
            required: Resolvable::Value(false),
        }
    }

    /// Reference to the document that owns this field.
    pub fn recursive() -> Self {
        Self::new(DocumentTarget::Recursive)
    }

    /// Reference to a document looked up by name at compile time.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(DocumentTarget::named(name))
    }

    /// Place the document schema into `definitions` and emit a `$ref` to it.
    pub fn as_ref(mut self, as_ref: bool) -> Self {
        self.as_ref = as_ref;
        self
    }

    pub fn required(mut self, required: impl Into<Resolvable<bool>>) -> Self {
        self.required = required.into();
        self
    }

    /// The owning document, if it is still alive.
    pub fn owner(&self) -> Option<DocumentRef> {
        self.owner.get().and_then(Weak::upgrade)
    }

    /// Resolve the referenced document for `role`.
    ///
    /// `Ok(None)` means the target variant has no entry for `role`.
    pub fn document(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
    ) -> Result<Option<DocumentRef>, SchemaError> {
        let Some(target) = self.target.resolve(role) else {
            return Ok(None);
        };
        match target {
            DocumentTarget::Document(document) => Ok(Some(Arc::clone(document))),
            DocumentTarget::Recursive => self.owner().map(Some).ok_or(SchemaError::MissingOwner),
            DocumentTarget::Named(name) => self.lookup(ctx, name).map(Some),
        }
    }

    fn lookup(&self, ctx: &CompileContext<'_>, name: &str) -> Result<DocumentRef, SchemaError> {
        let resolver = ctx.resolver.ok_or_else(|| SchemaError::NoResolver {
            name: name.to_string(),
        })?;
        if let Some(document) = resolver.resolve(name) {
            return Ok(document);
        }
        let namespace = self
            .owner()
            .and_then(|owner| owner.namespace().map(str::to_string));
        namespace
            .and_then(|namespace| resolver.resolve(&format!("{}.{}", namespace, name)))
            .ok_or_else(|| SchemaError::DocumentNotFound {
                name: name.to_string(),
            })
    }
}

impl Field for DocumentField {
    fn required(&self) -> &Resolvable<bool> {
        &self.required
    }

    fn definitions_and_schema(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
        scope: &ResolutionScope,
        ref_documents: &DocumentSet,
    ) -> Result<(Definitions, Value), SchemaError> {
        let Some(document) = self.document(ctx, role)? else {
            return Ok((Definitions::new(), Value::Object(Map::new())));
        };
        let definition_id = document.definition_id();
        if ref_documents.contains(&document) {
            debug!(document = %document.name(), definition_id, "collapsing reference to $ref");
            return Ok((Definitions::new(), scope.create_ref(definition_id)));
        }

        let (mut definitions, schema) =
            document.definitions_and_schema(ctx, role, scope, ref_documents)?;
        if self.as_ref && !document.is_recursive(ctx, role)? {
            definitions.insert(definition_id.to_string(), schema);
            return Ok((definitions, scope.create_ref(definition_id)));
        }
        Ok((definitions, schema))
    }

    fn iter_fields(
        &self,
        ctx: &CompileContext<'_>,
        role: &str,
    ) -> Result<Vec<(FieldRef, String)>, SchemaError> {
        match self.document(ctx, role)? {
            Some(document) => document.iter_fields(ctx, role),
            None => Ok(Vec::new()),
        }
    }

    fn is_present(&self, ctx: &CompileContext<'_>, role: &str) -> Result<bool, SchemaError> {
        Ok(self.document(ctx, role)?.is_some())
    }

    fn bind_owner(&self, owner: &Weak<Document>) {
        // The first document to claim a shared field keeps it.
        let _ = self.owner.set(owner.clone());
    }

    fn as_document_field(&self) -> Option<&DocumentField> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{NumberField, StringField};
    use crate::roles::Var;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn document_compiles_to_object_schema() {
        let document = Document::builder("Item")
            .field("name", StringField::new().required(true).min_length(5))
            .field(
                "tag",
                StringField::new().enum_values(vec![json!("X"), json!("Y")]),
            )
            .build()
            .unwrap();
        let ctx = CompileContext::default();
        let (definitions, schema) = document
            .definitions_and_schema(&ctx, "default", &ResolutionScope::default(), &DocumentSet::new())
            .unwrap();
        assert!(definitions.is_empty());
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "name": { "type": "string", "minLength": 5 },
                    "tag": { "type": "string", "enum": ["X", "Y"] }
                },
                "required": ["name"]
            })
        );
    }

    #[test]
    fn definition_id_defaults_to_name() {
        let document = Document::builder("User").build().unwrap();
        assert_eq!(document.definition_id(), "User");
        let document = Document::builder("Task").definition_id("task").build().unwrap();
        assert_eq!(document.definition_id(), "task");
    }

    #[test]
    fn self_reference_compiles_to_ref() {
        let document = Document::builder("A")
            .field("id", NumberField::integer().required(true))
            .field("next", DocumentField::recursive())
            .build()
            .unwrap();

        let schema = document.get_schema(&SchemaOptions::new()).unwrap();
        assert_eq!(
            schema,
            json!({
                "$schema": DRAFT4_SCHEMA_URI,
                "$ref": "#/definitions/A",
                "definitions": {
                    "A": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {
                            "id": { "type": "integer" },
                            "next": { "$ref": "#/definitions/A" }
                        },
                        "required": ["id"]
                    }
                }
            })
        );
    }

    #[test]
    fn recursive_document_referenced_as_ref_keeps_its_body() {
        let node = Document::builder("A")
            .field("id", NumberField::integer().required(true))
            .field("next", DocumentField::recursive())
            .build()
            .unwrap();
        let field = DocumentField::new(node).as_ref(true);
        let ctx = CompileContext::default();
        let (definitions, schema) = field
            .definitions_and_schema(&ctx, "default", &ResolutionScope::default(), &DocumentSet::new())
            .unwrap();

        assert_eq!(schema, json!({ "$ref": "#/definitions/A" }));
        assert_eq!(definitions.len(), 1);
        assert_eq!(
            definitions["A"]["properties"]["next"],
            json!({ "$ref": "#/definitions/A" })
        );
    }

    #[test]
    fn as_ref_moves_plain_document_into_definitions() {
        let user = Document::builder("User")
            .field("login", StringField::new().required(true))
            .build()
            .unwrap();
        let field = DocumentField::new(user).as_ref(true);
        let schema = field.get_schema(&SchemaOptions::new()).unwrap();
        assert_eq!(
            schema,
            json!({
                "$ref": "#/definitions/User",
                "definitions": {
                    "User": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": { "login": { "type": "string" } },
                        "required": ["login"]
                    }
                }
            })
        );
    }

    #[test]
    fn documents_in_ref_documents_are_not_inlined() {
        let user = Document::builder("User").build().unwrap();
        let field = DocumentField::new(user.clone());
        let ctx = CompileContext::default();
        let ref_documents: DocumentSet = [user].into_iter().collect();
        let (definitions, schema) = field
            .definitions_and_schema(&ctx, "default", &ResolutionScope::default(), &ref_documents)
            .unwrap();
        assert!(definitions.is_empty());
        assert_eq!(schema, json!({ "$ref": "#/definitions/User" }));
    }

    #[test]
    fn self_reference_without_owner_is_an_error() {
        let field = DocumentField::recursive();
        let err = field.get_schema(&SchemaOptions::new()).unwrap_err();
        assert!(matches!(err, SchemaError::MissingOwner));
    }

    #[test]
    fn target_may_depend_on_role() {
        let x = Document::builder("X").build().unwrap();
        let y = Document::builder("Y").build().unwrap();
        let field = DocumentField::new(
            Var::new()
                .when("role_1", DocumentTarget::from(x.clone()))
                .when("role_2", DocumentTarget::from(y.clone())),
        );
        let ctx = CompileContext::default();
        assert!(field.document(&ctx, "default").unwrap().is_none());
        assert!(Arc::ptr_eq(&field.document(&ctx, "role_1").unwrap().unwrap(), &x));
        assert!(Arc::ptr_eq(&field.document(&ctx, "role_2").unwrap().unwrap(), &y));

        // An absent target contributes nothing to its container.
        let holder = Document::builder("Holder").field("x", field).build().unwrap();
        let schema = holder.get_schema(&SchemaOptions::new()).unwrap();
        assert_eq!(schema["properties"], json!({}));
    }

    #[test]
    fn document_set_uses_identity() {
        let a = Document::builder("Same").build().unwrap();
        let b = Document::builder("Same").build().unwrap();
        let mut set = DocumentSet::new();
        assert!(set.insert(&a));
        assert!(!set.insert(&a));
        assert!(set.contains(&a));
        assert!(!set.contains(&b));
        assert_eq!(set.with(&b).len(), 2);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn pattern_properties_are_validated_on_build() {
        let result = Document::builder("Bad")
            .pattern_properties(crate::dict::properties([("[", StringField::new())]))
            .build();
        assert!(matches!(result, Err(SchemaError::InvalidRegex { .. })));
    }
}
