//! Role-aware JSON Schema authoring
//!
//! Build JSON Schema draft 4 documents from typed field trees in which any
//! attribute may vary with the *role* the schema is compiled for, such as
//! `"request"` or `"response"`.
//!
//! # Example
//!
//! ```
//! use schema_roles::{not, Document, Field, NumberField, SchemaOptions, StringField, Var};
//! use serde_json::json;
//!
//! let task = Document::builder("Task")
//!     .field(
//!         "id",
//!         NumberField::integer().required(Var::new().when("response", true)),
//!     )
//!     .field("name", StringField::new().required(true).min_length(5))
//!     .field(
//!         "secret",
//!         Var::new().when(not("response"), StringField::new().into_ref()),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let response = task
//!     .get_schema(&SchemaOptions::new().role("response"))
//!     .unwrap();
//!
//! // Only the response marks "id" as required, and it never sees "secret".
//! assert_eq!(response["required"], json!(["id", "name"]));
//! assert!(response["properties"].get("secret").is_none());
//! ```
//!
//! # Resolution Rules
//!
//! | Variant entry | Matches |
//! |---------------|---------|
//! | `"role"` | exactly `role` |
//! | `not("role")` | every role except `role` |
//! | `Matcher::Any` | every role |
//! | `otherwise(..)` | used when no entry matches |
//!
//! The first matching entry wins. A variant with no match resolves to
//! nothing and the attribute or child is left out of the schema.
//!
//! # Documents and references
//!
//! A [`DocumentField`] points at another document directly, at its own
//! document with [`DocumentField::recursive`], or at a document looked up by
//! name through a [`DocumentResolver`]. Documents that reach themselves are
//! placed under `definitions` and referenced with `$ref`.

mod array;
mod composition;
mod dict;
mod document;
mod error;
mod field;
mod primitives;
mod resolver;
mod roles;
mod scope;
mod types;
mod walker;

pub use array::{ArrayField, Items};
pub use composition::{FieldList, NotField, OfField, OfKeyword};
pub use dict::{properties, DictField, Properties};
pub use document::{
    Document, DocumentBuilder, DocumentField, DocumentRef, DocumentSet, DocumentTarget,
};
pub use error::SchemaError;
pub use field::{CompileContext, Common, Field, FieldRef, SchemaOptions};
pub use primitives::{BooleanField, NumberField, StringField};
pub use resolver::{DocumentRegistry, DocumentResolver};
pub use roles::{not, Matcher, Resolution, Resolvable, Var};
pub use scope::ResolutionScope;
pub use types::{
    Additional, Deferred, Definitions, DEFAULT_ROLE, DRAFT4_SCHEMA_URI, RECURSIVE_REFERENCE,
};
pub use walker::Walker;
