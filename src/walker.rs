//! Depth-first traversal of field trees.

use std::sync::Arc;

use tracing::trace;

use crate::document::{DocumentRef, DocumentSet};
use crate::error::SchemaError;
use crate::field::{CompileContext, FieldRef};

/// Collects the fields of a tree in depth-first order.
///
/// By default a document reference is yielded but not entered. With
/// [`Walker::through_document_fields`] the walk continues into the referenced
/// document, entering each document at most once per path so that
/// self-referencing and mutually referencing documents terminate.
#[derive(Debug, Clone, Copy)]
pub struct Walker<'a> {
    ctx: CompileContext<'a>,
    through_document_fields: bool,
}

impl<'a> Walker<'a> {
    pub fn new(ctx: CompileContext<'a>) -> Self {
        Self {
            ctx,
            through_document_fields: false,
        }
    }

    pub fn through_document_fields(mut self, through: bool) -> Self {
        self.through_document_fields = through;
        self
    }

    /// `field` followed by every field reachable from it for `role`.
    pub fn walk(&self, field: &FieldRef, role: &str) -> Result<Vec<FieldRef>, SchemaError> {
        let mut out = Vec::new();
        self.visit(field, role, &DocumentSet::new(), &mut out)?;
        Ok(out)
    }

    /// Every field reachable from the properties of `document` for `role`.
    /// The document itself counts as visited.
    pub fn walk_document(
        &self,
        document: &DocumentRef,
        role: &str,
    ) -> Result<Vec<FieldRef>, SchemaError> {
        let visited = DocumentSet::new().with(document);
        let mut out = Vec::new();
        for (field, field_role) in document.iter_fields(&self.ctx, role)? {
            self.visit(&field, &field_role, &visited, &mut out)?;
        }
        Ok(out)
    }

    fn visit(
        &self,
        field: &FieldRef,
        role: &str,
        visited: &DocumentSet,
        out: &mut Vec<FieldRef>,
    ) -> Result<(), SchemaError> {
        out.push(Arc::clone(field));

        let Some(reference) = field.as_document_field() else {
            for (child, child_role) in field.iter_fields(&self.ctx, role)? {
                self.visit(&child, &child_role, visited, out)?;
            }
            return Ok(());
        };

        if !self.through_document_fields {
            return Ok(());
        }
        let Some(document) = reference.document(&self.ctx, role)? else {
            return Ok(());
        };
        if visited.contains(&document) {
            trace!(document = %document.name(), "document already visited");
            return Ok(());
        }
        let visited = visited.with(&document);
        for (child, child_role) in document.iter_fields(&self.ctx, role)? {
            self.visit(&child, &child_role, &visited, out)?;
        }
        Ok(())
    }
}
