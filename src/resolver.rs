//! Name lookup for documents referenced by name.
//!
//! Document references may name their target instead of holding it, which is
//! how mutually referencing documents are declared. Names are looked up at
//! compile time through whatever [`DocumentResolver`] the caller supplies.

use std::collections::HashMap;
use std::sync::Arc;

use crate::document::DocumentRef;

/// Looks up documents by dotted name.
pub trait DocumentResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<DocumentRef>;
}

impl<F> DocumentResolver for F
where
    F: Fn(&str) -> Option<DocumentRef> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Option<DocumentRef> {
        self(name)
    }
}

/// A [`DocumentResolver`] backed by an explicit table.
///
/// Documents are registered under their qualified name (`namespace.name`, or
/// the bare name without a namespace).
#[derive(Debug, Clone, Default)]
pub struct DocumentRegistry {
    documents: HashMap<String, DocumentRef>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document`, replacing any document with the same name.
    pub fn register(&mut self, document: &DocumentRef) -> &mut Self {
        self.documents
            .insert(document.qualified_name(), Arc::clone(document));
        self
    }

    pub(crate) fn len(&self) -> usize {
        self.documents.len()
    }
}

impl DocumentResolver for DocumentRegistry {
    fn resolve(&self, name: &str) -> Option<DocumentRef> {
        self.documents.get(name).cloned()
    }
}
