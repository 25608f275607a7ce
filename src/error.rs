//! Error types for schema construction and compilation.

use thiserror::Error;

/// Configuration errors raised while building or compiling a field tree.
///
/// A role variant that matches nothing is not an error: it resolves to
/// `None` and the affected attribute or child is omitted.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid regular expression {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: fancy_regex::Error,
    },

    #[error("self-reference used by a field that is not owned by a document")]
    MissingOwner,

    #[error("document \"{name}\" not found")]
    DocumentNotFound { name: String },

    #[error("document \"{name}\" is referenced by name but no resolver is configured")]
    NoResolver { name: String },
}

impl SchemaError {
    /// True for errors raised while declaring fields, before any compilation.
    pub fn is_construction_error(&self) -> bool {
        matches!(self, SchemaError::InvalidRegex { .. })
    }
}

/// Validate a regular expression used as a `pattern` or `patternProperties` key.
///
/// JSON Schema patterns follow ECMA 262, so lookaround and backreferences
/// are accepted.
pub(crate) fn validate_regex(pattern: &str) -> Result<(), SchemaError> {
    fancy_regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|source| SchemaError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })
}
