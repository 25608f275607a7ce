//! Resolution scope for schema `id`s and `$ref` targets.

use serde_json::{json, Value};
use url::Url;

/// Base URI context threaded down the field tree.
///
/// Scopes are values: [`ResolutionScope::alter`] returns a new scope and
/// never changes the one it was called on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionScope {
    base: String,
    current: String,
}

impl ResolutionScope {
    /// Scope rooted at `base` (usually a top-level document `id`).
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            current: base.clone(),
            base,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Enter a field carrying `id`.
    ///
    /// Returns the id to write into the field's schema and the scope for
    /// everything nested beneath it. An empty id leaves the scope unchanged.
    pub fn alter(&self, id: &str) -> (String, ResolutionScope) {
        if id.is_empty() {
            return (String::new(), self.clone());
        }

        let from = if self.current.is_empty() {
            &self.base
        } else {
            &self.current
        };
        let current = join_uri(from, id);
        let output = if self.current.is_empty() {
            current.clone()
        } else {
            id.to_string()
        };
        (
            output,
            ResolutionScope {
                base: self.base.clone(),
                current,
            },
        )
    }

    /// Reference to `definition_id` inside the root `definitions` object.
    ///
    /// Definitions always live at the root, so once a nested id has moved the
    /// current URI the pointer is anchored at the base URI instead.
    pub fn create_ref(&self, definition_id: &str) -> Value {
        let pointer = format!("#/definitions/{}", definition_id);
        if self.is_at_base() {
            json!({ "$ref": pointer })
        } else {
            json!({ "$ref": format!("{}{}", self.base, pointer) })
        }
    }

    fn is_at_base(&self) -> bool {
        // `Url` normalises what it parses, e.g. `http://a` becomes `http://a/`.
        self.current == self.base || self.current == join_uri("", &self.base)
    }
}

/// Resolve `reference` against `base` (RFC 3986, section 5.2).
///
/// Absolute URIs go through [`Url`]. Only when neither side is absolute are
/// the paths merged by hand.
pub(crate) fn join_uri(base: &str, reference: &str) -> String {
    if let Ok(url) = Url::parse(reference) {
        return url.to_string();
    }
    if let Ok(base) = Url::parse(base) {
        if let Ok(joined) = base.join(reference) {
            return joined.to_string();
        }
    }
    join_relative(base, reference)
}

/// Reference resolution between two relative references.
fn join_relative(base: &str, reference: &str) -> String {
    let (base, _) = split_once_or_all(base, '#');
    if base.is_empty() {
        return remove_dot_segments(reference);
    }
    if reference.starts_with('#') {
        return format!("{}{}", base, reference);
    }
    let (base_path, _) = split_once_or_all(base, '?');
    if reference.starts_with('?') {
        return format!("{}{}", base_path, reference);
    }
    let merged = if reference.starts_with('/') {
        reference.to_string()
    } else {
        match base_path.rfind('/') {
            Some(idx) => format!("{}{}", &base_path[..=idx], reference),
            None => reference.to_string(),
        }
    };
    remove_dot_segments(&merged)
}

fn split_once_or_all(s: &str, delimiter: char) -> (&str, &str) {
    s.split_once(delimiter).unwrap_or((s, ""))
}

/// Remove `.` and `..` segments from the path of a relative reference; the
/// query and fragment are kept as they are.
fn remove_dot_segments(reference: &str) -> String {
    let (path, suffix) = match reference.find(['?', '#']) {
        Some(idx) => reference.split_at(idx),
        None => (reference, ""),
    };

    let mut output: Vec<&str> = Vec::new();
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "." => {
                if i == last {
                    output.push("");
                }
            }
            ".." => {
                if output.len() > 1 || output.first().is_some_and(|s| !s.is_empty()) {
                    output.pop();
                }
                if i == last {
                    output.push("");
                }
            }
            other => output.push(other),
        }
    }
    format!("{}{}", output.join("/"), suffix)
}
