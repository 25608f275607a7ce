//! Role variants.
//!
//! Any attribute of a field may be a [`Var`] instead of a fixed value. When a
//! schema is compiled for a role, every variant picks the value whose
//! [`Matcher`] accepts that role, or resolves to nothing, in which case the
//! attribute (or child) is left out of the output.
//!
//! ```
//! use schema_roles::{not, Var};
//!
//! let var = Var::new()
//!     .when("request", 1)
//!     .when(not("response"), 2);
//!
//! assert_eq!(var.resolve("request"), Some(&1));
//! assert_eq!(var.resolve("default"), Some(&2));
//! assert_eq!(var.resolve("response"), None);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::{Field, FieldRef};
use crate::types::{Additional, Deferred, DEFAULT_ROLE};

/// Predicate over role names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Matcher {
    /// Matches exactly this role.
    Role(String),
    /// Matches every role except this one.
    Not(String),
    /// Matches every role.
    Any,
}

impl Matcher {
    pub fn matches(&self, role: &str) -> bool {
        match self {
            Matcher::Role(name) => name == role,
            Matcher::Not(name) => name != role,
            Matcher::Any => true,
        }
    }
}

impl From<&str> for Matcher {
    fn from(role: &str) -> Self {
        Matcher::Role(role.to_string())
    }
}

impl From<String> for Matcher {
    fn from(role: String) -> Self {
        Matcher::Role(role)
    }
}

/// Matcher accepting every role but `role`.
pub fn not(role: impl Into<String>) -> Matcher {
    Matcher::Not(role.into())
}

/// A value that depends on the role a schema is compiled for.
///
/// Entries are checked in declaration order and the first match wins. An
/// entry built with [`Matcher::Any`] therefore shadows every entry declared
/// after it.
#[derive(Debug, Clone)]
pub struct Var<T> {
    values: Vec<(Matcher, T)>,
    default: Option<T>,
    roles_to_pass_down: Vec<String>,
}

impl<T> Default for Var<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            default: None,
            roles_to_pass_down: Vec::new(),
        }
    }
}

/// A resolved value together with the role to use for anything nested in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a, T> {
    pub value: Option<&'a T>,
    pub role: String,
}

impl<T> Var<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry selected when `matcher` accepts the role.
    pub fn when(mut self, matcher: impl Into<Matcher>, value: T) -> Self {
        self.values.push((matcher.into(), value));
        self
    }

    /// Value used when no entry matches.
    pub fn otherwise(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    /// Roles forwarded into the resolved value instead of resetting to the
    /// default role.
    pub fn pass_down<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles_to_pass_down
            .extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn resolve(&self, role: &str) -> Option<&T> {
        self.values
            .iter()
            .find(|(matcher, _)| matcher.matches(role))
            .map(|(_, value)| value)
            .or(self.default.as_ref())
    }

    /// Resolve and compute the role nested variants are resolved with.
    pub fn resolve_2(&self, role: &str) -> Resolution<'_, T> {
        let nested_role = if self.roles_to_pass_down.iter().any(|r| r == role) {
            role
        } else {
            DEFAULT_ROLE
        };
        Resolution {
            value: self.resolve(role),
            role: nested_role.to_string(),
        }
    }

    /// Every value this variant can resolve to, in declaration order.
    pub fn iter_possible_values(&self) -> impl Iterator<Item = &T> {
        self.values
            .iter()
            .map(|(_, value)| value)
            .chain(self.default.iter())
    }
}

/// A fixed value or a role variant.
#[derive(Debug, Clone)]
pub enum Resolvable<T> {
    Value(T),
    Var(Var<T>),
}

impl<T> Resolvable<T> {
    pub fn resolve(&self, role: &str) -> Option<&T> {
        match self {
            Resolvable::Value(value) => Some(value),
            Resolvable::Var(var) => var.resolve(role),
        }
    }

    /// Like [`Resolvable::resolve`], also returning the role for nested
    /// resolution. Fixed values keep the queried role.
    pub fn resolve_2(&self, role: &str) -> Resolution<'_, T> {
        match self {
            Resolvable::Value(value) => Resolution {
                value: Some(value),
                role: role.to_string(),
            },
            Resolvable::Var(var) => var.resolve_2(role),
        }
    }

    pub fn iter_possible_values(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            Resolvable::Value(value) => Box::new(std::iter::once(value)),
            Resolvable::Var(var) => Box::new(var.iter_possible_values()),
        }
    }
}

impl<T> From<Var<T>> for Resolvable<T> {
    fn from(var: Var<T>) -> Self {
        Resolvable::Var(var)
    }
}

macro_rules! resolvable_from {
    ($target:ty: $($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for Resolvable<$target> {
                fn from(value: $source) -> Self {
                    Resolvable::Value(value.into())
                }
            }
        )+
    };
}

resolvable_from!(bool: bool);
resolvable_from!(u64: u64);
resolvable_from!(String: String, &str);
resolvable_from!(Value: Value, i64, i32, u64, u32, f64, String, &str);
resolvable_from!(Additional: Additional, bool, FieldRef);
resolvable_from!(FieldRef: FieldRef);

macro_rules! deferred_from {
    ($target:ty: $($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for Resolvable<Deferred<$target>> {
                fn from(value: $source) -> Self {
                    Resolvable::Value(Deferred::Value(value.into()))
                }
            }
        )+
    };
}

deferred_from!(Value: Value, bool, i64, i32, u64, u32, f64, String, &str);
deferred_from!(Vec<Value>: Vec<Value>);

impl<T> From<Deferred<T>> for Resolvable<Deferred<T>> {
    fn from(value: Deferred<T>) -> Self {
        Resolvable::Value(value)
    }
}

impl<F: Field + 'static> From<F> for Resolvable<FieldRef> {
    fn from(field: F) -> Self {
        Resolvable::Value(field.into_ref())
    }
}

impl<F: Field + 'static> From<F> for Resolvable<Additional> {
    fn from(field: F) -> Self {
        Resolvable::Value(Additional::Schema(field.into_ref()))
    }
}
