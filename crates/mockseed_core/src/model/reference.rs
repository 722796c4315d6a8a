//! Reference fields: policy before resolution, identifiers after.

use crate::identity::EntityId;
use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// Prefix marking an external placeholder in rendered output.
pub const PLACEHOLDER_PREFIX: &str = "ext-";

/// A resolved reference.
///
/// Never carries a natural key; `WellKnown` holds only a backend-declared
/// constant such as `root`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ref {
    Allocated(EntityId),
    Placeholder(EntityId),
    WellKnown(String),
}

impl Ref {
    /// Identifier of the target, if it has one.
    pub fn id(&self) -> Option<EntityId> {
        match self {
            Self::Allocated(id) | Self::Placeholder(id) => Some(*id),
            Self::WellKnown(_) => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allocated(id) => write!(f, "{id}"),
            Self::Placeholder(id) => write!(f, "{PLACEHOLDER_PREFIX}{id}"),
            Self::WellKnown(key) => write!(f, "{key}"),
        }
    }
}

impl Serialize for Ref {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Key space a reference is looked up in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefScope {
    /// Any owner generated so far in the run.
    Owners,
    /// Containers of the owner holding the reference.
    OwnerContainers,
    /// A run-wide catalog.
    Catalog(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Only the first key is considered.
    Single,
    /// De-duplicated, sorted by identifier.
    Set,
    /// De-duplicated, first-seen order.
    Ordered,
}

/// What happens to a key that does not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnUnresolved {
    Drop,
    /// Point at an external placeholder keyed by the unresolved key.
    Placeholder,
    /// Resolve this key in the same scope instead, else emit it as a
    /// well-known constant.
    Fallback(String),
}

/// One reference field as written in seed data: natural keys plus the
/// policy used to rewrite them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpec {
    pub field: String,
    pub scope: RefScope,
    pub cardinality: Cardinality,
    pub on_unresolved: OnUnresolved,
    /// Remove the holding owner's own identifier.
    pub exclude_self: bool,
    pub keys: Vec<String>,
}

impl RefSpec {
    fn new<I, S>(field: &str, scope: RefScope, cardinality: Cardinality, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.to_string(),
            scope,
            cardinality,
            on_unresolved: OnUnresolved::Drop,
            exclude_self: false,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Single reference from an optional key. Drops when unresolved.
    pub fn single(field: &str, scope: RefScope, key: Option<impl Into<String>>) -> Self {
        Self::new(field, scope, Cardinality::Single, key)
    }

    pub fn set<I, S>(field: &str, scope: RefScope, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(field, scope, Cardinality::Set, keys)
    }

    pub fn ordered<I, S>(field: &str, scope: RefScope, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(field, scope, Cardinality::Ordered, keys)
    }

    pub fn with_fallback(mut self, key: &str) -> Self {
        self.on_unresolved = OnUnresolved::Fallback(key.to_string());
        self
    }

    pub fn with_placeholders(mut self) -> Self {
        self.on_unresolved = OnUnresolved::Placeholder;
        self
    }

    pub fn excluding_self(mut self) -> Self {
        self.exclude_self = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{Ref, RefScope, RefSpec};
    use uuid::Uuid;

    #[test]
    fn placeholders_render_with_prefix() {
        let id = Uuid::from_u128(0x1234);
        assert_eq!(Ref::Allocated(id).to_string(), id.to_string());
        assert_eq!(Ref::Placeholder(id).to_string(), format!("ext-{id}"));
        assert_eq!(
            serde_json::to_value(Ref::WellKnown("root".to_string())).unwrap(),
            serde_json::json!("root")
        );
    }

    #[test]
    fn single_from_none_has_no_keys() {
        let spec = RefSpec::single("parents", RefScope::OwnerContainers, None::<String>)
            .with_fallback("root");
        assert!(spec.keys.is_empty());
    }
}
