//! Seed data: entities as a backend describes them, before identifiers.

use crate::model::reference::RefSpec;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A timestamp as supplied by seed data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SeedTime {
    #[default]
    Missing,
    /// Text to be parsed; blank text counts as missing.
    Raw(String),
    At(DateTime<Utc>),
}

impl SeedTime {
    pub fn raw(value: impl Into<String>) -> Self {
        Self::Raw(value.into())
    }
}

/// An owner's natural key and alias keys.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerIdentity {
    pub natural_key: String,
    pub aliases: Vec<String>,
    /// Identity-derived attributes (names, email) rendered on the owner.
    pub attributes: Map<String, Value>,
}

impl OwnerIdentity {
    pub fn new(natural_key: impl Into<String>) -> Self {
        Self {
            natural_key: natural_key.into(),
            aliases: Vec::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Natural key followed by aliases.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.natural_key.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Attribute as a string, or `""`.
    pub fn attr_str(&self, name: &str) -> &str {
        self.attributes
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemSeed {
    /// Temporary key, unique within its container.
    pub key: String,
    pub created: SeedTime,
    pub modified: SeedTime,
    pub size_bytes: u64,
    pub attributes: Map<String, Value>,
    pub references: Vec<RefSpec>,
}

impl ItemSeed {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn created(mut self, at: SeedTime) -> Self {
        self.created = at;
        self
    }

    pub fn modified(mut self, at: SeedTime) -> Self {
        self.modified = at;
        self
    }

    pub fn size(mut self, bytes: u64) -> Self {
        self.size_bytes = bytes;
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn reference(mut self, spec: RefSpec) -> Self {
        self.references.push(spec);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSeed {
    /// Temporary key, unique within its owner.
    pub key: String,
    pub attributes: Map<String, Value>,
    /// Hierarchy edge to another container of the same owner.
    pub parent: Option<RefSpec>,
    pub references: Vec<RefSpec>,
    pub items: Vec<ItemSeed>,
}

impl ContainerSeed {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn parent(mut self, spec: RefSpec) -> Self {
        self.parent = Some(spec);
        self
    }

    pub fn reference(mut self, spec: RefSpec) -> Self {
        self.references.push(spec);
        self
    }

    pub fn item(mut self, item: ItemSeed) -> Self {
        self.items.push(item);
        self
    }
}

/// Everything an owner holds, described by natural keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerSeed {
    pub attributes: Map<String, Value>,
    pub references: Vec<RefSpec>,
    pub containers: Vec<ContainerSeed>,
}

impl OwnerSeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn reference(mut self, spec: RefSpec) -> Self {
        self.references.push(spec);
        self
    }

    pub fn container(mut self, container: ContainerSeed) -> Self {
        self.containers.push(container);
        self
    }
}

/// A hand-written owner with pre-existing natural keys.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerFixture {
    pub identity: OwnerIdentity,
    pub seed: OwnerSeed,
}

/// One entry of a run-wide catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSeed {
    pub catalog: &'static str,
    pub key: String,
    pub attributes: Map<String, Value>,
}

impl CatalogSeed {
    pub fn new(catalog: &'static str, key: impl Into<String>) -> Self {
        Self {
            catalog,
            key: key.into(),
            attributes: Map::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }
}
