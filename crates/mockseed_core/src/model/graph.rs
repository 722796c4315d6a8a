//! The assembled entity graph for one run.
//!
//! # Invariants
//! - Every entity carries an allocated identifier; natural keys survive only
//!   as `key` fields used for diagnostics and are never rendered.
//! - `Item::created_at <= Item::modified_at`.
//! - A container's item list only grows.

use crate::identity::EntityId;
use crate::model::reference::Ref;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Resolved reference fields by field name.
pub type RefFields = BTreeMap<String, Vec<Ref>>;

/// Returns the first reference of `field`, if any.
pub fn first_ref<'a>(fields: &'a RefFields, field: &str) -> Option<&'a Ref> {
    fields.get(field).and_then(|refs| refs.first())
}

/// Returns every reference of `field`.
pub fn refs<'a>(fields: &'a RefFields, field: &str) -> &'a [Ref] {
    fields.get(field).map(Vec::as_slice).unwrap_or(&[])
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: EntityId,
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub attributes: Map<String, Value>,
    pub references: RefFields,
}

/// Derived container fields. Written only by the aggregate recomputer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerAggregates {
    pub item_count: usize,
    pub storage_bytes: u64,
    /// Latest item modification; `None` for an empty container.
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub id: EntityId,
    pub key: String,
    pub attributes: Map<String, Value>,
    pub parent: Option<Ref>,
    pub references: RefFields,
    items: Vec<Item>,
    pub aggregates: ContainerAggregates,
}

impl Container {
    pub fn new(id: EntityId, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            attributes: Map::new(),
            parent: None,
            references: RefFields::new(),
            items: Vec::new(),
            aggregates: ContainerAggregates::default(),
        }
    }

    /// Appends an item. Items are never removed.
    pub fn push_item(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

/// Derived owner fields. Written only by the aggregate recomputer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerAggregates {
    pub container_count: usize,
    pub item_count: usize,
    pub storage_bytes: u64,
    /// Latest item modification, or the run's reference time.
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub id: EntityId,
    pub key: String,
    pub aliases: Vec<String>,
    pub attributes: Map<String, Value>,
    pub references: RefFields,
    pub containers: Vec<Container>,
    pub aggregates: OwnerAggregates,
}

impl Owner {
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.containers.iter().flat_map(|container| container.items().iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: EntityId,
    pub key: String,
    pub attributes: Map<String, Value>,
}

/// Output of one generation run, owners in generation order.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedState {
    pub service: String,
    pub reference_time: DateTime<Utc>,
    pub owners: Vec<Owner>,
    pub catalogs: BTreeMap<String, Vec<CatalogEntry>>,
    /// External placeholders issued during resolution.
    pub placeholders: BTreeSet<EntityId>,
}

impl GeneratedState {
    pub fn owner_by_key(&self, key: &str) -> Option<&Owner> {
        self.owners
            .iter()
            .find(|owner| owner.key == key || owner.aliases.iter().any(|alias| alias == key))
    }

    pub fn item_count(&self) -> usize {
        self.owners.iter().map(|owner| owner.aggregates.item_count).sum()
    }
}
