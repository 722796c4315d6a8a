//! Identity allocation for one generation run.
//!
//! # Responsibility
//! - Issue opaque, run-unique identifiers.
//! - Map every natural key seen in a scope to its identifier.
//!
//! # Invariants
//! - No identifier is issued twice within one allocator.
//! - `allocate` is idempotent per `(scope, key)`.
//! - Mappings are append-only; an existing binding is never rewritten.

pub mod keys;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::{Builder, Uuid};

pub use keys::{unique_key, KeyAttemptsExhausted};

/// Opaque identifier assigned to every generated entity.
pub type EntityId = Uuid;

/// Offset mixed into the run seed so identifiers use their own RNG stream.
const ID_STREAM_OFFSET: u64 = 0x6d6f_636b_7365_6564;

/// Key space a natural key lives in.
///
/// Container and item scopes are nested under their parent's identifier so
/// identical temporary keys used by different owners never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Owner,
    Container(EntityId),
    Item(EntityId),
    Catalog(String),
    External,
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Container(owner) => write!(f, "container@{owner}"),
            Self::Item(container) => write!(f, "item@{container}"),
            Self::Catalog(name) => write!(f, "catalog:{name}"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Lookup miss for a natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNotFound {
    pub scope: Scope,
    pub key: String,
}

impl Display for KeyNotFound {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "natural key `{}` not allocated in scope {}", self.key, self.scope)
    }
}

impl Error for KeyNotFound {}

/// A key is already bound to another identifier in the same scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConflict {
    pub scope: Scope,
    pub key: String,
    pub existing: EntityId,
}

impl Display for BindingConflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "natural key `{}` in scope {} is already bound to {}",
            self.key, self.scope, self.existing
        )
    }
}

impl Error for BindingConflict {}

/// Run-scoped allocator shared by every backend stage.
pub struct IdentityAllocator {
    rng: StdRng,
    issued: HashSet<EntityId>,
    bindings: HashMap<(Scope, String), EntityId>,
}

impl IdentityAllocator {
    /// Creates an allocator drawing identifiers from `rng`.
    pub fn new(rng: StdRng) -> Self {
        Self {
            rng,
            issued: HashSet::new(),
            bindings: HashMap::new(),
        }
    }

    /// Creates an allocator whose identifier stream is derived from `seed`.
    ///
    /// `None` draws from OS entropy.
    pub fn seeded(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ ID_STREAM_OFFSET),
            None => StdRng::from_entropy(),
        };
        Self::new(rng)
    }

    /// Returns the identifier for `key`, issuing a new one on first sight.
    pub fn allocate(&mut self, scope: &Scope, key: &str) -> EntityId {
        if let Some(existing) = self.bindings.get(&(scope.clone(), key.to_string())) {
            return *existing;
        }
        let id = self.fresh_id();
        self.bindings.insert((scope.clone(), key.to_string()), id);
        id
    }

    /// Binds an extra key (an alias) to an already issued identifier.
    ///
    /// Re-binding the same key to the same identifier is a no-op.
    pub fn bind(&mut self, scope: &Scope, key: &str, id: EntityId) -> Result<(), BindingConflict> {
        match self.bindings.get(&(scope.clone(), key.to_string())) {
            Some(existing) if *existing == id => Ok(()),
            Some(existing) => Err(BindingConflict {
                scope: scope.clone(),
                key: key.to_string(),
                existing: *existing,
            }),
            None => {
                self.bindings.insert((scope.clone(), key.to_string()), id);
                Ok(())
            }
        }
    }

    /// Looks up a previously allocated key.
    pub fn resolve(&self, scope: &Scope, key: &str) -> Result<EntityId, KeyNotFound> {
        self.bindings
            .get(&(scope.clone(), key.to_string()))
            .copied()
            .ok_or_else(|| KeyNotFound {
                scope: scope.clone(),
                key: key.to_string(),
            })
    }

    /// Returns whether `key` is bound in `scope`.
    pub fn contains(&self, scope: &Scope, key: &str) -> bool {
        self.bindings.contains_key(&(scope.clone(), key.to_string()))
    }

    /// Number of identifiers issued so far.
    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }

    fn fresh_id(&mut self) -> EntityId {
        loop {
            let id = Builder::from_random_bytes(self.rng.gen()).into_uuid();
            if !id.is_nil() && self.issued.insert(id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IdentityAllocator, Scope};

    #[test]
    fn allocate_is_idempotent_per_scope_and_key() {
        let mut allocator = IdentityAllocator::seeded(Some(7));
        let first = allocator.allocate(&Scope::Owner, "alice@example.com");
        let second = allocator.allocate(&Scope::Owner, "alice@example.com");
        assert_eq!(first, second);
        assert_eq!(allocator.issued_count(), 1);
    }

    #[test]
    fn same_key_in_different_scopes_gets_distinct_ids() {
        let mut allocator = IdentityAllocator::seeded(Some(7));
        let owner_a = allocator.allocate(&Scope::Owner, "a");
        let owner_b = allocator.allocate(&Scope::Owner, "b");
        let cal_a = allocator.allocate(&Scope::Container(owner_a), "cal_1");
        let cal_b = allocator.allocate(&Scope::Container(owner_b), "cal_1");
        assert_ne!(cal_a, cal_b);
        assert_eq!(
            allocator.resolve(&Scope::Container(owner_a), "cal_1").unwrap(),
            cal_a
        );
    }

    #[test]
    fn resolve_reports_missing_keys() {
        let allocator = IdentityAllocator::seeded(Some(1));
        let err = allocator.resolve(&Scope::Owner, "nobody").unwrap_err();
        assert_eq!(err.key, "nobody");
        assert_eq!(err.scope, Scope::Owner);
    }

    #[test]
    fn bind_rejects_rebinding_to_another_id() {
        let mut allocator = IdentityAllocator::seeded(Some(3));
        let first = allocator.allocate(&Scope::Owner, "jdoe");
        let second = allocator.allocate(&Scope::Owner, "msmith");
        allocator
            .bind(&Scope::Owner, "john.doe@noted.com", first)
            .unwrap();
        allocator
            .bind(&Scope::Owner, "john.doe@noted.com", first)
            .unwrap();
        let conflict = allocator
            .bind(&Scope::Owner, "john.doe@noted.com", second)
            .unwrap_err();
        assert_eq!(conflict.existing, first);
    }

    #[test]
    fn seeded_allocators_issue_identical_sequences() {
        let mut left = IdentityAllocator::seeded(Some(99));
        let mut right = IdentityAllocator::seeded(Some(99));
        for key in ["a", "b", "c"] {
            assert_eq!(
                left.allocate(&Scope::Owner, key),
                right.allocate(&Scope::Owner, key)
            );
        }
    }
}
