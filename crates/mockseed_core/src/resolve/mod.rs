//! Reference resolution.
//!
//! # Responsibility
//! - Rewrite natural keys in reference fields to allocated identifiers.
//! - Apply the field's unresolved policy: drop, placeholder, or fallback.
//!
//! # Invariants
//! - Output never contains a natural key.
//! - Lookups go through the run-wide allocator, so only owners allocated
//!   earlier in the run are visible; forward references are unresolved.
//! - Each field is an independent lookup; no recursive entity walk.

pub mod hierarchy;

use crate::identity::{EntityId, IdentityAllocator, Scope};
use crate::model::graph::RefFields;
use crate::model::reference::{Cardinality, OnUnresolved, Ref, RefScope, RefSpec};
use crate::report::{Recovery, RunReport};
use std::collections::{BTreeSet, HashSet};

/// Resolves the reference fields of one owner's entities.
pub struct ReferenceResolver<'a> {
    allocator: &'a mut IdentityAllocator,
    report: &'a mut RunReport,
    placeholders: &'a mut BTreeSet<EntityId>,
    owner_id: EntityId,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(
        allocator: &'a mut IdentityAllocator,
        report: &'a mut RunReport,
        placeholders: &'a mut BTreeSet<EntityId>,
        owner_id: EntityId,
    ) -> Self {
        Self {
            allocator,
            report,
            placeholders,
            owner_id,
        }
    }

    /// Resolves every spec, keyed by field name.
    ///
    /// Two specs naming the same field are concatenated.
    pub fn resolve_all(&mut self, specs: &[RefSpec]) -> RefFields {
        let mut fields = RefFields::new();
        for spec in specs {
            let resolved = self.resolve_field(spec);
            fields
                .entry(spec.field.clone())
                .or_default()
                .extend(resolved);
        }
        fields
    }

    /// Resolves one field according to its cardinality and policy.
    pub fn resolve_field(&mut self, spec: &RefSpec) -> Vec<Ref> {
        let scope = self.scope_for(&spec.scope);

        if spec.cardinality == Cardinality::Single {
            let resolved = match spec.keys.first() {
                Some(key) => self.resolve_key(spec, &scope, key),
                None => self.fallback(spec, &scope, None),
            };
            return resolved
                .filter(|target| !(spec.exclude_self && self.is_self(target)))
                .into_iter()
                .collect();
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(spec.keys.len());
        for key in &spec.keys {
            let Some(target) = self.resolve_key(spec, &scope, key) else {
                continue;
            };
            if spec.exclude_self && self.is_self(&target) {
                continue;
            }
            if seen.insert(target.clone()) {
                resolved.push(target);
            }
        }
        if spec.cardinality == Cardinality::Set {
            resolved.sort();
        }
        resolved
    }

    fn scope_for(&self, scope: &RefScope) -> Scope {
        match scope {
            RefScope::Owners => Scope::Owner,
            RefScope::OwnerContainers => Scope::Container(self.owner_id),
            RefScope::Catalog(name) => Scope::Catalog((*name).to_string()),
        }
    }

    fn is_self(&self, target: &Ref) -> bool {
        matches!(target, Ref::Allocated(id) if *id == self.owner_id)
    }

    fn resolve_key(&mut self, spec: &RefSpec, scope: &Scope, key: &str) -> Option<Ref> {
        if let Ok(id) = self.allocator.resolve(scope, key) {
            return Some(Ref::Allocated(id));
        }
        match &spec.on_unresolved {
            OnUnresolved::Drop => {
                self.report.record(Recovery::DroppedReference {
                    field: spec.field.clone(),
                    key: key.to_string(),
                });
                None
            }
            OnUnresolved::Placeholder => {
                let id = self.allocator.allocate(&Scope::External, key);
                self.placeholders.insert(id);
                self.report.record(Recovery::PlaceholderSynthesized {
                    field: spec.field.clone(),
                });
                Some(Ref::Placeholder(id))
            }
            OnUnresolved::Fallback(_) => self.fallback(spec, scope, Some(key)),
        }
    }

    /// Resolves the fallback key of a required single reference.
    fn fallback(&mut self, spec: &RefSpec, scope: &Scope, missing: Option<&str>) -> Option<Ref> {
        let OnUnresolved::Fallback(default_key) = &spec.on_unresolved else {
            return None;
        };
        // A field that already names the default is not a recovery.
        if missing != Some(default_key.as_str()) {
            self.report.record(Recovery::UnresolvedRequiredReference {
                field: spec.field.clone(),
                key: missing.unwrap_or_default().to_string(),
            });
        }
        Some(match self.allocator.resolve(scope, default_key) {
            Ok(id) => Ref::Allocated(id),
            Err(_) => Ref::WellKnown(default_key.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ReferenceResolver;
    use crate::identity::{IdentityAllocator, Scope};
    use crate::model::reference::{Ref, RefScope, RefSpec};
    use crate::report::RunReport;
    use std::collections::BTreeSet;

    struct Fixture {
        allocator: IdentityAllocator,
        report: RunReport,
        placeholders: BTreeSet<uuid::Uuid>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                allocator: IdentityAllocator::seeded(Some(11)),
                report: RunReport::new("test"),
                placeholders: BTreeSet::new(),
            }
        }

        fn resolve(&mut self, owner: uuid::Uuid, spec: &RefSpec) -> Vec<Ref> {
            ReferenceResolver::new(
                &mut self.allocator,
                &mut self.report,
                &mut self.placeholders,
                owner,
            )
            .resolve_field(spec)
        }
    }

    #[test]
    fn set_dedupes_sorts_and_drops_unknown() {
        let mut fx = Fixture::new();
        let a = fx.allocator.allocate(&Scope::Owner, "a");
        let b = fx.allocator.allocate(&Scope::Owner, "b");
        let c = fx.allocator.allocate(&Scope::Owner, "c");
        let spec = RefSpec::set("friends", RefScope::Owners, ["c", "b", "nobody", "c"]);

        let resolved = fx.resolve(a, &spec);
        let mut expected = vec![Ref::Allocated(b), Ref::Allocated(c)];
        expected.sort();
        assert_eq!(resolved, expected);
        assert_eq!(fx.report.count("dropped_reference"), 1);
    }

    #[test]
    fn ordered_keeps_first_seen_order_and_one_self_entry() {
        let mut fx = Fixture::new();
        let me = fx.allocator.allocate(&Scope::Owner, "me");
        let other = fx.allocator.allocate(&Scope::Owner, "other");
        let spec = RefSpec::ordered("attendees", RefScope::Owners, ["me", "other", "me"]);
        assert_eq!(
            fx.resolve(me, &spec),
            vec![Ref::Allocated(me), Ref::Allocated(other)]
        );
    }

    #[test]
    fn exclude_self_removes_owner() {
        let mut fx = Fixture::new();
        let me = fx.allocator.allocate(&Scope::Owner, "me");
        let other = fx.allocator.allocate(&Scope::Owner, "other");
        let spec =
            RefSpec::set("contacts", RefScope::Owners, ["me", "other"]).excluding_self();
        assert_eq!(fx.resolve(me, &spec), vec![Ref::Allocated(other)]);
    }

    #[test]
    fn placeholders_are_stable_per_key() {
        let mut fx = Fixture::new();
        let me = fx.allocator.allocate(&Scope::Owner, "me");
        let spec = RefSpec::ordered("attendees", RefScope::Owners, ["guest@outside.org"])
            .with_placeholders();
        let first = fx.resolve(me, &spec);
        let second = fx.resolve(me, &spec);
        assert_eq!(first, second);
        assert!(first[0].is_placeholder());
        assert_eq!(fx.placeholders.len(), 1);
        assert!(first[0].to_string().starts_with("ext-"));
    }

    #[test]
    fn missing_parent_falls_back_to_root() {
        let mut fx = Fixture::new();
        let me = fx.allocator.allocate(&Scope::Owner, "me");
        let root = fx.allocator.allocate(&Scope::Container(me), "root");
        let spec = RefSpec::single("parents", RefScope::OwnerContainers, Some("Finance_Reports"))
            .with_fallback("root");
        assert_eq!(fx.resolve(me, &spec), vec![Ref::Allocated(root)]);
        assert_eq!(fx.report.count("unresolved_required_reference"), 1);
    }

    #[test]
    fn explicit_root_is_not_a_recovery() {
        let mut fx = Fixture::new();
        let me = fx.allocator.allocate(&Scope::Owner, "me");
        let root = fx.allocator.allocate(&Scope::Container(me), "root");
        let spec = RefSpec::single("parents", RefScope::OwnerContainers, Some("root"))
            .with_fallback("root");
        assert_eq!(fx.resolve(me, &spec), vec![Ref::Allocated(root)]);
        assert_eq!(fx.report.total(), 0);
    }

    #[test]
    fn fallback_without_root_is_well_known() {
        let mut fx = Fixture::new();
        let me = fx.allocator.allocate(&Scope::Owner, "me");
        let spec = RefSpec::single("parents", RefScope::OwnerContainers, None::<String>)
            .with_fallback("root");
        assert_eq!(
            fx.resolve(me, &spec),
            vec![Ref::WellKnown("root".to_string())]
        );
    }

    #[test]
    fn container_scope_is_per_owner() {
        let mut fx = Fixture::new();
        let alice = fx.allocator.allocate(&Scope::Owner, "alice");
        let bob = fx.allocator.allocate(&Scope::Owner, "bob");
        let alice_cal = fx.allocator.allocate(&Scope::Container(alice), "cal_1");
        fx.allocator.allocate(&Scope::Container(bob), "cal_1");
        let spec = RefSpec::single("calendar", RefScope::OwnerContainers, Some("cal_1"));
        assert_eq!(fx.resolve(alice, &spec), vec![Ref::Allocated(alice_cal)]);
    }
}
