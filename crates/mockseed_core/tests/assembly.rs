use chrono::{DateTime, Duration, Utc};
use mockseed_core::aggregate::recompute;
use mockseed_core::engine::assemble::{assemble_owner, AssemblyContext};
use mockseed_core::model::graph::{first_ref, refs, Owner};
use mockseed_core::model::reference::{Ref, RefScope, RefSpec};
use mockseed_core::model::seed::{ContainerSeed, ItemSeed, OwnerIdentity, OwnerSeed, SeedTime};
use mockseed_core::synth::{OffsetRule, Synthesizer};
use mockseed_core::{EntityId, IdentityAllocator, RunReport, Scope, TimeWindow};
use std::collections::BTreeSet;

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-10T09:30:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

struct Run {
    allocator: IdentityAllocator,
    synth: Synthesizer,
    report: RunReport,
    placeholders: BTreeSet<EntityId>,
    window: TimeWindow,
}

impl Run {
    fn new() -> Self {
        Self {
            allocator: IdentityAllocator::seeded(Some(11)),
            synth: Synthesizer::seeded(Some(11), now()),
            report: RunReport::new("test"),
            placeholders: BTreeSet::new(),
            window: TimeWindow::past(7, 365),
        }
    }

    fn assemble(&mut self, key: &str, seed: OwnerSeed) -> Owner {
        let owner_id = self.allocator.allocate(&Scope::Owner, key);
        let identity = OwnerIdentity::new(key);
        assemble_owner(
            &mut AssemblyContext {
                allocator: &mut self.allocator,
                synth: &mut self.synth,
                report: &mut self.report,
                placeholders: &mut self.placeholders,
                window: &self.window,
                offset: OffsetRule::Seconds { min: 60, max: 3_600 },
            },
            owner_id,
            &identity,
            seed,
        )
        .unwrap()
    }
}

#[test]
fn missing_modification_times_follow_creation() {
    let mut run = Run::new();
    let created = now() - Duration::days(3);
    let modified = now() - Duration::days(1);

    let mut container = ContainerSeed::new("inbox");
    for index in 0..5 {
        let mut item = ItemSeed::new(format!("item_{index}")).created(SeedTime::At(created));
        if index >= 2 {
            item = item.modified(SeedTime::At(modified));
        }
        container = container.item(item);
    }
    let owner = run.assemble("owner@example.com", OwnerSeed::new().container(container));

    let items: Vec<_> = owner.items().collect();
    assert_eq!(items.len(), 5);
    for item in &items[..2] {
        assert!(item.modified_at >= item.created_at + Duration::seconds(60));
        assert!(item.modified_at <= item.created_at + Duration::seconds(3_600));
    }
    for item in &items[2..] {
        assert_eq!(item.created_at, created);
        assert_eq!(item.modified_at, modified);
    }
    assert_eq!(run.report.total(), 0);
    assert_eq!(owner.aggregates.last_activity, modified);
}

#[test]
fn malformed_and_inverted_seed_times_are_repaired_and_reported() {
    let mut run = Run::new();
    let container = ContainerSeed::new("inbox")
        .item(ItemSeed::new("garbled").created(SeedTime::raw("not a date")))
        .item(
            ItemSeed::new("inverted")
                .created(SeedTime::raw("2025-03-05T10:00:00Z"))
                .modified(SeedTime::raw("2025-03-01T10:00:00Z")),
        );
    let owner = run.assemble("owner@example.com", OwnerSeed::new().container(container));

    for item in owner.items() {
        assert!(item.modified_at >= item.created_at);
    }
    assert_eq!(run.report.count("malformed_seed_timestamp"), 1);
    assert_eq!(run.report.count("timestamp_order_repaired"), 1);
}

#[test]
fn forward_peer_reference_becomes_placeholder_and_unknown_set_member_drops() {
    let mut run = Run::new();
    let early = run.assemble("early@example.com", OwnerSeed::new());

    let seed = OwnerSeed::new()
        .reference(
            RefSpec::single("counterpart", RefScope::Owners, Some("later@example.com"))
                .with_placeholders(),
        )
        .reference(RefSpec::set(
            "friends",
            RefScope::Owners,
            ["early@example.com", "nobody@example.com"],
        ));
    let owner = run.assemble("second@example.com", seed);

    let counterpart = first_ref(&owner.references, "counterpart").unwrap();
    assert!(counterpart.is_placeholder());
    assert!(run.placeholders.contains(&counterpart.id().unwrap()));
    assert!(counterpart.to_string().starts_with("ext-"));

    assert_eq!(
        refs(&owner.references, "friends"),
        &[Ref::Allocated(early.id)]
    );
    assert_eq!(run.report.count("placeholder_synthesized"), 1);
    assert_eq!(run.report.count("dropped_reference"), 1);
}

#[test]
fn folder_cycle_is_rewritten_to_root() {
    let mut run = Run::new();
    let parent = |key: &str| {
        RefSpec::single("parent", RefScope::OwnerContainers, Some(key)).with_fallback("root")
    };
    let seed = OwnerSeed::new()
        .container(ContainerSeed::new("root"))
        .container(ContainerSeed::new("a").parent(parent("b")))
        .container(ContainerSeed::new("b").parent(parent("a")));
    let owner = run.assemble("owner@example.com", seed);

    let root = &owner.containers[0];
    let a = &owner.containers[1];
    let b = &owner.containers[2];
    assert_eq!(root.parent, None);
    assert_eq!(a.parent, Some(Ref::Allocated(root.id)));
    assert_eq!(b.parent, Some(Ref::Allocated(a.id)));
    assert_eq!(run.report.count("parent_cycle_broken"), 1);
}

#[test]
fn recomputing_aggregates_changes_nothing() {
    let mut run = Run::new();
    let container = ContainerSeed::new("inbox")
        .item(ItemSeed::new("one").size(100))
        .item(ItemSeed::new("two").size(250));
    let owner = run.assemble(
        "owner@example.com",
        OwnerSeed::new()
            .container(container)
            .container(ContainerSeed::new("empty")),
    );

    assert_eq!(owner.aggregates.container_count, 2);
    assert_eq!(owner.aggregates.item_count, 2);
    assert_eq!(owner.aggregates.storage_bytes, 350);
    assert_eq!(owner.containers[1].aggregates.item_count, 0);
    assert_eq!(owner.containers[1].aggregates.last_activity, None);

    let again = recompute(owner.clone(), now());
    assert_eq!(again, owner);
}

#[test]
fn duplicate_container_key_is_fatal() {
    let mut run = Run::new();
    let owner_id = run.allocator.allocate(&Scope::Owner, "owner@example.com");
    let identity = OwnerIdentity::new("owner@example.com");
    let seed = OwnerSeed::new()
        .container(ContainerSeed::new("same"))
        .container(ContainerSeed::new("same"));
    let result = assemble_owner(
        &mut AssemblyContext {
            allocator: &mut run.allocator,
            synth: &mut run.synth,
            report: &mut run.report,
            placeholders: &mut run.placeholders,
            window: &run.window,
            offset: OffsetRule::Minutes(&[30]),
        },
        owner_id,
        &identity,
        seed,
    );
    assert!(result.is_err());
}
