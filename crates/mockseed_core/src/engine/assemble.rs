//! Entity assembly for one owner.
//!
//! Order: allocate containers and items, build timelines, resolve
//! references, repair hierarchy cycles, recompute aggregates.

use crate::aggregate;
use crate::config::TimeWindow;
use crate::error::{GenerationError, GenerationResult};
use crate::identity::{EntityId, IdentityAllocator, Scope};
use crate::model::graph::{Container, Item, Owner, OwnerAggregates};
use crate::model::reference::OnUnresolved;
use crate::model::seed::{OwnerIdentity, OwnerSeed};
use crate::report::RunReport;
use crate::resolve::hierarchy::break_cycles;
use crate::resolve::ReferenceResolver;
use crate::synth::{OffsetRule, Synthesizer};
use std::collections::BTreeSet;

/// Mutable run state an owner is assembled against.
pub struct AssemblyContext<'a> {
    pub allocator: &'a mut IdentityAllocator,
    pub synth: &'a mut Synthesizer,
    pub report: &'a mut RunReport,
    pub placeholders: &'a mut BTreeSet<EntityId>,
    pub window: &'a TimeWindow,
    pub offset: OffsetRule,
}

/// Turns an allocated owner and its seed into a resolved, aggregated owner.
///
/// # Errors
/// - `DuplicateSeedKey` when two containers of the owner, or two items of a
///   container, share a temporary key.
pub fn assemble_owner(
    ctx: &mut AssemblyContext<'_>,
    owner_id: EntityId,
    identity: &OwnerIdentity,
    seed: OwnerSeed,
) -> GenerationResult<Owner> {
    let container_scope = Scope::Container(owner_id);
    let mut container_ids = Vec::with_capacity(seed.containers.len());
    for container in &seed.containers {
        container_ids.push(allocate_unique(ctx.allocator, &container_scope, &container.key)?);
    }
    let mut item_ids = Vec::with_capacity(seed.containers.len());
    for (container, container_id) in seed.containers.iter().zip(&container_ids) {
        let item_scope = Scope::Item(*container_id);
        let mut ids = Vec::with_capacity(container.items.len());
        for item in &container.items {
            ids.push(allocate_unique(ctx.allocator, &item_scope, &item.key)?);
        }
        item_ids.push(ids);
    }

    let mut timelines = Vec::with_capacity(seed.containers.len());
    for container in &seed.containers {
        let mut times = Vec::with_capacity(container.items.len());
        for item in &container.items {
            times.push(ctx.synth.timeline(
                &item.created,
                &item.modified,
                ctx.window,
                ctx.offset,
                ctx.report,
            ));
        }
        timelines.push(times);
    }

    let root_key = seed
        .containers
        .iter()
        .filter_map(|container| container.parent.as_ref())
        .find_map(|parent| match &parent.on_unresolved {
            OnUnresolved::Fallback(key) => Some(key.clone()),
            _ => None,
        });

    let mut resolver =
        ReferenceResolver::new(ctx.allocator, ctx.report, ctx.placeholders, owner_id);
    let owner_refs = resolver.resolve_all(&seed.references);

    let mut containers = Vec::with_capacity(seed.containers.len());
    for (((container_seed, container_id), ids), times) in seed
        .containers
        .into_iter()
        .zip(container_ids)
        .zip(item_ids)
        .zip(timelines)
    {
        let mut container = Container::new(container_id, container_seed.key);
        container.attributes = container_seed.attributes;
        container.parent = container_seed
            .parent
            .as_ref()
            .and_then(|spec| resolver.resolve_field(spec).into_iter().next());
        container.references = resolver.resolve_all(&container_seed.references);

        for ((item_seed, item_id), (created_at, modified_at)) in
            container_seed.items.into_iter().zip(ids).zip(times)
        {
            let references = resolver.resolve_all(&item_seed.references);
            container.push_item(Item {
                id: item_id,
                key: item_seed.key,
                created_at,
                modified_at,
                size_bytes: item_seed.size_bytes,
                attributes: item_seed.attributes,
                references,
            });
        }
        containers.push(container);
    }
    drop(resolver);

    let root_id = root_key.and_then(|key| ctx.allocator.resolve(&container_scope, &key).ok());
    break_cycles(&mut containers, root_id, ctx.report);

    let mut attributes = identity.attributes.clone();
    attributes.extend(seed.attributes);

    let owner = Owner {
        id: owner_id,
        key: identity.natural_key.clone(),
        aliases: identity.aliases.clone(),
        attributes,
        references: owner_refs,
        containers,
        aggregates: OwnerAggregates {
            container_count: 0,
            item_count: 0,
            storage_bytes: 0,
            last_activity: ctx.synth.now(),
        },
    };
    Ok(aggregate::recompute(owner, ctx.synth.now()))
}

fn allocate_unique(
    allocator: &mut IdentityAllocator,
    scope: &Scope,
    key: &str,
) -> GenerationResult<EntityId> {
    if allocator.contains(scope, key) {
        return Err(GenerationError::DuplicateSeedKey {
            scope: scope.clone(),
            key: key.to_string(),
        });
    }
    Ok(allocator.allocate(scope, key))
}
