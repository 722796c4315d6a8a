//! Generation pipeline.
//!
//! # Responsibility
//! - Drive one backend through a full run: validate, allocate catalogs,
//!   generate owners one at a time, audit.
//! - Own the run-scoped allocator and RNG; nothing outlives the run.
//!
//! # Invariants
//! - Fatal conditions are detected before the first entity where possible.
//! - An owner is fully assembled before the next one starts.
//! - A run either returns a state that passed the audit or an error.

pub mod assemble;

use crate::audit::audit_state;
use crate::backends::{Backend, OwnerContext};
use crate::config::RunConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::identity::{unique_key, IdentityAllocator, Scope};
use crate::model::graph::{CatalogEntry, GeneratedState};
use crate::model::seed::{OwnerFixture, OwnerIdentity};
use crate::report::RunReport;
use crate::synth::Synthesizer;
use crate::vocab::VocabularySet;
use assemble::{assemble_owner, AssemblyContext};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A finished run.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub state: GeneratedState,
    pub report: RunReport,
}

/// Runs `backend` once.
///
/// `vocab_override` replaces the built-in lists it names. Only the override
/// for `backend` is read from `config.services`; names of other services
/// are not checked here. [`crate::BackendRegistry::generate`] checks them against
/// the registered services first.
///
/// # Errors
/// - `InvalidConfig` for bad run parameters.
/// - `EmptyVocabulary` when a required list is empty.
/// - `DuplicateFixtureKey`, `DuplicateSeedKey` for inconsistent seeds.
/// - `CollisionExhausted` when owner keys run out.
/// - `Audit` when the assembled state violates an output invariant.
pub fn generate(
    backend: &dyn Backend,
    config: &RunConfig,
    vocab_override: Option<&VocabularySet>,
) -> GenerationResult<GenerationOutcome> {
    let service = backend.name();
    config.validate()?;
    let profile = config.profile_for(service, backend.default_profile());
    profile.validate(service)?;

    let mut vocab = backend.builtin_vocabulary();
    if let Some(patch) = vocab_override {
        vocab.merge(patch);
    }
    if let Some(unmet) = vocab.first_unmet(&backend.required_vocabularies()) {
        return Err(GenerationError::EmptyVocabulary {
            kind: unmet.kind.to_string(),
            vocabulary: unmet.vocabulary.to_string(),
        });
    }

    let now = config.resolve_now();
    let fixtures = if config.include_fixtures {
        let mut fixtures = backend.fixtures(now);
        fixtures.truncate(config.owners as usize);
        check_fixture_keys(&fixtures)?;
        fixtures
    } else {
        Vec::new()
    };

    info!(
        "event=generation_start module=engine service={} owners={} fixtures={} seeded={}",
        service,
        config.owners,
        fixtures.len(),
        config.seed.is_some()
    );

    let mut allocator = IdentityAllocator::seeded(config.seed);
    let mut synth = Synthesizer::seeded(config.seed, now);
    let mut report = RunReport::new(service);
    let mut placeholders = BTreeSet::new();

    let mut catalogs: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();
    let mut catalog_keys = Vec::new();
    for entry in backend.catalog(&mut synth, &vocab) {
        let scope = Scope::Catalog(entry.catalog.to_string());
        if allocator.contains(&scope, &entry.key) {
            return Err(GenerationError::DuplicateSeedKey {
                scope,
                key: entry.key,
            });
        }
        let id = allocator.allocate(&scope, &entry.key);
        catalog_keys.push(entry.key.clone());
        catalogs
            .entry(entry.catalog.to_string())
            .or_default()
            .push(CatalogEntry {
                id,
                key: entry.key,
                attributes: entry.attributes,
            });
    }

    let owner_kind = format!("{service} owner");
    let mut fixtures = fixtures.into_iter();
    let mut known_owners: Vec<OwnerIdentity> = Vec::with_capacity(config.owners as usize);
    let mut owners = Vec::with_capacity(config.owners as usize);

    for index in 0..config.owners as usize {
        let (identity, fixture_seed) = match fixtures.next() {
            Some(OwnerFixture { identity, seed }) => (identity, Some(seed)),
            None => {
                let identity = unique_key(
                    config.key_attempts,
                    || backend.propose_identity(&mut synth, &vocab),
                    |candidate| identity_taken(&allocator, candidate),
                )
                .map_err(|exhausted| GenerationError::CollisionExhausted {
                    kind: owner_kind.clone(),
                    vocabularies: backend
                        .identity_vocabularies()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    attempts: exhausted.attempts,
                })?;
                (identity, None)
            }
        };

        let owner_id = allocator.allocate(&Scope::Owner, &identity.natural_key);
        for alias in &identity.aliases {
            allocator.bind(&Scope::Owner, alias, owner_id)?;
        }

        let seed = match fixture_seed {
            Some(seed) => seed,
            None => backend.synthesize_owner(&mut OwnerContext {
                index,
                owner_id,
                identity: &identity,
                profile: &profile,
                vocab: &vocab,
                synth: &mut synth,
                known_owners: &known_owners,
                catalog_keys: &catalog_keys,
                key_attempts: config.key_attempts,
            })?,
        };

        let owner = assemble_owner(
            &mut AssemblyContext {
                allocator: &mut allocator,
                synth: &mut synth,
                report: &mut report,
                placeholders: &mut placeholders,
                window: &profile.window,
                offset: backend.modification_offset(),
            },
            owner_id,
            &identity,
            seed,
        )?;
        debug!(
            "event=owner_assembled module=engine service={} index={} containers={} items={}",
            service, index, owner.aggregates.container_count, owner.aggregates.item_count
        );
        owners.push(owner);
        known_owners.push(identity);
    }

    let state = GeneratedState {
        service: service.to_string(),
        reference_time: now,
        owners,
        catalogs,
        placeholders,
    };
    audit_state(&state, backend.well_known_keys())?;

    info!(
        "event=generation_done module=engine service={} owners={} items={} identifiers={} recoveries={}",
        service,
        state.owners.len(),
        state.item_count(),
        allocator.issued_count(),
        report.total()
    );
    Ok(GenerationOutcome { state, report })
}

/// A candidate collides if any of its keys is already an owner key, or if
/// it repeats a key itself.
fn identity_taken(allocator: &IdentityAllocator, candidate: &OwnerIdentity) -> bool {
    let mut own = HashSet::new();
    candidate
        .keys()
        .any(|key| !own.insert(key) || allocator.contains(&Scope::Owner, key))
}

fn check_fixture_keys(fixtures: &[OwnerFixture]) -> GenerationResult<()> {
    let mut seen = HashSet::new();
    for fixture in fixtures {
        for key in fixture.identity.keys() {
            if !seen.insert(key) {
                return Err(GenerationError::DuplicateFixtureKey {
                    key: key.to_string(),
                });
            }
        }
    }
    Ok(())
}
