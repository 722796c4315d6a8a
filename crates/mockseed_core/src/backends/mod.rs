//! Per-service adapters.
//!
//! # Responsibility
//! - Describe one simulated service: its vocabularies, fixtures, seed
//!   synthesis, and document rendering.
//! - Leave identity, resolution, timelines, and aggregates to the engine.
//!
//! # See also
//! - `engine` for the pipeline every adapter runs through.

pub mod calendar;
pub mod common;
pub mod drive;
pub mod messaging;
pub mod notes;
pub mod registry;
pub mod retail;
pub mod streaming;
pub mod vehicle;

use crate::config::GenerationProfile;
use crate::error::GenerationResult;
use crate::identity::EntityId;
use crate::model::graph::{CatalogEntry, Owner};
use crate::model::seed::{CatalogSeed, OwnerFixture, OwnerIdentity, OwnerSeed};
use crate::synth::{OffsetRule, Synthesizer};
use crate::vocab::{VocabularyRequirement, VocabularySet};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub use registry::{BackendRegistry, RegistryError};

/// Inputs available while synthesizing one owner's seed.
pub struct OwnerContext<'a> {
    /// Zero-based position in the run, fixtures included.
    pub index: usize,
    pub owner_id: EntityId,
    pub identity: &'a OwnerIdentity,
    pub profile: &'a GenerationProfile,
    pub vocab: &'a VocabularySet,
    pub synth: &'a mut Synthesizer,
    /// Owners generated earlier in the run, in order.
    pub known_owners: &'a [OwnerIdentity],
    /// Natural keys of every catalog entry.
    pub catalog_keys: &'a [String],
    pub key_attempts: u32,
}

/// One simulated service.
pub trait Backend: Send + Sync {
    /// Registry name; also names the output file.
    fn name(&self) -> &'static str;

    fn default_profile(&self) -> GenerationProfile;

    fn builtin_vocabulary(&self) -> VocabularySet;

    /// Lists checked before any entity is generated.
    fn required_vocabularies(&self) -> Vec<VocabularyRequirement>;

    /// Lists owner natural keys are built from, named when keys run out.
    fn identity_vocabularies(&self) -> Vec<&'static str>;

    /// Derivation of missing item modification timestamps.
    fn modification_offset(&self) -> OffsetRule;

    /// Constants this backend may emit in place of an identifier.
    fn well_known_keys(&self) -> &'static [&'static str] {
        &[]
    }

    /// Run-wide catalog entries, generated before any owner.
    fn catalog(&self, _synth: &mut Synthesizer, _vocab: &VocabularySet) -> Vec<CatalogSeed> {
        Vec::new()
    }

    /// Hand-written owners, generated first.
    fn fixtures(&self, now: DateTime<Utc>) -> Vec<OwnerFixture>;

    /// Proposes a fresh identity; the engine retries on collision.
    fn propose_identity(&self, synth: &mut Synthesizer, vocab: &VocabularySet) -> OwnerIdentity;

    fn synthesize_owner(&self, ctx: &mut OwnerContext<'_>) -> GenerationResult<OwnerSeed>;

    fn render_owner(&self, owner: &Owner) -> Value;

    fn render_catalog_entry(&self, entry: &CatalogEntry) -> Value {
        common::with_id(entry.id, &entry.attributes)
    }

    /// Document fields holding references, checked by `verify_document`.
    fn reference_fields(&self) -> &'static [&'static str];
}
