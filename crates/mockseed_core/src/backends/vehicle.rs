//! Connected-vehicle service: users with a friend list and a garage.

use crate::backends::common::{email_identity, peer_keys, ref_list, stranger_email};
use crate::backends::{Backend, OwnerContext};
use crate::config::{CountRange, GenerationProfile, TimeWindow};
use crate::error::{GenerationError, GenerationResult};
use crate::identity::unique_key;
use crate::model::graph::Owner;
use crate::model::reference::{RefScope, RefSpec};
use crate::model::seed::{ContainerSeed, ItemSeed, OwnerFixture, OwnerIdentity, OwnerSeed, SeedTime};
use crate::synth::time::iso_seconds;
use crate::synth::{OffsetRule, Synthesizer};
use crate::vocab::{people, VocabularyRequirement, VocabularySet};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

const GARAGE_KEY: &str = "garage";
const VEHICLE_COUNT_WEIGHTS: &[f64] = &[0.4, 0.4, 0.15, 0.05];
const VIN_PREFIXES: &[&str] = &["5YJ", "7SA", "LFV", "LRW"];
const VIN_YEAR_CODES: &str = "PRSTVWXY123456789";
const VIN_PLANT_CODES: &str = "ABCDEFGHJKLMNPRSTVWXY";
const VIN_SERIAL_CHARS: &str = "0123456789ABCDEFGHJKLMNPRSTUVWXYZ";
const OPEN_CLOSED: &[&str] = &["open", "closed"];
const KEEPER_MODES: &[&str] = &["off", "dog", "camp"];
const CHARGE_LIMITS: &[i64] = &[70, 80, 90, 100];

pub struct VehicleBackend;

impl Backend for VehicleBackend {
    fn name(&self) -> &'static str {
        "vehicle"
    }

    fn default_profile(&self) -> GenerationProfile {
        GenerationProfile {
            containers: CountRange::exactly(1),
            items: CountRange::new(0, 3),
            peers: CountRange::new(0, 5),
            window: TimeWindow::past(365 * 2, 365 * 5),
        }
    }

    fn builtin_vocabulary(&self) -> VocabularySet {
        people(&["gmail.com", "yahoo.com", "outlook.com", "icloud.com", "proton.me"])
            .with_list(
                "vehicle_models",
                &["Model 3", "Model Y", "Model S", "Model X", "Cybertruck", "Roadster"],
            )
            .with_list(
                "sentry_alerts",
                &[
                    "Motion detected near front door",
                    "Object too close to rear bumper",
                    "Alarm triggered by strange noise",
                    "Recording event - vehicle approached",
                ],
            )
            .with_list(
                "firmware_versions",
                &["2024.14.7", "2024.12.3", "2024.8.9", "2023.44.30.8", "2023.38.10"],
            )
            .with_list(
                "playlist_titles",
                &[
                    "Road Trip Anthems",
                    "Morning Commute",
                    "Chill Drive",
                    "Night Cruise",
                    "Podcast Queue",
                    "Focus Beats",
                ],
            )
    }

    fn required_vocabularies(&self) -> Vec<VocabularyRequirement> {
        vec![
            VocabularyRequirement::new("vehicle owner", "first_names"),
            VocabularyRequirement::new("vehicle owner", "last_names"),
            VocabularyRequirement::new("vehicle owner", "email_domains"),
            VocabularyRequirement::new("vehicle", "vehicle_models"),
            VocabularyRequirement::new("vehicle", "firmware_versions"),
            VocabularyRequirement::new("vehicle", "playlist_titles"),
            VocabularyRequirement::new("vehicle", "sentry_alerts"),
        ]
    }

    fn identity_vocabularies(&self) -> Vec<&'static str> {
        vec!["first_names", "last_names", "email_domains"]
    }

    fn modification_offset(&self) -> OffsetRule {
        OffsetRule::Seconds {
            min: 60,
            max: 86_400 * 60,
        }
    }

    fn fixtures(&self, _now: DateTime<Utc>) -> Vec<OwnerFixture> {
        Vec::new()
    }

    fn propose_identity(&self, synth: &mut Synthesizer, vocab: &VocabularySet) -> OwnerIdentity {
        email_identity(synth, vocab, 999)
    }

    fn synthesize_owner(&self, ctx: &mut OwnerContext<'_>) -> GenerationResult<OwnerSeed> {
        let vocab = ctx.vocab;
        let synth = &mut *ctx.synth;
        let first = ctx.identity.attr_str("first_name").to_lowercase();

        let mut friends = peer_keys(synth, ctx.known_owners, ctx.profile.peers);
        if synth.chance(0.3) && !ctx.known_owners.is_empty() {
            // Strangers are never users of the run; the reference drops.
            friends.push(stranger_email(synth, vocab));
        }

        let drawn = synth.weighted(VEHICLE_COUNT_WEIGHTS) as u32;
        let vehicle_count = drawn.clamp(ctx.profile.items.min, ctx.profile.items.max);
        let mut garage = ContainerSeed::new(GARAGE_KEY);
        let mut tags: HashSet<String> = HashSet::new();

        for index in 0..vehicle_count {
            let tag = unique_key(
                ctx.key_attempts,
                || {
                    let model = synth.pick(vocab.get("vehicle_models"));
                    let slot = if index == 0 { 1 } else { synth.int(1, 5) };
                    format!("{first}_{}_{slot}", model.replace(' ', "_").to_lowercase())
                },
                |candidate| tags.contains(candidate),
            )
            .map_err(|exhausted| GenerationError::CollisionExhausted {
                kind: "vehicle tag".to_string(),
                vocabularies: vec!["vehicle_models".to_string()],
                attempts: exhausted.attempts,
            })?;
            tags.insert(tag.clone());

            let mut vehicle = vehicle_seed(synth, vocab, tag)
                .created(SeedTime::At(synth.days_ago(365 * 2, 365 * 5)))
                .modified(SeedTime::At(synth.days_ago(0, 60)));
            let co_driver_count = synth.int(0, 2) as usize;
            let co_drivers: Vec<String> = synth
                .sample(&friends, co_driver_count)
                .into_iter()
                .map(str::to_string)
                .collect();
            if !co_drivers.is_empty() {
                vehicle = vehicle.reference(RefSpec::set("co_drivers", RefScope::Owners, co_drivers));
            }
            garage = garage.item(vehicle);
        }

        Ok(OwnerSeed::new()
            .reference(RefSpec::set("friends", RefScope::Owners, friends).excluding_self())
            .container(garage))
    }

    fn render_owner(&self, owner: &Owner) -> Value {
        let mut vehicles = Map::new();
        for vehicle in owner.items() {
            let mut rendered = vehicle.attributes.clone();
            rendered.insert("id".to_string(), Value::from(vehicle.id.to_string()));
            rendered.insert("original_vehicle_tag".to_string(), Value::from(vehicle.key.clone()));
            rendered.insert("createdTime".to_string(), Value::from(iso_seconds(vehicle.created_at)));
            rendered.insert("modifiedTime".to_string(), Value::from(iso_seconds(vehicle.modified_at)));
            rendered.insert("co_drivers".to_string(), ref_list(&vehicle.references, "co_drivers"));
            vehicles.insert(vehicle.id.to_string(), Value::Object(rendered));
        }

        let mut rendered = owner.attributes.clone();
        rendered.insert("id".to_string(), Value::from(owner.id.to_string()));
        rendered.insert("friends".to_string(), ref_list(&owner.references, "friends"));
        rendered.insert("tesla_data".to_string(), json!({ "vehicles": Value::Object(vehicles) }));
        rendered.insert("vehicle_count".to_string(), Value::from(owner.aggregates.item_count));
        Value::Object(rendered)
    }

    fn reference_fields(&self) -> &'static [&'static str] {
        &["friends", "co_drivers"]
    }
}

fn vin(synth: &mut Synthesizer) -> String {
    let prefix = synth.choose(VIN_PREFIXES).copied().unwrap_or("5YJ");
    let year = synth.code(VIN_YEAR_CODES, 1);
    let plant = synth.code(VIN_PLANT_CODES, 1);
    let serial = synth.code(VIN_SERIAL_CHARS, 12);
    format!("{prefix}{}{year}{plant}{}", &serial[..5], &serial[7..])
}

fn open_or_closed(synth: &mut Synthesizer) -> &'static str {
    synth.choose(OPEN_CLOSED).copied().unwrap_or("closed")
}

fn vehicle_seed(synth: &mut Synthesizer, vocab: &VocabularySet, tag: String) -> ItemSeed {
    let playing = synth.chance(0.5);
    let favorite_count = synth.int(0, 3) as usize;
    let favorites: Vec<&str> = synth.sample(vocab.get("playlist_titles"), favorite_count);
    let volume = synth.int(20, 90);
    let track = if playing { synth.int(0, 5) } else { 0 };
    let media = json!({
        "playing": playing,
        "volume": volume,
        "current_track": track,
        "favorites": favorites,
    });

    let sentry_on = synth.chance(0.3);
    let alert_count = if sentry_on { synth.int(0, 2) as usize } else { 0 };
    let alerts: Vec<&str> = synth.sample(vocab.get("sentry_alerts"), alert_count);

    let speed = if synth.chance(0.5) { synth.int(0, 120) } else { 0 };
    let latitude = synth.float(25.0, 49.0, 4);
    let longitude = synth.float(-125.0, -66.0, 4);

    ItemSeed::new(tag)
        .attr("model", synth.pick(vocab.get("vehicle_models")))
        .attr("vehicle_tag", vin(synth))
        .attr("horn", false)
        .attr("media", media)
        .attr(
            "trunk",
            json!({ "front": open_or_closed(synth), "rear": open_or_closed(synth) }),
        )
        .attr(
            "charge",
            json!({
                "port_open": synth.chance(0.2),
                "charging": synth.chance(0.4),
                "limit": synth.choose(CHARGE_LIMITS).copied().unwrap_or(80),
            }),
        )
        .attr(
            "climate",
            json!({
                "on": synth.chance(0.6),
                "bioweapon_mode": synth.chance(0.05),
                "climate_keeper_mode": synth.choose(KEEPER_MODES).copied().unwrap_or("off"),
                "cop_temp": synth.int(20, 30),
                "driver_temp": synth.int(18, 25),
            }),
        )
        .attr("locks", json!({ "locked": synth.chance(0.8) }))
        .attr("sentry_mode", json!({ "on": sentry_on, "alerts": alerts }))
        .attr("lights", json!({ "on": synth.chance(0.1) }))
        .attr(
            "doors",
            json!({
                "driver_front": open_or_closed(synth),
                "passenger_front": open_or_closed(synth),
                "driver_rear": open_or_closed(synth),
                "passenger_rear": open_or_closed(synth),
            }),
        )
        .attr("windows", open_or_closed(synth))
        .attr("awake", synth.chance(0.7))
        .attr("speed", speed)
        .attr("location", json!({ "latitude": latitude, "longitude": longitude }))
        .attr("firmware_version", synth.pick(vocab.get("firmware_versions")))
}

#[cfg(test)]
mod tests {
    use super::{vin, VehicleBackend};
    use crate::config::RunConfig;
    use crate::engine::generate;
    use crate::model::graph::refs;
    use crate::synth::Synthesizer;
    use chrono::{DateTime, Utc};
    use std::collections::HashSet;

    fn config(owners: u32) -> RunConfig {
        RunConfig {
            seed: Some(17),
            reference_time: Some(
                DateTime::parse_from_rfc3339("2025-04-01T00:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            owners,
            ..RunConfig::default()
        }
    }

    #[test]
    fn vin_has_fixed_shape() {
        let mut synth = Synthesizer::seeded(Some(1), Utc::now());
        let value = vin(&mut synth);
        assert_eq!(value.len(), 15);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn friends_never_include_self_or_strangers() {
        let outcome = generate(&VehicleBackend, &config(30), None).unwrap();
        let ids: HashSet<_> = outcome.state.owners.iter().map(|o| o.id).collect();
        for owner in &outcome.state.owners {
            for friend in refs(&owner.references, "friends") {
                let id = friend.id().unwrap();
                assert_ne!(id, owner.id);
                assert!(ids.contains(&id));
                assert!(!friend.is_placeholder());
            }
        }
    }

    #[test]
    fn vehicle_tags_are_unique_per_owner() {
        let outcome = generate(&VehicleBackend, &config(30), None).unwrap();
        for owner in &outcome.state.owners {
            assert!(owner.aggregates.item_count <= 3);
            let tags: HashSet<_> = owner.items().map(|v| v.key.as_str()).collect();
            assert_eq!(tags.len(), owner.aggregates.item_count);
            for vehicle in owner.items() {
                assert!(vehicle.created_at < vehicle.modified_at);
            }
        }
    }
}
