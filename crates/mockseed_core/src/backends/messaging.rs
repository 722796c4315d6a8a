//! Carrier messaging service: SMS and call logs per subscriber.
//!
//! Each log entry has one counterpart. Counterparts that are not users of
//! the run (bare phone numbers, later users) become external placeholders.

use crate::backends::common::{email_identity, fixture_identity, peer_keys, ref_list, single_ref};
use crate::backends::{Backend, OwnerContext};
use crate::config::{CountRange, GenerationProfile, TimeWindow};
use crate::error::GenerationResult;
use crate::model::graph::{first_ref, Item, Owner};
use crate::model::reference::{RefScope, RefSpec};
use crate::model::seed::{ContainerSeed, ItemSeed, OwnerFixture, OwnerIdentity, OwnerSeed, SeedTime};
use crate::synth::time::iso_seconds;
use crate::synth::{OffsetRule, Synthesizer};
use crate::vocab::{people, VocabularyRequirement, VocabularySet};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};

const SMS_LOG: &str = "sms";
const CALL_LOG: &str = "calls";
const SERVICE_PLANS: &[&str] = &["basic", "premium", "unlimited"];
const HASH_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const HEX_CHARS: &str = "0123456789abcdef";

pub struct MessagingBackend;

impl Backend for MessagingBackend {
    fn name(&self) -> &'static str {
        "messaging"
    }

    fn default_profile(&self) -> GenerationProfile {
        GenerationProfile {
            containers: CountRange::exactly(2),
            items: CountRange::new(0, 8),
            peers: CountRange::new(0, 5),
            window: TimeWindow::past(1, 90),
        }
    }

    fn builtin_vocabulary(&self) -> VocabularySet {
        people(&["communi.link"])
            .with_list(
                "sms_openers",
                &["Hi there!", "Are you free later?", "Got it, thanks!", "See you soon!", "On my way."],
            )
            .with_list("sms_replies", &["Hey!", "Yep!", "Sounds good!", "Awesome!"])
    }

    fn required_vocabularies(&self) -> Vec<VocabularyRequirement> {
        vec![
            VocabularyRequirement::new("messaging owner", "first_names"),
            VocabularyRequirement::new("messaging owner", "last_names"),
            VocabularyRequirement::new("messaging owner", "email_domains"),
            VocabularyRequirement::new("sms", "sms_openers"),
            VocabularyRequirement::new("sms", "sms_replies"),
        ]
    }

    fn identity_vocabularies(&self) -> Vec<&'static str> {
        vec!["first_names", "last_names", "email_domains"]
    }

    fn modification_offset(&self) -> OffsetRule {
        OffsetRule::Seconds { min: 60, max: 600 }
    }

    fn fixtures(&self, now: DateTime<Utc>) -> Vec<OwnerFixture> {
        let alice = "alice.smith@communi.link";
        let bob = "bob.johnson@communi.link";
        let charlie = "charlie.brown@communi.link";
        let ago = |minutes: i64| SeedTime::At(now - Duration::minutes(minutes));

        vec![
            OwnerFixture {
                identity: fixture_identity(alice, "Alice", "Smith"),
                seed: subscriber("+12025550101", 100.0, "premium", true, "")
                    .reference(contacts([bob, charlie]))
                    .container(
                        ContainerSeed::new(SMS_LOG)
                            .item(sms("sms_0", true, bob, "Hey Bob, planning anything for the weekend?", ago(58 * 60)))
                            .item(sms("sms_1", false, bob, "Just chilling. Wanna grab coffee?", ago(57 * 60 + 30)))
                            .item(sms("sms_2", true, "+12025550105", "Reminder: Dentist appointment tomorrow at 2 PM.", ago(5 * 60))),
                    )
                    .container(
                        ContainerSeed::new(CALL_LOG)
                            .item(call("call_0", true, charlie, 5, ago(3 * 24 * 60))),
                    ),
            },
            OwnerFixture {
                identity: fixture_identity(bob, "Robert", "Johnson"),
                seed: subscriber("+12025550102", 50.0, "basic", false, "+12025550103")
                    .reference(contacts([alice, charlie]))
                    .container(
                        ContainerSeed::new(SMS_LOG)
                            .item(sms("sms_0", true, alice, "Just chilling. Wanna grab coffee?", ago(57 * 60 + 30))),
                    )
                    .container(
                        ContainerSeed::new(CALL_LOG)
                            .item(call("call_0", true, "+12025550103", 10, ago(12 * 60))),
                    ),
            },
            OwnerFixture {
                identity: fixture_identity(charlie, "Charles", "Brown"),
                seed: subscriber("+12025550104", 250.0, "unlimited", true, "")
                    .reference(contacts([alice, bob]))
                    .container(
                        ContainerSeed::new(SMS_LOG)
                            .item(sms("sms_0", true, alice, "Don't forget our meeting at 3 PM!", ago(2 * 60))),
                    )
                    .container(
                        ContainerSeed::new(CALL_LOG)
                            .item(call("call_0", false, alice, 5, ago(3 * 24 * 60))),
                    ),
            },
        ]
    }

    fn propose_identity(&self, synth: &mut Synthesizer, vocab: &VocabularySet) -> OwnerIdentity {
        email_identity(synth, vocab, 999)
    }

    fn synthesize_owner(&self, ctx: &mut OwnerContext<'_>) -> GenerationResult<OwnerSeed> {
        let vocab = ctx.vocab;
        let synth = &mut *ctx.synth;

        let plan = synth.choose(SERVICE_PLANS).copied().unwrap_or("basic");
        let forwarding = if synth.chance(0.2) {
            phone_number(synth)
        } else {
            String::new()
        };
        let notifications = synth.chance(0.5);
        let phone = phone_number(synth);
        let balance = synth.float(5.0, 1000.0, 2);
        let mut seed = subscriber(&phone, balance, plan, notifications, &forwarding)
            .attr("last_login", iso_seconds(synth.days_ago(1, 30)))
            .attr("is_active", synth.weighted(&[2.0, 1.0]) == 0)
            .attr("password_hash", password_hash(synth))
            .reference(contacts(peer_keys(synth, ctx.known_owners, ctx.profile.peers)));

        let mut texts = ContainerSeed::new(SMS_LOG);
        let mut index = 0usize;
        for _ in 0..synth.count(ctx.profile.items) {
            let other = match synth.choose(ctx.known_owners) {
                Some(peer) if synth.chance(0.7) => peer.natural_key.clone(),
                _ => phone_number(synth),
            };
            let sent = SeedTime::At(synth.days_ago(1, 90));
            let opener = synth.pick(vocab.get("sms_openers"));
            texts = texts.item(sms(&format!("sms_{index}"), true, &other, opener, sent));
            index += 1;
            if !other.starts_with('+') {
                let reply = synth.pick(vocab.get("sms_replies"));
                let received = SeedTime::At(synth.days_ago(1, 89));
                texts = texts.item(sms(&format!("sms_{index}"), false, &other, reply, received));
                index += 1;
            }
        }

        let mut calls = ContainerSeed::new(CALL_LOG);
        let call_count = synth.count(ctx.profile.items).min(3);
        for index in 0..call_count {
            let outgoing = synth.chance(0.5);
            let duration = synth.int(1, 30);
            let other = match synth.choose(ctx.known_owners) {
                Some(peer) if !synth.chance(0.3) => peer.natural_key.clone(),
                _ => phone_number(synth),
            };
            let at = SeedTime::At(synth.days_ago(1, 90));
            calls = calls.item(call(&format!("call_{index}"), outgoing, &other, duration, at));
        }

        seed = seed.container(texts).container(calls);
        Ok(seed)
    }

    fn render_owner(&self, owner: &Owner) -> Value {
        let mut sms_history = Vec::new();
        let mut call_history = Vec::new();
        for log in &owner.containers {
            for entry in log.items() {
                match log.key.as_str() {
                    SMS_LOG => sms_history.push(render_sms(owner, entry)),
                    CALL_LOG => call_history.push(render_call(owner, entry)),
                    _ => {}
                }
            }
        }

        let mut rendered = owner.attributes.clone();
        rendered.insert("sms_history".to_string(), Value::Array(sms_history));
        rendered.insert("call_history".to_string(), Value::Array(call_history));
        rendered.insert("contacts".to_string(), ref_list(&owner.references, "contacts"));
        rendered.insert("activity_count".to_string(), Value::from(owner.aggregates.item_count));
        rendered.insert(
            "last_activity".to_string(),
            Value::from(iso_seconds(owner.aggregates.last_activity)),
        );
        Value::Object(rendered)
    }

    fn reference_fields(&self) -> &'static [&'static str] {
        &["contacts", "sender_id", "receiver_id", "caller_id"]
    }
}

fn subscriber(phone: &str, balance: f64, plan: &str, notifications: bool, forwarding: &str) -> OwnerSeed {
    OwnerSeed::new()
        .attr("phone_number", phone)
        .attr("balance", balance)
        .attr("service_plan", plan)
        .attr(
            "settings",
            json!({
                "sms_notifications": notifications,
                "call_forwarding_enabled": !forwarding.is_empty(),
                "call_forwarding_number": forwarding,
            }),
        )
}

fn contacts<I, S>(keys: I) -> RefSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RefSpec::set("contacts", RefScope::Owners, keys).excluding_self()
}

fn counterpart(key: &str) -> RefSpec {
    RefSpec::single("counterpart", RefScope::Owners, Some(key)).with_placeholders()
}

fn sms(key: &str, sent: bool, other: &str, message: &str, at: SeedTime) -> ItemSeed {
    ItemSeed::new(key)
        .created(at)
        .attr("direction", if sent { "sent" } else { "received" })
        .attr("message", message)
        .reference(counterpart(other))
}

fn call(key: &str, outgoing: bool, other: &str, minutes: i64, at: SeedTime) -> ItemSeed {
    ItemSeed::new(key)
        .created(at)
        .attr("type", if outgoing { "outgoing" } else { "incoming" })
        .attr("duration_minutes", minutes)
        .reference(counterpart(other))
}

fn phone_number(synth: &mut Synthesizer) -> String {
    let area = synth.int(200, 999);
    let prefix = synth.int(100, 999);
    let line = synth.int(1000, 9999);
    format!("+1{area}{prefix}{line}")
}

fn password_hash(synth: &mut Synthesizer) -> String {
    let mut hash = synth.code(HEX_CHARS, 32);
    hash.push_str(&synth.code(HASH_CHARS, 16));
    hash
}

/// `(self, other)` in the entry's direction.
fn endpoints(owner: &Owner, entry: &Item, forward: bool) -> (Value, Value) {
    let me = Value::from(owner.id.to_string());
    let other = single_ref(&entry.references, "counterpart");
    if forward {
        (me, other)
    } else {
        (other, me)
    }
}

fn is_external(entry: &Item) -> bool {
    first_ref(&entry.references, "counterpart")
        .map_or(true, |target| target.is_placeholder())
}

fn render_sms(owner: &Owner, entry: &Item) -> Value {
    let sent = entry.attributes.get("direction").and_then(Value::as_str) == Some("sent");
    let (sender, receiver) = endpoints(owner, entry, sent);
    let mut rendered = Map::new();
    rendered.insert("sms_id".to_string(), Value::from(entry.id.to_string()));
    rendered.insert("sender_id".to_string(), sender);
    rendered.insert("receiver_id".to_string(), receiver);
    if let Some(message) = entry.attributes.get("message") {
        rendered.insert("message".to_string(), message.clone());
    }
    rendered.insert("timestamp".to_string(), Value::from(iso_seconds(entry.created_at)));
    rendered.insert("is_external".to_string(), Value::from(is_external(entry)));
    Value::Object(rendered)
}

fn render_call(owner: &Owner, entry: &Item) -> Value {
    let outgoing = entry.attributes.get("type").and_then(Value::as_str) == Some("outgoing");
    let (caller, receiver) = endpoints(owner, entry, outgoing);
    let mut rendered = entry.attributes.clone();
    rendered.insert("call_id".to_string(), Value::from(entry.id.to_string()));
    rendered.insert("caller_id".to_string(), caller);
    rendered.insert("receiver_id".to_string(), receiver);
    rendered.insert("timestamp".to_string(), Value::from(iso_seconds(entry.created_at)));
    rendered.insert("is_external".to_string(), Value::from(is_external(entry)));
    Value::Object(rendered)
}
