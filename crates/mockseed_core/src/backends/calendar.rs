//! Calendar service: users, calendars, events.
//!
//! Event start and end map onto item creation and modification, so the
//! timeline invariant doubles as `start <= end`.

use crate::backends::common::{email_identity, fixture_identity, ref_list, stranger_email};
use crate::backends::{Backend, OwnerContext};
use crate::config::{CountRange, GenerationProfile, TimeWindow};
use crate::error::GenerationResult;
use crate::model::graph::Owner;
use crate::model::reference::{RefScope, RefSpec};
use crate::model::seed::{ContainerSeed, ItemSeed, OwnerFixture, OwnerIdentity, OwnerSeed, SeedTime};
use crate::synth::time::iso_seconds;
use crate::synth::{OffsetRule, Synthesizer};
use crate::vocab::{people, VocabularyRequirement, VocabularySet};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};

const EVENT_LENGTHS_MINUTES: &[i64] = &[30, 60, 90, 120];
const EVENT_STATUSES: &[&str] = &["confirmed", "tentative", "cancelled"];
const DEFAULT_TIME_ZONE: &str = "America/New_York";

pub struct CalendarBackend;

impl Backend for CalendarBackend {
    fn name(&self) -> &'static str {
        "calendar"
    }

    fn default_profile(&self) -> GenerationProfile {
        GenerationProfile {
            containers: CountRange::new(1, 3),
            items: CountRange::new(3, 25),
            peers: CountRange::new(0, 3),
            window: TimeWindow {
                min_days_ago: 1,
                max_days_ago: 730,
                future_days: 365,
                forward_share: 0.7,
            },
        }
    }

    fn builtin_vocabulary(&self) -> VocabularySet {
        people(&[
            "bizmail.co",
            "techcorp.io",
            "webmail.net",
            "globalinc.org",
            "mailhub.app",
        ])
        .with_list(
            "time_zones",
            &[
                "America/New_York",
                "America/Los_Angeles",
                "America/Chicago",
                "America/Denver",
                "Europe/London",
                "Europe/Paris",
                "Asia/Tokyo",
                "Asia/Shanghai",
                "Australia/Sydney",
            ],
        )
        .with_list("calendar_labels", &["Main", "Work", "Personal", "Side Project"])
        .with_list(
            "event_summaries",
            &[
                "Daily Standup",
                "Project Brainstorm",
                "Client Demo",
                "One-on-One Meeting",
                "Team Lunch",
                "Training Session",
                "Code Review",
                "Strategic Planning",
                "Vendor Call",
                "Product Launch Sync",
                "Workout Session",
                "Dentist Appointment",
                "Grocery Shopping",
                "Book Club Meeting",
                "Family Dinner",
            ],
        )
        .with_list(
            "event_locations",
            &[
                "Conference Room A",
                "Zoom Call",
                "Office 3B",
                "Cafe Central",
                "Virtual",
                "Gym",
                "Home",
                "Library",
                "Client Site",
            ],
        )
        .with_list(
            "event_descriptions",
            &[
                "Discuss daily progress.",
                "Generate new ideas for Q3.",
                "Showcase latest features.",
                "Catch up on goals.",
                "Casual team get-together.",
                "Learn new software.",
                "Review pull requests.",
                "Outline next year's strategy.",
                "Negotiate new contract.",
                "Coordinate launch activities.",
                "Stay fit.",
                "Routine check-up.",
                "Weekly supplies run.",
                "Discuss current reading.",
                "Enjoy time with family.",
            ],
        )
    }

    fn required_vocabularies(&self) -> Vec<VocabularyRequirement> {
        vec![
            VocabularyRequirement::new("calendar owner", "first_names"),
            VocabularyRequirement::new("calendar owner", "last_names"),
            VocabularyRequirement::new("calendar owner", "email_domains"),
            VocabularyRequirement::new("calendar", "time_zones"),
            VocabularyRequirement::new("calendar", "calendar_labels"),
            VocabularyRequirement::new("event", "event_summaries"),
            VocabularyRequirement::new("event", "event_locations"),
            VocabularyRequirement::new("event", "event_descriptions"),
        ]
    }

    fn identity_vocabularies(&self) -> Vec<&'static str> {
        vec!["first_names", "last_names", "email_domains"]
    }

    fn modification_offset(&self) -> OffsetRule {
        OffsetRule::Minutes(EVENT_LENGTHS_MINUTES)
    }

    fn fixtures(&self, now: DateTime<Utc>) -> Vec<OwnerFixture> {
        let at = |days: i64, hours: i64| SeedTime::At(now + Duration::days(days) + Duration::hours(hours));
        let alice = "alice.smith@bizmail.co";
        let bob = "bob.jones@bizmail.co";
        vec![
            OwnerFixture {
                identity: fixture_identity(alice, "Alice", "Smith"),
                seed: OwnerSeed::new()
                    .attr("last_calendar_sync", iso_seconds(now - Duration::minutes(30)))
                    .container(
                        calendar_seed("cal_1", "Personal Calendar (Alice)", "America/New_York")
                            .item(
                                fixture_event("event_1", "Morning Run", "Central Park", "Daily 5k run.")
                                    .created(at(1, 7))
                                    .modified(at(1, 8))
                                    .reference(attendees([alice])),
                            )
                            .item(
                                fixture_event("event_2", "Doctor's Appointment", "Medical Clinic", "Annual check-up.")
                                    .created(at(3, 14))
                                    .reference(attendees([alice])),
                            ),
                    )
                    .container(
                        calendar_seed("cal_2", "Work Calendar (Alice)", "America/Los_Angeles").item(
                            fixture_event("event_3", "Team Meeting", "Conference Room A", "Weekly sync-up.")
                                .created(at(2, 10))
                                .modified(at(2, 11))
                                .reference(attendees([alice, bob])),
                        ),
                    ),
            },
            OwnerFixture {
                identity: fixture_identity(bob, "Bob", "Jones"),
                seed: OwnerSeed::new()
                    .attr("last_calendar_sync", iso_seconds(now - Duration::minutes(90)))
                    .container(
                        calendar_seed("cal_3", "Bob's Personal Calendar", "America/Chicago").item(
                            fixture_event("event_4", "Client Call", "Virtual", "Discussion with new client.")
                                .created(at(4, 9))
                                .modified(at(4, 10))
                                .reference(attendees([bob, alice])),
                        ),
                    ),
            },
        ]
    }

    fn propose_identity(&self, synth: &mut Synthesizer, vocab: &VocabularySet) -> OwnerIdentity {
        email_identity(synth, vocab, 99)
    }

    fn synthesize_owner(&self, ctx: &mut OwnerContext<'_>) -> GenerationResult<OwnerSeed> {
        let vocab = ctx.vocab;
        let synth = &mut *ctx.synth;
        let email = ctx.identity.natural_key.as_str();
        let first = ctx.identity.attr_str("first_name");
        let user_zone = synth.pick(vocab.get("time_zones")).to_string();

        let mut seed = OwnerSeed::new().attr(
            "last_calendar_sync",
            iso_seconds(synth.minutes_ago(5, 60 * 24)),
        );

        for calendar_index in 0..synth.count(ctx.profile.containers) {
            let label = synth.pick(vocab.get("calendar_labels"));
            let mut summary = format!("{first}'s {label} Calendar");
            if calendar_index > 0 {
                summary.push_str(&format!(" ({})", calendar_index + 1));
            }
            let zone = if synth.chance(0.3) {
                synth.pick(vocab.get("time_zones")).to_string()
            } else {
                user_zone.clone()
            };
            let mut calendar = calendar_seed(&format!("cal_{calendar_index}"), &summary, &zone);

            for event_index in 0..synth.count(ctx.profile.items) {
                let mut guests = vec![email.to_string()];
                for _ in 0..synth.count(ctx.profile.peers) {
                    if synth.chance(0.7) && !ctx.known_owners.is_empty() {
                        if let Some(peer) = synth.choose(ctx.known_owners) {
                            guests.push(peer.natural_key.clone());
                        }
                    } else {
                        guests.push(stranger_email(synth, vocab));
                    }
                }
                let description = if synth.chance(0.7) {
                    Value::from(synth.pick(vocab.get("event_descriptions")))
                } else {
                    Value::Null
                };
                calendar = calendar.item(
                    ItemSeed::new(format!("event_{event_index}"))
                        .attr("summary", synth.pick(vocab.get("event_summaries")))
                        .attr("location", synth.pick(vocab.get("event_locations")))
                        .attr("description", description)
                        .attr(
                            "status",
                            synth.choose(EVENT_STATUSES).copied().unwrap_or("confirmed"),
                        )
                        .reference(attendees(guests)),
                );
            }
            seed = seed.container(calendar);
        }
        Ok(seed)
    }

    fn render_owner(&self, owner: &Owner) -> Value {
        let mut calendars = Map::new();
        let mut events = Map::new();
        for calendar in &owner.containers {
            let zone = calendar
                .attributes
                .get("timeZone")
                .cloned()
                .unwrap_or_else(|| Value::from(DEFAULT_TIME_ZONE));
            let mut rendered = calendar.attributes.clone();
            rendered.insert("id".to_string(), Value::from(calendar.id.to_string()));
            rendered.insert("event_count".to_string(), Value::from(calendar.aggregates.item_count));
            calendars.insert(calendar.id.to_string(), Value::Object(rendered));

            let mut calendar_events = Map::new();
            for event in calendar.items() {
                let mut rendered = event.attributes.clone();
                rendered.insert("id".to_string(), Value::from(event.id.to_string()));
                rendered.insert("calendar_id".to_string(), Value::from(calendar.id.to_string()));
                rendered.insert(
                    "start".to_string(),
                    json!({ "dateTime": iso_seconds(event.created_at), "timeZone": zone }),
                );
                rendered.insert(
                    "end".to_string(),
                    json!({ "dateTime": iso_seconds(event.modified_at), "timeZone": zone }),
                );
                rendered.insert("attendees".to_string(), ref_list(&event.references, "attendees"));
                calendar_events.insert(event.id.to_string(), Value::Object(rendered));
            }
            events.insert(calendar.id.to_string(), Value::Object(calendar_events));
        }

        let preferred_zone = owner
            .containers
            .first()
            .and_then(|calendar| calendar.attributes.get("timeZone").cloned())
            .unwrap_or_else(|| Value::from(DEFAULT_TIME_ZONE));

        let mut rendered = owner.attributes.clone();
        rendered.insert(
            "calendar_data".to_string(),
            json!({ "calendars": Value::Object(calendars), "events": Value::Object(events) }),
        );
        rendered.insert("preferred_timezone".to_string(), preferred_zone);
        rendered.insert("calendar_count".to_string(), Value::from(owner.aggregates.container_count));
        rendered.insert("event_count".to_string(), Value::from(owner.aggregates.item_count));
        rendered.insert(
            "last_event_activity".to_string(),
            Value::from(iso_seconds(owner.aggregates.last_activity)),
        );
        Value::Object(rendered)
    }

    fn reference_fields(&self) -> &'static [&'static str] {
        &["attendees", "calendar_id"]
    }
}

fn calendar_seed(key: &str, summary: &str, zone: &str) -> ContainerSeed {
    ContainerSeed::new(key)
        .attr("summary", summary)
        .attr("timeZone", zone)
}

fn fixture_event(key: &str, summary: &str, location: &str, description: &str) -> ItemSeed {
    ItemSeed::new(key)
        .attr("summary", summary)
        .attr("location", location)
        .attr("description", description)
        .attr("status", "confirmed")
}

/// Attendees keep display order; outside guests become placeholders and
/// the organizer appears once.
fn attendees<I, S>(keys: I) -> RefSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RefSpec::ordered("attendees", RefScope::Owners, keys).with_placeholders()
}

#[cfg(test)]
mod tests {
    use super::CalendarBackend;
    use crate::backends::Backend;
    use crate::config::RunConfig;
    use crate::engine::generate;
    use crate::model::graph::refs;
    use chrono::{DateTime, Utc};

    fn config(owners: u32) -> RunConfig {
        RunConfig {
            seed: Some(21),
            reference_time: Some(
                DateTime::parse_from_rfc3339("2025-02-01T08:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            owners,
            ..RunConfig::default()
        }
    }

    #[test]
    fn events_end_after_they_start() {
        let outcome = generate(&CalendarBackend, &config(12), None).unwrap();
        for owner in &outcome.state.owners {
            for event in owner.items() {
                assert!(event.created_at < event.modified_at);
                let minutes = (event.modified_at - event.created_at).num_minutes();
                assert!([30, 60, 90, 120].contains(&minutes), "minutes={minutes}");
            }
        }
    }

    #[test]
    fn organizer_is_first_attendee_once() {
        let outcome = generate(&CalendarBackend, &config(12), None).unwrap();
        for owner in &outcome.state.owners {
            for event in owner.items() {
                let attendees = refs(&event.references, "attendees");
                assert_eq!(attendees[0].id(), Some(owner.id));
                let own = attendees.iter().filter(|a| a.id() == Some(owner.id)).count();
                assert_eq!(own, 1);
            }
        }
    }

    #[test]
    fn fixture_forward_attendee_becomes_placeholder() {
        let outcome = generate(&CalendarBackend, &config(2), None).unwrap();
        let alice = outcome.state.owner_by_key("alice.smith@bizmail.co").unwrap();
        let bob = outcome.state.owner_by_key("bob.jones@bizmail.co").unwrap();

        let team_meeting = alice.items().find(|e| e.key == "event_3").unwrap();
        let attendees = refs(&team_meeting.references, "attendees");
        assert_eq!(attendees.len(), 2);
        assert!(attendees[1].is_placeholder());

        let client_call = bob.items().find(|e| e.key == "event_4").unwrap();
        let attendees = refs(&client_call.references, "attendees");
        assert_eq!(attendees[1].id(), Some(alice.id));
    }

    #[test]
    fn preferred_zone_comes_from_first_calendar() {
        let outcome = generate(&CalendarBackend, &config(2), None).unwrap();
        let alice = outcome.state.owner_by_key("alice.smith@bizmail.co").unwrap();
        let rendered = CalendarBackend.render_owner(alice);
        assert_eq!(rendered["preferred_timezone"], "America/New_York");
        assert_eq!(rendered["event_count"], 3);
        assert_eq!(rendered["calendar_count"], 2);
    }
}
