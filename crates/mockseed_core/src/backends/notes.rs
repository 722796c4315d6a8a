//! Note-taking service.
//!
//! Users are keyed by a short alias; the email is a second key for the
//! same owner.

use crate::backends::common::ref_list;
use crate::backends::{Backend, OwnerContext};
use crate::config::{CountRange, GenerationProfile, TimeWindow};
use crate::error::GenerationResult;
use crate::model::graph::Owner;
use crate::model::reference::{RefScope, RefSpec};
use crate::model::seed::{ContainerSeed, ItemSeed, OwnerFixture, OwnerIdentity, OwnerSeed, SeedTime};
use crate::synth::time::iso_seconds;
use crate::synth::{OffsetRule, Synthesizer};
use crate::vocab::{people, VocabularyRequirement, VocabularySet};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

const NOTEBOOK_KEY: &str = "notes";
const REMINDER_STATUSES: &[&str] = &["active", "completed"];

pub struct NotesBackend;

impl Backend for NotesBackend {
    fn name(&self) -> &'static str {
        "notes"
    }

    fn default_profile(&self) -> GenerationProfile {
        GenerationProfile {
            containers: CountRange::exactly(1),
            items: CountRange::new(5, 50),
            peers: CountRange::new(0, 1),
            window: TimeWindow::past(7, 730),
        }
    }

    fn builtin_vocabulary(&self) -> VocabularySet {
        people(&[
            "noted.com",
            "quickjot.net",
            "mindscribe.org",
            "simplenotes.app",
            "ideahub.co",
        ])
        .with_list(
            "note_titles",
            &[
                "Meeting Recap",
                "Project X Updates",
                "To-Do List",
                "Daily Journal Entry",
                "Recipe Ideas",
                "Book Recommendations",
                "Travel Plans",
                "Shopping List",
                "Client Feedback",
                "Bug Report",
                "Feature Request",
                "Learning Notes",
                "Fitness Goals",
                "Home Renovation Ideas",
                "Financial Reminders",
            ],
        )
        .with_list(
            "note_contents",
            &[
                "Discussed Q3 strategy, action items include: finalize budget, assign roles, schedule next sync.",
                "User authentication flow revised. Need to implement OAuth2 for secure login. Test edge cases.",
                "Buy milk, eggs, bread. Call dry cleaning. Schedule dentist appointment for next month.",
                "Reflecting on today's challenges. Faced a difficult coding problem but eventually solved it.",
                "Ingredients for pasta primavera: zucchini, bell peppers, cherry tomatoes, basil, pasta, olive oil, garlic.",
                "Recommended reading: 'Clean Code' and 'The Pragmatic Programmer'.",
                "Trip to Japan: research flights to Tokyo, book ryokan in Kyoto, explore Hakone day trip options.",
                "Task list for tomorrow: finish report, reply to Sarah, prepare for client demo, review pull request #123.",
                "CSS styling issue on mobile. Elements overlapping. Consider using flexbox or grid.",
                "Learning about generators. They allow lazy evaluation, saving memory for large datasets.",
                "Garden update: tomatoes are thriving, basil needs pruning, planted new batch of lettuce.",
                "Morning routine: wake up, meditate for 10 min, light stretching, healthy breakfast.",
                "New marketing campaign: focus on visual content. Short video ads for social media platforms.",
                "Remember to renew passport by end of year. Check expiry date and required documents.",
            ],
        )
        .with_list(
            "note_tags",
            &[
                "work", "personal", "project", "ideas", "urgent", "todo", "finance", "health", "travel",
                "recipes", "meeting", "dev", "marketing", "learning", "home",
            ],
        )
        .with_list("note_colors", &["yellow", "blue", "green", "pink", "white", "purple"])
        .with_list("note_priorities", &["low", "medium", "high"])
    }

    fn required_vocabularies(&self) -> Vec<VocabularyRequirement> {
        vec![
            VocabularyRequirement::new("notes owner", "first_names"),
            VocabularyRequirement::new("notes owner", "last_names"),
            VocabularyRequirement::new("notes owner", "email_domains"),
            VocabularyRequirement::new("note", "note_titles"),
            VocabularyRequirement::new("note", "note_contents"),
            VocabularyRequirement::new("note", "note_tags"),
            VocabularyRequirement::new("note", "note_colors"),
            VocabularyRequirement::new("note", "note_priorities"),
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
        vec![
            OwnerFixture {
                identity: alias_identity("jdoe", "John", "Doe", "john.doe@noted.com"),
                seed: OwnerSeed::new().container(
                    ContainerSeed::new(NOTEBOOK_KEY)
                        .item(
                            fixture_note(
                                "0",
                                "Onboarding Checklist for New Devs",
                                "1. Set up dev environment. 2. Clone repositories. 3. Attend morning stand-up. 4. Review coding standards.",
                                &["work", "onboarding", "dev"],
                            )
                            .attr("pinned", true)
                            .attr("color", "yellow")
                            .attr("priority", "high"),
                        )
                        .item(fixture_note(
                            "1",
                            "Weekend Hike Gear List",
                            "Backpack, water bottles, trail mix, first-aid kit, comfortable boots, rain jacket.",
                            &["personal", "hiking", "weekend"],
                        ))
                        .item(fixture_note(
                            "2",
                            "Q3 Marketing Campaign Brainstorm",
                            "Focus on social media engagement. Explore short video ads. Partner with influencers in niche markets.",
                            &["work", "marketing", "ideas"],
                        )),
                ),
            },
            OwnerFixture {
                identity: alias_identity("msmith", "Maria", "Smith", "maria.smith@noted.com"),
                seed: OwnerSeed::new().container(
                    ContainerSeed::new(NOTEBOOK_KEY).item(
                        fixture_note(
                            "3",
                            "Grocery List",
                            "Milk, Eggs, Bread, Butter, Cheese, Apples, Bananas.",
                            &["personal", "shopping"],
                        )
                        .attr("pinned", true)
                        .attr("color", "blue")
                        .attr("priority", "medium")
                        .reference(shared_with(["jdoe"])),
                    ),
                ),
            },
        ]
    }

    fn propose_identity(&self, synth: &mut Synthesizer, vocab: &VocabularySet) -> OwnerIdentity {
        let first = synth.pick(vocab.get("first_names")).to_string();
        let last = synth.pick(vocab.get("last_names")).to_string();
        let email_suffix = synth.int(1, 99);
        let domain = synth.pick(vocab.get("email_domains"));
        let email = format!(
            "{}.{}{email_suffix}@{domain}",
            first.to_lowercase(),
            last.to_lowercase()
        );
        let alias = format!(
            "{}{}{}",
            first.to_lowercase(),
            last.to_lowercase(),
            synth.int(10, 99)
        );
        alias_identity(&alias, &first, &last, &email)
    }

    fn synthesize_owner(&self, ctx: &mut OwnerContext<'_>) -> GenerationResult<OwnerSeed> {
        let vocab = ctx.vocab;
        let synth = &mut *ctx.synth;
        let mut notebook = ContainerSeed::new(NOTEBOOK_KEY);

        for index in 0..synth.count(ctx.profile.items) {
            let tag_count = synth.int(1, 4) as usize;
            let tags: Vec<String> = synth
                .sample(vocab.get("note_tags"), tag_count)
                .into_iter()
                .map(str::to_string)
                .collect();
            let reminders = if synth.chance(0.2) {
                let due = synth.days_ahead(1, 30);
                let status = synth.choose(REMINDER_STATUSES).copied().unwrap_or("active");
                json!([{ "timestamp": iso_seconds(due), "status": status }])
            } else {
                json!([])
            };
            let mut note = ItemSeed::new(index.to_string())
                .attr(
                    "title",
                    format!("{} ({})", synth.pick(vocab.get("note_titles")), synth.int(1, 99)),
                )
                .attr("content", synth.pick(vocab.get("note_contents")))
                .attr("tags", tags)
                .attr("pinned", synth.chance(0.15))
                .attr("archived", synth.chance(0.1))
                .attr("color", synth.pick(vocab.get("note_colors")))
                .attr("priority", synth.pick(vocab.get("note_priorities")))
                .attr("reminders", reminders);
            if synth.chance(0.05) {
                if let Some(peer) = synth.choose(ctx.known_owners) {
                    note = note.reference(shared_with([peer.natural_key.as_str()]));
                }
            }
            notebook = notebook.item(note);
        }
        Ok(OwnerSeed::new().container(notebook))
    }

    fn render_owner(&self, owner: &Owner) -> Value {
        let mut notes = Map::new();
        for note in owner.items() {
            let mut rendered = note.attributes.clone();
            rendered.insert("id".to_string(), Value::from(note.id.to_string()));
            rendered.insert("user".to_string(), Value::from(owner.id.to_string()));
            rendered.insert("created_at".to_string(), Value::from(iso_seconds(note.created_at)));
            rendered.insert("updated_at".to_string(), Value::from(iso_seconds(note.modified_at)));
            rendered.insert("shared_with".to_string(), ref_list(&note.references, "shared_with"));
            notes.insert(note.id.to_string(), Value::Object(rendered));
        }

        let mut rendered = owner.attributes.clone();
        rendered.insert("note_data".to_string(), json!({ "notes": Value::Object(notes) }));
        rendered.insert("total_notes_count".to_string(), Value::from(owner.aggregates.item_count));
        rendered.insert(
            "last_note_activity".to_string(),
            Value::from(iso_seconds(owner.aggregates.last_activity)),
        );
        Value::Object(rendered)
    }

    fn reference_fields(&self) -> &'static [&'static str] {
        &["user", "shared_with"]
    }
}

fn alias_identity(alias: &str, first: &str, last: &str, email: &str) -> OwnerIdentity {
    OwnerIdentity::new(alias)
        .with_alias(email)
        .with_attr("first_name", first)
        .with_attr("last_name", last)
        .with_attr("email", email)
        .with_attr("alias", alias)
}

/// Seed timestamps are blank and get synthesized.
fn fixture_note(key: &str, title: &str, content: &str, tags: &[&str]) -> ItemSeed {
    ItemSeed::new(key)
        .created(SeedTime::raw(""))
        .modified(SeedTime::raw(""))
        .attr("title", title)
        .attr("content", content)
        .attr("tags", tags.to_vec())
        .attr("pinned", false)
        .attr("archived", false)
        .attr("color", "white")
        .attr("priority", "low")
        .attr("reminders", Value::Array(Vec::new()))
}

fn shared_with<I, S>(aliases: I) -> RefSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RefSpec::set("shared_with", RefScope::Owners, aliases).excluding_self()
}

#[cfg(test)]
mod tests {
    use super::NotesBackend;
    use crate::backends::Backend;
    use crate::config::RunConfig;
    use crate::engine::generate;
    use crate::model::graph::refs;
    use chrono::{DateTime, Utc};

    fn config(owners: u32) -> RunConfig {
        RunConfig {
            seed: Some(3),
            reference_time: Some(
                DateTime::parse_from_rfc3339("2025-05-20T09:30:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            owners,
            ..RunConfig::default()
        }
    }

    #[test]
    fn email_alias_resolves_to_the_same_owner() {
        let outcome = generate(&NotesBackend, &config(2), None).unwrap();
        let by_alias = outcome.state.owner_by_key("jdoe").unwrap();
        let by_email = outcome.state.owner_by_key("john.doe@noted.com").unwrap();
        assert_eq!(by_alias.id, by_email.id);
    }

    #[test]
    fn blank_fixture_timestamps_are_synthesized_silently() {
        let outcome = generate(&NotesBackend, &config(2), None).unwrap();
        let jdoe = outcome.state.owner_by_key("jdoe").unwrap();
        for note in jdoe.items() {
            assert!(note.created_at < note.modified_at);
            assert!(note.created_at < outcome.state.reference_time);
        }
        assert_eq!(outcome.report.count("malformed_seed_timestamp"), 0);
    }

    #[test]
    fn fixture_sharing_points_at_an_earlier_owner() {
        let outcome = generate(&NotesBackend, &config(2), None).unwrap();
        let jdoe = outcome.state.owner_by_key("jdoe").unwrap();
        let msmith = outcome.state.owner_by_key("msmith").unwrap();
        let grocery = msmith.items().next().unwrap();
        let shared = refs(&grocery.references, "shared_with");
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].id(), Some(jdoe.id));
    }

    #[test]
    fn rendered_notes_carry_owner_and_counts() {
        let outcome = generate(&NotesBackend, &config(6), None).unwrap();
        for owner in &outcome.state.owners {
            let rendered = NotesBackend.render_owner(owner);
            let notes = rendered["note_data"]["notes"].as_object().unwrap();
            assert_eq!(rendered["total_notes_count"], notes.len());
            for note in notes.values() {
                assert_eq!(note["user"], owner.id.to_string());
            }
        }
    }
}
