//! Video streaming service: a shared content library, accounts, profiles,
//! and per-profile watchlists.
//!
//! # Invariants
//! - Content entries are allocated once per run in `Catalog("content")`
//!   and keyed by their short code (`M001`, `S001`, ...).
//! - A watchlist entry whose title is not in the library keeps no
//!   `content_id`.

use crate::backends::common::{email_identity, fixture_identity, single_ref};
use crate::backends::{Backend, OwnerContext};
use crate::config::{CountRange, GenerationProfile, TimeWindow};
use crate::error::GenerationResult;
use crate::model::graph::Owner;
use crate::model::reference::{RefScope, RefSpec};
use crate::model::seed::{CatalogSeed, ContainerSeed, ItemSeed, OwnerFixture, OwnerIdentity, OwnerSeed};
use crate::synth::time::{date_only, iso_seconds};
use crate::synth::{OffsetRule, Synthesizer};
use crate::vocab::{people, VocabularyRequirement, VocabularySet};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub const CONTENT_CATALOG: &str = "content";
const EXTRA_MOVIES: usize = 100;
const EXTRA_SERIES: usize = 60;
const PLANS: &[&str] = &["basic", "standard", "premium"];
const MATURITY_LEVELS: &[&str] = &["kids", "teen", "adult"];
const AVATAR_BASE: &str = "https://cdn.moviestream.net/avatars";

pub struct StreamingBackend;

impl Backend for StreamingBackend {
    fn name(&self) -> &'static str {
        "streaming"
    }

    fn default_profile(&self) -> GenerationProfile {
        GenerationProfile {
            containers: CountRange::new(1, 4),
            items: CountRange::new(1, 15),
            peers: CountRange::exactly(0),
            window: TimeWindow::past(1, 365),
        }
    }

    fn builtin_vocabulary(&self) -> VocabularySet {
        people(&["moviestream.net", "bingebox.tv", "couchmail.com", "popcorn.app"])
            .with_list(
                "movie_titles",
                &[
                    "The Matrix",
                    "Inception",
                    "Interstellar",
                    "Parasite",
                    "Whiplash",
                    "The Dark Knight",
                    "Fight Club",
                    "Forrest Gump",
                    "Gladiator",
                    "Se7en",
                ],
            )
            .with_list(
                "series_titles",
                &[
                    "Breaking Bad",
                    "Stranger Things",
                    "The Crown",
                    "Money Heist",
                    "The Witcher",
                    "Ozark",
                    "Dark",
                    "Narcos",
                    "Friends",
                    "The Office",
                ],
            )
            .with_list(
                "title_adjectives",
                &["Silent", "Lost", "Hidden", "Golden", "Scarlet", "Shattered", "Burning", "Forgotten"],
            )
            .with_list(
                "title_nouns",
                &["Dreams", "River", "Empire", "Gate", "Legacy", "Shadow", "Secret", "Galaxy"],
            )
            .with_list(
                "genres",
                &["Drama", "Action", "Comedy", "Thriller", "Sci-Fi", "Romance", "Fantasy"],
            )
            .with_list("content_ratings", &["G", "PG", "PG-13", "R", "TV-MA", "TV-14"])
            .with_list("profile_names", &["Main", "Kids", "Guest", "Dad", "Mom", "Roommate"])
            .with_list("languages", &["en", "es", "fr", "de", "pt", "it", "nl"])
    }

    fn required_vocabularies(&self) -> Vec<VocabularyRequirement> {
        vec![
            VocabularyRequirement::new("streaming owner", "first_names"),
            VocabularyRequirement::new("streaming owner", "last_names"),
            VocabularyRequirement::new("streaming owner", "email_domains"),
            VocabularyRequirement::new("content", "movie_titles"),
            VocabularyRequirement::new("content", "series_titles"),
            VocabularyRequirement::new("content", "title_adjectives"),
            VocabularyRequirement::new("content", "title_nouns"),
            VocabularyRequirement::new("content", "genres"),
            VocabularyRequirement::new("content", "content_ratings"),
            VocabularyRequirement::new("profile", "profile_names"),
            VocabularyRequirement::new("profile", "languages"),
        ]
    }

    fn identity_vocabularies(&self) -> Vec<&'static str> {
        vec!["first_names", "last_names", "email_domains"]
    }

    fn modification_offset(&self) -> OffsetRule {
        OffsetRule::Seconds {
            min: 60,
            max: 86_400 * 14,
        }
    }

    fn catalog(&self, synth: &mut Synthesizer, vocab: &VocabularySet) -> Vec<CatalogSeed> {
        let mut entries = Vec::new();
        let movies = vocab.get("movie_titles");
        let series = vocab.get("series_titles");

        for (index, title) in movies.iter().enumerate() {
            entries.push(movie(synth, vocab, index + 1, title.clone(), (1990, 2024), (80, 180)));
        }
        for (index, title) in series.iter().enumerate() {
            entries.push(show(synth, vocab, index + 1, title.clone(), 7));
        }
        for index in movies.len() + 1..=movies.len() + EXTRA_MOVIES {
            let title = format!(
                "{} {}",
                synth.pick(vocab.get("title_adjectives")),
                synth.pick(vocab.get("title_nouns"))
            );
            entries.push(movie(synth, vocab, index, title, (1980, 2024), (75, 190)));
        }
        for index in series.len() + 1..=series.len() + EXTRA_SERIES {
            let title = format!("The {} Chronicles", synth.pick(vocab.get("title_nouns")));
            entries.push(show(synth, vocab, index, title, 10));
        }
        entries
    }

    fn fixtures(&self, _now: DateTime<Utc>) -> Vec<OwnerFixture> {
        vec![OwnerFixture {
            identity: fixture_identity("demo.viewer@moviestream.net", "Demo", "Viewer"),
            seed: OwnerSeed::new()
                .attr("plan", "premium")
                .container(
                    profile_seed("profile_main", "Main", "adult", "en", true)
                        .item(watch_entry("M001", 100, Some(5)))
                        .item(watch_entry("S002", 40, None))
                        // Retired title; the entry stays, its link does not.
                        .item(watch_entry("M999", 0, None)),
                )
                .container(
                    profile_seed("profile_kids", "Kids", "kids", "en", false)
                        .item(watch_entry("S009", 10, Some(4))),
                ),
        }]
    }

    fn propose_identity(&self, synth: &mut Synthesizer, vocab: &VocabularySet) -> OwnerIdentity {
        email_identity(synth, vocab, 99)
    }

    fn synthesize_owner(&self, ctx: &mut OwnerContext<'_>) -> GenerationResult<OwnerSeed> {
        let vocab = ctx.vocab;
        let synth = &mut *ctx.synth;
        let plan = synth.choose(PLANS).copied().unwrap_or("basic");
        let mut seed = OwnerSeed::new().attr("plan", plan);

        for index in 0..synth.count(ctx.profile.containers) {
            let name = if index == 0 {
                "Main".to_string()
            } else {
                synth.pick(vocab.get("profile_names")).to_string()
            };
            let maturity = synth.choose(MATURITY_LEVELS).copied().unwrap_or("adult");
            let language = synth.pick(vocab.get("languages"));
            let mut profile = profile_seed(&format!("profile_{index}"), &name, maturity, language, synth.chance(0.8));

            let wanted = synth.count(ctx.profile.items);
            for code in synth.sample(ctx.catalog_keys, wanted) {
                let progress = synth.int(0, 100);
                let rating = if synth.chance(0.5) { Some(synth.int(1, 5)) } else { None };
                profile = profile.item(watch_entry(code, progress, rating));
            }
            seed = seed.container(profile);
        }
        Ok(seed)
    }

    fn render_owner(&self, owner: &Owner) -> Value {
        let mut profiles = Map::new();
        for profile in &owner.containers {
            let watchlist: Vec<Value> = profile
                .items()
                .iter()
                .map(|entry| {
                    let mut rendered = entry.attributes.clone();
                    rendered.insert("entry_id".to_string(), Value::from(entry.id.to_string()));
                    rendered.insert("content_id".to_string(), single_ref(&entry.references, "content_id"));
                    rendered.insert("added_at".to_string(), Value::from(iso_seconds(entry.created_at)));
                    rendered.insert("last_watched".to_string(), Value::from(iso_seconds(entry.modified_at)));
                    Value::Object(rendered)
                })
                .collect();

            let mut rendered = profile.attributes.clone();
            let id = profile.id.to_string();
            rendered.insert("id".to_string(), Value::from(id.clone()));
            rendered.insert("avatar".to_string(), Value::from(format!("{AVATAR_BASE}/{id}.png")));
            rendered.insert("watchlist".to_string(), Value::Array(watchlist));
            rendered.insert("watchlist_count".to_string(), Value::from(profile.aggregates.item_count));
            profiles.insert(id, Value::Object(rendered));
        }

        let mut rendered = owner.attributes.clone();
        rendered.insert("profiles".to_string(), Value::Object(profiles));
        rendered.insert("profile_count".to_string(), Value::from(owner.aggregates.container_count));
        rendered.insert("watchlist_count".to_string(), Value::from(owner.aggregates.item_count));
        rendered.insert(
            "last_activity".to_string(),
            Value::from(iso_seconds(owner.aggregates.last_activity)),
        );
        Value::Object(rendered)
    }

    fn reference_fields(&self) -> &'static [&'static str] {
        &["content_id"]
    }
}

fn genres(synth: &mut Synthesizer, vocab: &VocabularySet) -> Vec<String> {
    synth
        .sample(vocab.get("genres"), 2)
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn movie(
    synth: &mut Synthesizer,
    vocab: &VocabularySet,
    index: usize,
    title: String,
    years: (i64, i64),
    minutes: (i64, i64),
) -> CatalogSeed {
    CatalogSeed::new(CONTENT_CATALOG, format!("M{index:03}"))
        .attr("code", format!("M{index:03}"))
        .attr("title", title)
        .attr("type", "movie")
        .attr("year", synth.int(years.0, years.1))
        .attr("rating", synth.pick(vocab.get("content_ratings")))
        .attr("duration", synth.int(minutes.0, minutes.1))
        .attr("genre", genres(synth, vocab))
        .attr("released", date_only(synth.days_ago(0, 3650)))
}

fn show(synth: &mut Synthesizer, vocab: &VocabularySet, index: usize, title: String, max_seasons: i64) -> CatalogSeed {
    CatalogSeed::new(CONTENT_CATALOG, format!("S{index:03}"))
        .attr("code", format!("S{index:03}"))
        .attr("title", title)
        .attr("type", "series")
        .attr("year", synth.int(1990, 2024))
        .attr("rating", synth.pick(vocab.get("content_ratings")))
        .attr("seasons", synth.int(1, max_seasons))
        .attr("genre", genres(synth, vocab))
        .attr("released", date_only(synth.days_ago(0, 3650)))
}

fn profile_seed(key: &str, name: &str, maturity: &str, language: &str, autoplay: bool) -> ContainerSeed {
    ContainerSeed::new(key)
        .attr("name", name)
        .attr("maturity_level", maturity)
        .attr("language", language)
        .attr("autoplay", autoplay)
}

/// Watchlist entries are keyed by content code, so a title appears once
/// per profile.
fn watch_entry(code: &str, progress: i64, rating: Option<i64>) -> ItemSeed {
    ItemSeed::new(code)
        .attr("progress", progress)
        .attr("user_rating", rating.map_or(Value::Null, Value::from))
        .reference(RefSpec::single(
            "content_id",
            RefScope::Catalog(CONTENT_CATALOG),
            Some(code),
        ))
}

#[cfg(test)]
mod tests {
    use super::{StreamingBackend, CONTENT_CATALOG};
    use crate::backends::Backend;
    use crate::config::RunConfig;
    use crate::engine::generate;
    use crate::model::graph::first_ref;
    use chrono::{DateTime, Utc};
    use std::collections::HashSet;

    fn config(owners: u32) -> RunConfig {
        RunConfig {
            seed: Some(8),
            reference_time: Some(
                DateTime::parse_from_rfc3339("2025-07-04T20:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            owners,
            ..RunConfig::default()
        }
    }

    #[test]
    fn catalog_is_allocated_once_per_run() {
        let outcome = generate(&StreamingBackend, &config(5), None).unwrap();
        let content = &outcome.state.catalogs[CONTENT_CATALOG];
        assert_eq!(content.len(), 180);
        let codes: HashSet<_> = content.iter().map(|entry| entry.key.as_str()).collect();
        assert_eq!(codes.len(), content.len());
        assert!(codes.contains("M001") && codes.contains("S070") && codes.contains("M110"));
    }

    #[test]
    fn watchlist_links_into_the_catalog() {
        let outcome = generate(&StreamingBackend, &config(10), None).unwrap();
        let ids: HashSet<_> = outcome.state.catalogs[CONTENT_CATALOG]
            .iter()
            .map(|entry| entry.id)
            .collect();
        for owner in outcome.state.owners.iter().skip(1) {
            for entry in owner.items() {
                let target = first_ref(&entry.references, "content_id").unwrap();
                assert!(ids.contains(&target.id().unwrap()));
            }
        }
    }

    #[test]
    fn unknown_title_keeps_entry_without_link() {
        let outcome = generate(&StreamingBackend, &config(1), None).unwrap();
        let viewer = &outcome.state.owners[0];
        let retired = viewer.items().find(|entry| entry.key == "M999").unwrap();
        assert!(first_ref(&retired.references, "content_id").is_none());
        assert_eq!(outcome.report.count("dropped_reference"), 1);

        let rendered = StreamingBackend.render_owner(viewer);
        assert_eq!(rendered["watchlist_count"], 4);
        assert_eq!(rendered["profile_count"], 2);
    }
}
