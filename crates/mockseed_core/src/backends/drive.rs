//! File storage service: a folder tree per user plus files.
//!
//! # Invariants
//! - Every user has a `root` container; folder and file parents that do
//!   not resolve fall back to it.
//! - `storage_quota.used` is the sum of file sizes.

use crate::backends::common::{fixture_identity, email_identity, peer_keys, ref_list, single_ref};
use crate::backends::{Backend, OwnerContext};
use crate::config::{CountRange, GenerationProfile, TimeWindow};
use crate::error::GenerationResult;
use crate::model::graph::Owner;
use crate::model::reference::{RefScope, RefSpec};
use crate::model::seed::{ContainerSeed, ItemSeed, OwnerFixture, OwnerIdentity, OwnerSeed};
use crate::synth::time::unix_seconds;
use crate::synth::{OffsetRule, Synthesizer};
use crate::vocab::{people, VocabularyRequirement, VocabularySet};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};

pub const ROOT_KEY: &str = "root";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const GIB: u64 = 1024 * 1024 * 1024;
const QUOTA_TIERS_GIB: &[u64] = &[50, 100, 200, 500];

/// `(kind, extension, mime type)`; `kind` names the file stem vocabulary.
const FILE_KINDS: &[(&str, &str, &str)] = &[
    (
        "document",
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "spreadsheet",
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (
        "presentation",
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("pdf", "pdf", "application/pdf"),
    ("image", "jpeg", "image/jpeg"),
    ("diagram", "png", "image/png"),
    ("code", "py", "text/x-python"),
    ("script", "js", "application/javascript"),
    ("text", "txt", "text/plain"),
];

pub struct DriveBackend;

impl Backend for DriveBackend {
    fn name(&self) -> &'static str {
        "drive"
    }

    fn default_profile(&self) -> GenerationProfile {
        GenerationProfile {
            containers: CountRange::new(2, 8),
            items: CountRange::new(5, 50),
            peers: CountRange::new(0, 2),
            window: TimeWindow::past(7, 365),
        }
    }

    fn builtin_vocabulary(&self) -> VocabularySet {
        people(&[
            "cloudrive.com",
            "syncspace.net",
            "datahub.org",
            "filevault.co",
            "driveplus.app",
        ])
        .with_list(
            "folder_names",
            &[
                "Projects",
                "Documents",
                "Photos",
                "Work",
                "Personal",
                "Archive",
                "Shared with Me",
                "Client Data",
            ],
        )
        .with_list("document_stems", &["Report", "Minutes", "Proposal", "Contract", "Draft"])
        .with_list(
            "spreadsheet_stems",
            &["Budget", "Tracker", "Data Analysis", "Invoice", "Inventory"],
        )
        .with_list(
            "presentation_stems",
            &["Quarterly Review", "Pitch Deck", "Training", "Strategy"],
        )
        .with_list("pdf_stems", &["Manual", "Ebook", "Whitepaper", "Brochure"])
        .with_list("image_stems", &["Photo", "Screenshot", "Design"])
        .with_list("diagram_stems", &["Diagram", "Logo", "Icon"])
        .with_list("code_stems", &["script", "model"])
        .with_list("script_stems", &["frontend", "backend"])
        .with_list("text_stems", &["Notes", "Log", "Readme"])
        .with_list(
            "file_descriptions",
            &[
                "Important internal document.",
                "Shared with client for review.",
                "Draft for feedback.",
                "Final version, do not modify.",
                "Contains sensitive financial data.",
                "Marketing collateral for new product.",
                "Team brainstorming session notes.",
                "Automatically generated report.",
                "Legal agreement terms and conditions.",
                "Personal notes on a project.",
            ],
        )
    }

    fn required_vocabularies(&self) -> Vec<VocabularyRequirement> {
        vec![
            VocabularyRequirement::new("drive owner", "first_names"),
            VocabularyRequirement::new("drive owner", "last_names"),
            VocabularyRequirement::new("drive owner", "email_domains"),
            VocabularyRequirement::new("folder", "folder_names"),
            VocabularyRequirement::new("file", "document_stems"),
            VocabularyRequirement::new("file", "spreadsheet_stems"),
            VocabularyRequirement::new("file", "presentation_stems"),
            VocabularyRequirement::new("file", "pdf_stems"),
            VocabularyRequirement::new("file", "image_stems"),
            VocabularyRequirement::new("file", "diagram_stems"),
            VocabularyRequirement::new("file", "code_stems"),
            VocabularyRequirement::new("file", "script_stems"),
            VocabularyRequirement::new("file", "text_stems"),
            VocabularyRequirement::new("file", "file_descriptions"),
        ]
    }

    fn identity_vocabularies(&self) -> Vec<&'static str> {
        vec!["first_names", "last_names", "email_domains"]
    }

    fn modification_offset(&self) -> OffsetRule {
        OffsetRule::Seconds {
            min: 60,
            max: 86_400 * 30,
        }
    }

    fn well_known_keys(&self) -> &'static [&'static str] {
        &[ROOT_KEY]
    }

    fn fixtures(&self, now: DateTime<Utc>) -> Vec<OwnerFixture> {
        let alice = "alice.smith@cloudrive.com";
        let bob = "bob.jones@cloudrive.com";
        let finance = ContainerSeed::new("folder_finance_reports")
            .attr("name", "Finance Reports")
            .attr("createdTime", unix_seconds(now - Duration::days(60)))
            .attr("modifiedTime", unix_seconds(now - Duration::days(10)))
            .attr("starred", false)
            .parent(folder_parent(ROOT_KEY));

        vec![
            OwnerFixture {
                identity: fixture_identity(alice, "Alice", "Smith"),
                seed: OwnerSeed::new()
                    .attr("storage_total_bytes", 100 * GIB)
                    .container(
                        root_folder()
                            .item(
                                fixture_file("file_alice_project_plan", "Project_Plan_Q3.docx", 0, alice, ROOT_KEY)
                                    .size(5 * 1024 * 1024)
                                    .attr("starred", true)
                                    .attr("shared", true)
                                    .attr("description", "Master plan for Q3 project initiatives."),
                            )
                            // Points at the folder's display id rather than
                            // its key, so it lands in root.
                            .item(
                                fixture_file("file_alice_budget_sheet", "Annual_Budget_2025.xlsx", 1, alice, "Finance_Reports")
                                    .size(2 * 1024 * 1024),
                            ),
                    )
                    .container(finance),
            },
            OwnerFixture {
                identity: fixture_identity(bob, "Bob", "Jones"),
                seed: OwnerSeed::new()
                    .attr("storage_total_bytes", 50 * GIB)
                    .container(
                        root_folder()
                            .item(
                                fixture_file("file_bob_presentation", "Q2_Results_Presentation.pptx", 2, bob, ROOT_KEY)
                                    .size(10 * 1024 * 1024)
                                    .attr("shared", true),
                            )
                            .item(
                                fixture_file("file_bob_meeting_notes", "Meeting_Notes_ProjectX.txt", 8, bob, ROOT_KEY)
                                    .size(50 * 1024)
                                    .attr("trashed", true)
                                    .attr("description", "Notes from the Project X kick-off meeting."),
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
        let email = ctx.identity.natural_key.clone();
        let now_ts = unix_seconds(synth.now());

        let tier = synth.choose(QUOTA_TIERS_GIB).copied().unwrap_or(100);
        let mut folders = vec![root_folder()];
        let mut folder_keys = vec![ROOT_KEY.to_string()];

        for index in 0..synth.count(ctx.profile.containers) {
            let mut name = synth.pick(vocab.get("folder_names")).to_string();
            if index > 0 {
                name.push_str(&format!("_{}", synth.int(1, 9)));
            }
            let created = unix_seconds(synth.days_ago(1, 730));
            let modified = synth.int(created, now_ts);
            let description = if synth.chance(0.5) {
                Value::from(format!("Folder for {name}."))
            } else {
                Value::Null
            };
            let parent = synth
                .choose(&folder_keys)
                .cloned()
                .unwrap_or_else(|| ROOT_KEY.to_string());
            let key = format!("folder_{index}");
            folders.push(
                ContainerSeed::new(key.clone())
                    .attr("name", name)
                    .attr("createdTime", created)
                    .attr("modifiedTime", modified)
                    .attr("starred", synth.chance(0.1))
                    .attr("description", description)
                    .parent(folder_parent(&parent)),
            );
            folder_keys.push(key);
        }

        for index in 0..synth.count(ctx.profile.items) {
            let (kind, extension, mime) = synth.choose(FILE_KINDS).copied().unwrap_or(FILE_KINDS[8]);
            let stem = synth.pick(vocab.get(&format!("{kind}_stems")));
            let name = format!("{stem}_{}.{extension}", synth.int(100, 999));

            let mut owners = vec![email.clone()];
            owners.extend(peer_keys(synth, ctx.known_owners, ctx.profile.peers));
            let viewer = synth.choose(&owners).cloned();
            let description = if synth.chance(0.6) {
                Value::from(synth.pick(vocab.get("file_descriptions")))
            } else {
                Value::Null
            };

            let slot = synth.int(0, folder_keys.len() as i64 - 1) as usize;
            let file = ItemSeed::new(format!("file_{index}"))
                .size(synth.int(10 * 1024, 100 * 1024 * 1024) as u64)
                .attr("name", name)
                .attr("mimeType", mime)
                .attr("starred", synth.chance(0.15))
                .attr("trashed", synth.chance(0.05))
                .attr("shared", synth.chance(0.25))
                .attr("description", description)
                .attr("version", synth.int(1, 10))
                .attr("viewedByMeTime", now_ts - synth.int(60, 86_400 * 5))
                .reference(file_parent(&folder_keys[slot]))
                .reference(RefSpec::ordered("owners", RefScope::Owners, owners))
                .reference(RefSpec::single("lastViewingUser", RefScope::Owners, viewer));
            folders[slot].items.push(file);
        }

        let mut seed = OwnerSeed::new().attr("storage_total_bytes", tier * GIB);
        seed.containers = folders;
        Ok(seed)
    }

    fn render_owner(&self, owner: &Owner) -> Value {
        let mut files = Map::new();
        let mut folder_count = 0usize;
        for folder in &owner.containers {
            let is_root = folder.key == ROOT_KEY;
            if !is_root {
                folder_count += 1;
            }
            let mut rendered = folder.attributes.clone();
            rendered.insert("id".to_string(), Value::from(folder.id.to_string()));
            rendered.insert("mimeType".to_string(), Value::from(FOLDER_MIME));
            rendered.insert("size".to_string(), Value::from(0));
            rendered.insert(
                "parents".to_string(),
                Value::Array(
                    folder
                        .parent
                        .iter()
                        .map(|parent| Value::from(parent.to_string()))
                        .collect(),
                ),
            );
            rendered.insert("owners".to_string(), json!([owner.id.to_string()]));
            files.insert(folder.id.to_string(), Value::Object(rendered));

            for file in folder.items() {
                let mut rendered = file.attributes.clone();
                rendered.insert("id".to_string(), Value::from(file.id.to_string()));
                rendered.insert("size".to_string(), Value::from(file.size_bytes));
                rendered.insert("createdTime".to_string(), Value::from(unix_seconds(file.created_at)));
                rendered.insert("modifiedTime".to_string(), Value::from(unix_seconds(file.modified_at)));
                rendered.insert("parents".to_string(), ref_list(&file.references, "parents"));
                rendered.insert("owners".to_string(), ref_list(&file.references, "owners"));
                rendered.insert(
                    "lastViewingUser".to_string(),
                    single_ref(&file.references, "lastViewingUser"),
                );
                files.insert(file.id.to_string(), Value::Object(rendered));
            }
        }

        let total = owner
            .attributes
            .get("storage_total_bytes")
            .cloned()
            .unwrap_or_else(|| Value::from(100 * GIB));
        let mut rendered = Map::new();
        for field in ["first_name", "last_name", "email"] {
            if let Some(value) = owner.attributes.get(field) {
                rendered.insert(field.to_string(), value.clone());
            }
        }
        rendered.insert(
            "drive_data".to_string(),
            json!({
                "user_info": {
                    "emailAddress": owner.key,
                    "name": format!(
                        "{} {}",
                        owner.attributes.get("first_name").and_then(Value::as_str).unwrap_or(""),
                        owner.attributes.get("last_name").and_then(Value::as_str).unwrap_or("")
                    ),
                    "storage_quota": { "total": total, "used": owner.aggregates.storage_bytes },
                },
                "files": Value::Object(files),
            }),
        );
        rendered.insert(
            "drive_last_activity".to_string(),
            Value::from(unix_seconds(owner.aggregates.last_activity)),
        );
        rendered.insert("drive_folder_count".to_string(), Value::from(folder_count));
        rendered.insert("drive_file_count".to_string(), Value::from(owner.aggregates.item_count));
        Value::Object(rendered)
    }

    fn reference_fields(&self) -> &'static [&'static str] {
        &["parents", "owners", "lastViewingUser"]
    }
}

fn root_folder() -> ContainerSeed {
    ContainerSeed::new(ROOT_KEY).attr("name", "My Drive")
}

fn folder_parent(key: &str) -> RefSpec {
    RefSpec::single("parent", RefScope::OwnerContainers, Some(key)).with_fallback(ROOT_KEY)
}

fn file_parent(key: &str) -> RefSpec {
    RefSpec::single("parents", RefScope::OwnerContainers, Some(key)).with_fallback(ROOT_KEY)
}

fn fixture_file(key: &str, name: &str, kind: usize, owner: &str, parent: &str) -> ItemSeed {
    let (_, _, mime) = FILE_KINDS[kind];
    ItemSeed::new(key)
        .attr("name", name)
        .attr("mimeType", mime)
        .attr("starred", false)
        .attr("trashed", false)
        .attr("shared", false)
        .attr("version", 1)
        .reference(file_parent(parent))
        .reference(RefSpec::ordered("owners", RefScope::Owners, [owner]))
        .reference(RefSpec::single("lastViewingUser", RefScope::Owners, Some(owner)))
}

#[cfg(test)]
mod tests {
    use super::{DriveBackend, ROOT_KEY};
    use crate::backends::Backend;
    use crate::config::RunConfig;
    use crate::engine::generate;
    use crate::model::graph::first_ref;
    use crate::model::reference::Ref;
    use chrono::{DateTime, Utc};

    fn config(owners: u32) -> RunConfig {
        RunConfig {
            seed: Some(5),
            reference_time: Some(
                DateTime::parse_from_rfc3339("2025-03-10T12:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            owners,
            ..RunConfig::default()
        }
    }

    #[test]
    fn misnamed_fixture_parent_falls_back_to_root() {
        let outcome = generate(&DriveBackend, &config(2), None).unwrap();
        let alice = outcome.state.owner_by_key("alice.smith@cloudrive.com").unwrap();
        let root = alice.containers.iter().find(|c| c.key == ROOT_KEY).unwrap();
        let budget = alice
            .items()
            .find(|file| file.key == "file_alice_budget_sheet")
            .unwrap();
        assert_eq!(
            first_ref(&budget.references, "parents"),
            Some(&Ref::Allocated(root.id))
        );
        assert_eq!(outcome.report.count("unresolved_required_reference"), 1);
    }

    #[test]
    fn quota_used_matches_file_sizes() {
        let outcome = generate(&DriveBackend, &config(6), None).unwrap();
        for owner in &outcome.state.owners {
            let total: u64 = owner.items().map(|file| file.size_bytes).sum();
            let rendered = DriveBackend.render_owner(owner);
            assert_eq!(rendered["drive_data"]["user_info"]["storage_quota"]["used"], total);
            assert_eq!(
                rendered["drive_folder_count"],
                owner.containers.len() - 1
            );
        }
    }

    #[test]
    fn every_folder_but_root_has_a_parent() {
        let outcome = generate(&DriveBackend, &config(8), None).unwrap();
        for owner in &outcome.state.owners {
            for folder in &owner.containers {
                assert_eq!(folder.parent.is_none(), folder.key == ROOT_KEY, "{}", folder.key);
            }
        }
    }
}
