//! Helpers shared by the adapters.

use crate::config::CountRange;
use crate::identity::EntityId;
use crate::model::graph::{first_ref, refs, RefFields};
use crate::model::seed::OwnerIdentity;
use crate::synth::Synthesizer;
use crate::vocab::VocabularySet;
use serde_json::{Map, Value};

/// `attributes` plus an `id` field.
pub fn with_id(id: EntityId, attributes: &Map<String, Value>) -> Value {
    let mut object = attributes.clone();
    object.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(object)
}

/// First reference of `field` as a string, or `null`.
pub fn single_ref(fields: &RefFields, field: &str) -> Value {
    first_ref(fields, field)
        .map(|target| Value::String(target.to_string()))
        .unwrap_or(Value::Null)
}

/// Every reference of `field` as an array of strings.
pub fn ref_list(fields: &RefFields, field: &str) -> Value {
    Value::Array(
        refs(fields, field)
            .iter()
            .map(|target| Value::String(target.to_string()))
            .collect(),
    )
}

/// `first.last<n>@domain` identity from the shared name lists.
///
/// The email is the natural key; names and email become owner attributes.
pub fn email_identity(
    synth: &mut Synthesizer,
    vocab: &VocabularySet,
    suffix_max: i64,
) -> OwnerIdentity {
    let first = synth.pick(vocab.get("first_names")).to_string();
    let last = synth.pick(vocab.get("last_names")).to_string();
    let suffix = synth.int(1, suffix_max);
    let domain = synth.pick(vocab.get("email_domains"));
    let email = format!(
        "{}.{}{suffix}@{domain}",
        first.to_lowercase(),
        last.to_lowercase()
    );
    OwnerIdentity::new(email.clone())
        .with_attr("first_name", first)
        .with_attr("last_name", last)
        .with_attr("email", email)
}

/// Identity with an explicit email natural key, for fixtures.
pub fn fixture_identity(email: &str, first: &str, last: &str) -> OwnerIdentity {
    OwnerIdentity::new(email)
        .with_attr("first_name", first)
        .with_attr("last_name", last)
        .with_attr("email", email)
}

/// Natural keys of up to `range` distinct earlier owners.
pub fn peer_keys(
    synth: &mut Synthesizer,
    known_owners: &[OwnerIdentity],
    range: CountRange,
) -> Vec<String> {
    let wanted = synth.count(range).min(known_owners.len());
    let keys: Vec<String> = known_owners
        .iter()
        .map(|owner| owner.natural_key.clone())
        .collect();
    synth
        .sample(&keys, wanted)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// An address that belongs to nobody in the run.
pub fn stranger_email(synth: &mut Synthesizer, vocab: &VocabularySet) -> String {
    let first = synth.pick(vocab.get("first_names")).to_lowercase();
    let last = synth.pick(vocab.get("last_names")).to_lowercase();
    let suffix = synth.int(1000, 9999);
    let domain = synth.pick(vocab.get("email_domains"));
    format!("{first}.{last}{suffix}@{domain}")
}

/// Display name `First Last` from identity attributes.
pub fn display_name(identity: &OwnerIdentity) -> String {
    format!(
        "{} {}",
        identity.attr_str("first_name"),
        identity.attr_str("last_name")
    )
}

#[cfg(test)]
mod tests {
    use super::{email_identity, peer_keys};
    use crate::config::CountRange;
    use crate::model::seed::OwnerIdentity;
    use crate::synth::Synthesizer;
    use crate::vocab::people;
    use chrono::Utc;

    #[test]
    fn email_identity_is_lowercase_and_keyed_by_email() {
        let mut synth = Synthesizer::seeded(Some(1), Utc::now());
        let vocab = people(&["example.com"]);
        let identity = email_identity(&mut synth, &vocab, 99);
        assert!(identity.natural_key.ends_with("@example.com"));
        assert_eq!(identity.natural_key, identity.natural_key.to_lowercase());
        assert_eq!(identity.attr_str("email"), identity.natural_key);
    }

    #[test]
    fn peer_keys_never_exceed_known_owners() {
        let mut synth = Synthesizer::seeded(Some(2), Utc::now());
        let known = vec![OwnerIdentity::new("a"), OwnerIdentity::new("b")];
        let keys = peer_keys(&mut synth, &known, CountRange::exactly(5));
        assert_eq!(keys.len(), 2);
        assert!(peer_keys(&mut synth, &[], CountRange::exactly(3)).is_empty());
    }
}
