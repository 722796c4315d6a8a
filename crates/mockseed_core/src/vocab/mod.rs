//! Seed vocabularies.
//!
//! Named word lists consumed read-only by the synthesizer. Each backend
//! ships a built-in set; a YAML file may replace individual lists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Vocabulary loading errors.
#[derive(Debug)]
pub enum VocabularyError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_yaml::Error),
}

impl Display for VocabularyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read vocabulary `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid vocabulary file: {err}"),
        }
    }
}

impl Error for VocabularyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

/// A list an entity kind cannot be generated without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabularyRequirement {
    pub kind: &'static str,
    pub vocabulary: &'static str,
}

impl VocabularyRequirement {
    pub const fn new(kind: &'static str, vocabulary: &'static str) -> Self {
        Self { kind, vocabulary }
    }
}

/// Named seed lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VocabularySet {
    lists: BTreeMap<String, Vec<String>>,
}

impl VocabularySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`VocabularySet::insert`].
    pub fn with_list(mut self, name: &str, entries: &[&str]) -> Self {
        self.insert(name, entries.iter().map(|entry| entry.to_string()).collect());
        self
    }

    /// Replaces the list stored under `name`.
    pub fn insert(&mut self, name: &str, entries: Vec<String>) {
        self.lists.insert(name.to_string(), entries);
    }

    /// Returns the list under `name`, or an empty slice.
    pub fn get(&self, name: &str) -> &[String] {
        self.lists.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sorted list names.
    pub fn names(&self) -> Vec<&str> {
        self.lists.keys().map(String::as_str).collect()
    }

    /// Replaces every list present in `other`; lists it omits are kept.
    pub fn merge(&mut self, other: &VocabularySet) {
        for (name, entries) in &other.lists {
            self.lists.insert(name.clone(), entries.clone());
        }
    }

    /// Returns the first requirement whose list is missing or empty.
    pub fn first_unmet<'a>(
        &self,
        requirements: &'a [VocabularyRequirement],
    ) -> Option<&'a VocabularyRequirement> {
        requirements
            .iter()
            .find(|requirement| self.get(requirement.vocabulary).is_empty())
    }

    pub fn from_yaml_str(input: &str) -> Result<Self, VocabularyError> {
        serde_yaml::from_str(input).map_err(VocabularyError::Parse)
    }

    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| VocabularyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }
}

/// Given names shared by every person-centric backend.
pub const FIRST_NAMES: &[&str] = &[
    "Sophia", "Liam", "Olivia", "Noah", "Ava", "Jackson", "Isabella", "Aiden", "Mia", "Lucas",
    "Harper", "Ethan", "Evelyn", "Mason", "Abigail", "Caleb", "Charlotte", "Logan", "Amelia",
    "Michael", "Ella", "Jacob", "Aria", "Daniel", "Chloe", "Samuel", "Grace", "David", "Victoria",
    "Joseph", "Penelope", "Matthew", "Riley", "Benjamin", "Layla", "Andrew", "Lily", "Gabriel",
    "Natalie", "Christopher", "Hannah", "James", "Zoe", "Ryan", "Scarlett", "Nathan", "Addison",
    "Christian", "Aubrey", "Joshua",
];

/// Family names shared by every person-centric backend.
pub const LAST_NAMES: &[&str] = &[
    "Chen", "Kim", "Singh", "Lopez", "Garcia", "Nguyen", "Davis", "Jackson", "Harris", "White",
    "Moore", "Clark", "Lewis", "Baker", "Adams", "Hill", "Nelson", "Carter", "Mitchell",
    "Roberts", "Phillips", "Campbell", "Parker", "Evans", "Edwards", "Collins", "Stewart",
    "Morris", "Rogers", "Reed", "Cook", "Morgan", "Bell", "Murphy", "Bailey", "Rivera", "Cooper",
    "Richardson", "Cox", "Howard", "Ward", "Torres", "Peterson", "Gray", "Ramirez", "James",
    "Watson", "Brooks", "Kelly", "Sanders",
];

/// Starts a set holding the shared name lists plus `email_domains`.
pub fn people(email_domains: &[&str]) -> VocabularySet {
    VocabularySet::new()
        .with_list("first_names", FIRST_NAMES)
        .with_list("last_names", LAST_NAMES)
        .with_list("email_domains", email_domains)
}

#[cfg(test)]
mod tests {
    use super::{people, VocabularyRequirement, VocabularySet};

    #[test]
    fn merge_replaces_only_named_lists() {
        let mut base = people(&["example.com"]);
        let patch = VocabularySet::from_yaml_str("first_names: [Ada]\n").unwrap();
        base.merge(&patch);
        assert_eq!(base.get("first_names"), ["Ada".to_string()]);
        assert_eq!(base.get("email_domains"), ["example.com".to_string()]);
        assert!(!base.get("last_names").is_empty());
    }

    #[test]
    fn first_unmet_reports_missing_and_empty_lists() {
        let set = people(&[]);
        let requirements = [
            VocabularyRequirement::new("owner", "first_names"),
            VocabularyRequirement::new("owner", "email_domains"),
            VocabularyRequirement::new("event", "event_summaries"),
        ];
        let unmet = set.first_unmet(&requirements).unwrap();
        assert_eq!(unmet.vocabulary, "email_domains");

        let set = people(&["example.com"]);
        assert_eq!(
            set.first_unmet(&requirements).unwrap().vocabulary,
            "event_summaries"
        );
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert!(VocabularySet::from_yaml_str("first_names: 3").is_err());
    }
}
