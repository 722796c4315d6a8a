//! Fatal generation errors.
//!
//! Recoverable conditions never surface here; see `report::Recovery`.

use crate::audit::AuditError;
use crate::config::ConfigError;
use crate::identity::{BindingConflict, Scope};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Errors that abort a generation run.
#[derive(Debug)]
pub enum GenerationError {
    /// Natural-key regeneration exceeded its bound.
    CollisionExhausted {
        kind: String,
        vocabularies: Vec<String>,
        attempts: u32,
    },
    /// A required seed list has zero entries.
    EmptyVocabulary { kind: String, vocabulary: String },
    /// Two hand-written fixtures share a natural key.
    DuplicateFixtureKey { key: String },
    /// A backend produced the same temporary key twice in one scope.
    DuplicateSeedKey { scope: Scope, key: String },
    /// Run parameters failed validation.
    InvalidConfig(ConfigError),
    /// The assembled state violates an output invariant.
    Audit(AuditError),
}

impl Display for GenerationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CollisionExhausted {
                kind,
                vocabularies,
                attempts,
            } => write!(
                f,
                "could not generate a unique {kind} key after {attempts} attempts; vocabularies [{}] are too small for the requested volume",
                vocabularies.join(", ")
            ),
            Self::EmptyVocabulary { kind, vocabulary } => {
                write!(f, "vocabulary `{vocabulary}` required by {kind} is empty")
            }
            Self::DuplicateFixtureKey { key } => {
                write!(f, "fixture natural key `{key}` is used by more than one owner")
            }
            Self::DuplicateSeedKey { scope, key } => {
                write!(f, "temporary key `{key}` appears twice in scope {scope}")
            }
            Self::InvalidConfig(err) => write!(f, "{err}"),
            Self::Audit(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GenerationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidConfig(err) => Some(err),
            Self::Audit(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for GenerationError {
    fn from(value: ConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}

impl From<AuditError> for GenerationError {
    fn from(value: AuditError) -> Self {
        Self::Audit(value)
    }
}

impl From<BindingConflict> for GenerationError {
    fn from(value: BindingConflict) -> Self {
        Self::DuplicateSeedKey {
            scope: value.scope,
            key: value.key,
        }
    }
}
