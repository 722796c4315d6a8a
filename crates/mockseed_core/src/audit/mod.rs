//! Invariant audit for generated states and written documents.
//!
//! # Responsibility
//! - Check an assembled state before it is serialized.
//! - Re-check a written document's reference fields.
//!
//! # Invariants
//! - A state that passes `audit_state` has unique identifiers and owner
//!   keys, ordered item timestamps, and no dangling or natural-key
//!   references.

use crate::identity::EntityId;
use crate::model::graph::{GeneratedState, RefFields};
use crate::model::reference::Ref;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Allocated identifier or external placeholder.
static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(ext-)?[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid identifier regex")
});

/// First invariant violation found in a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    DuplicateIdentifier(EntityId),
    DuplicateOwnerKey(String),
    TimestampOrder { item: EntityId },
    DanglingReference { field: String, target: EntityId },
    UnregisteredPlaceholder { field: String, target: EntityId },
    UnknownWellKnown { field: String, value: String },
}

impl Display for AuditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateIdentifier(id) => write!(f, "identifier {id} issued twice"),
            Self::DuplicateOwnerKey(key) => write!(f, "owner key `{key}` used twice"),
            Self::TimestampOrder { item } => {
                write!(f, "item {item} is modified before it was created")
            }
            Self::DanglingReference { field, target } => {
                write!(f, "field `{field}` references missing entity {target}")
            }
            Self::UnregisteredPlaceholder { field, target } => {
                write!(f, "field `{field}` references unregistered placeholder {target}")
            }
            Self::UnknownWellKnown { field, value } => {
                write!(f, "field `{field}` holds undeclared constant `{value}`")
            }
        }
    }
}

impl Error for AuditError {}

/// Checks `state` against the output invariants.
///
/// `well_known` lists the constants a backend may emit in place of an
/// identifier.
pub fn audit_state(state: &GeneratedState, well_known: &[&str]) -> Result<(), AuditError> {
    let mut ids = HashSet::new();
    let mut insert = |id: EntityId| {
        if ids.insert(id) {
            Ok(())
        } else {
            Err(AuditError::DuplicateIdentifier(id))
        }
    };
    for entries in state.catalogs.values() {
        for entry in entries {
            insert(entry.id)?;
        }
    }
    for owner in &state.owners {
        insert(owner.id)?;
        for container in &owner.containers {
            insert(container.id)?;
            for item in container.items() {
                insert(item.id)?;
                if item.modified_at < item.created_at {
                    return Err(AuditError::TimestampOrder { item: item.id });
                }
            }
        }
    }

    let mut keys = HashSet::new();
    for owner in &state.owners {
        for key in std::iter::once(&owner.key).chain(owner.aliases.iter()) {
            if !keys.insert(key.as_str()) {
                return Err(AuditError::DuplicateOwnerKey(key.clone()));
            }
        }
    }

    let audit = RefAudit {
        ids: &ids,
        placeholders: &state.placeholders,
        well_known,
    };
    for owner in &state.owners {
        audit.fields(&owner.references)?;
        for container in &owner.containers {
            if let Some(parent) = &container.parent {
                audit.one("parent", parent)?;
            }
            audit.fields(&container.references)?;
            for item in container.items() {
                audit.fields(&item.references)?;
            }
        }
    }
    Ok(())
}

struct RefAudit<'a> {
    ids: &'a HashSet<EntityId>,
    placeholders: &'a BTreeSet<EntityId>,
    well_known: &'a [&'a str],
}

impl RefAudit<'_> {
    fn fields(&self, fields: &RefFields) -> Result<(), AuditError> {
        for (field, refs) in fields {
            for target in refs {
                self.one(field, target)?;
            }
        }
        Ok(())
    }

    fn one(&self, field: &str, target: &Ref) -> Result<(), AuditError> {
        match target {
            Ref::Allocated(id) if self.ids.contains(id) => Ok(()),
            Ref::Allocated(id) => Err(AuditError::DanglingReference {
                field: field.to_string(),
                target: *id,
            }),
            Ref::Placeholder(id) if self.placeholders.contains(id) => Ok(()),
            Ref::Placeholder(id) => Err(AuditError::UnregisteredPlaceholder {
                field: field.to_string(),
                target: *id,
            }),
            Ref::WellKnown(value) if self.well_known.contains(&value.as_str()) => Ok(()),
            Ref::WellKnown(value) => Err(AuditError::UnknownWellKnown {
                field: field.to_string(),
                value: value.clone(),
            }),
        }
    }
}

/// Why a document reference was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Not an identifier, placeholder, or declared constant.
    NotAnIdentifier,
    /// An identifier that is not a key anywhere in the document.
    Dangling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub value: String,
    pub kind: ViolationKind,
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let reason = match self.kind {
            ViolationKind::NotAnIdentifier => "is not an identifier",
            ViolationKind::Dangling => "is not a key in the document",
        };
        write!(f, "field `{}` value `{}` {reason}", self.field, self.value)
    }
}

/// Returns whether `value` has identifier or placeholder shape.
pub fn is_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

/// Scans every `reference_fields` entry of a rendered document.
///
/// Identifiers must appear as object keys somewhere in the document;
/// placeholders and `well_known` constants are accepted as-is.
pub fn verify_document(
    document: &Value,
    reference_fields: &[&str],
    well_known: &[&str],
) -> Vec<Violation> {
    let mut keys = HashSet::new();
    collect_keys(document, &mut keys);

    let mut violations = Vec::new();
    scan(document, reference_fields, &mut |field, value| {
        if well_known.contains(&value) {
            return;
        }
        let kind = if !is_identifier(value) {
            ViolationKind::NotAnIdentifier
        } else if value.starts_with(crate::model::reference::PLACEHOLDER_PREFIX)
            || keys.contains(value)
        {
            return;
        } else {
            ViolationKind::Dangling
        };
        violations.push(Violation {
            field: field.to_string(),
            value: value.to_string(),
            kind,
        });
    });
    violations
}

fn collect_keys<'a>(value: &'a Value, keys: &mut HashSet<&'a str>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                keys.insert(key.as_str());
                collect_keys(child, keys);
            }
        }
        Value::Array(items) => items.iter().for_each(|child| collect_keys(child, keys)),
        _ => {}
    }
}

fn scan<'a>(value: &'a Value, fields: &[&str], visit: &mut impl FnMut(&str, &'a str)) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if fields.contains(&key.as_str()) {
                    strings(child, &mut |text| visit(key, text));
                } else {
                    scan(child, fields, visit);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|child| scan(child, fields, visit)),
        _ => {}
    }
}

fn strings<'a>(value: &'a Value, visit: &mut impl FnMut(&'a str)) {
    match value {
        Value::String(text) => visit(text),
        Value::Array(items) => items.iter().for_each(|child| strings(child, visit)),
        Value::Object(map) => map.values().for_each(|child| strings(child, visit)),
        _ => {}
    }
}
