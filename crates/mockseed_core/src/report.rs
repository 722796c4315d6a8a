//! Non-fatal recoveries collected during a run.
//!
//! Recoveries are logged and counted; they never reach the output document.

use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A locally corrected condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// A required single reference fell back to its default target.
    UnresolvedRequiredReference { field: String, key: String },
    /// A seed timestamp was unparseable and was resynthesized.
    MalformedSeedTimestamp { field: String, value: String },
    /// A modification timestamp preceded creation and was resynthesized.
    TimestampOrderRepaired { field: String },
    /// An unresolvable list or optional reference was removed.
    DroppedReference { field: String, key: String },
    /// An unresolvable reference was pointed at an external placeholder.
    PlaceholderSynthesized { field: String },
    /// A parent edge closing a cycle was rewritten to the root.
    ParentCycleBroken { field: String },
}

impl Recovery {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnresolvedRequiredReference { .. } => "unresolved_required_reference",
            Self::MalformedSeedTimestamp { .. } => "malformed_seed_timestamp",
            Self::TimestampOrderRepaired { .. } => "timestamp_order_repaired",
            Self::DroppedReference { .. } => "dropped_reference",
            Self::PlaceholderSynthesized { .. } => "placeholder_synthesized",
            Self::ParentCycleBroken { .. } => "parent_cycle_broken",
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::UnresolvedRequiredReference { field, .. }
            | Self::MalformedSeedTimestamp { field, .. }
            | Self::TimestampOrderRepaired { field }
            | Self::DroppedReference { field, .. }
            | Self::PlaceholderSynthesized { field }
            | Self::ParentCycleBroken { field } => field,
        }
    }
}

impl Display for Recovery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} field={}", self.kind(), self.field())
    }
}

/// Per-run tally of recoveries.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    service: String,
    counts: BTreeMap<&'static str, usize>,
    recoveries: Vec<Recovery>,
}

impl RunReport {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            ..Self::default()
        }
    }

    /// Logs and stores one recovery.
    ///
    /// Log lines carry only the kind and field name, never seed values.
    pub fn record(&mut self, recovery: Recovery) {
        match &recovery {
            Recovery::UnresolvedRequiredReference { .. }
            | Recovery::MalformedSeedTimestamp { .. }
            | Recovery::ParentCycleBroken { .. } => warn!(
                "event=recovery module=engine service={} kind={} field={}",
                self.service,
                recovery.kind(),
                recovery.field()
            ),
            _ => debug!(
                "event=recovery module=engine service={} kind={} field={}",
                self.service,
                recovery.kind(),
                recovery.field()
            ),
        }
        *self.counts.entry(recovery.kind()).or_insert(0) += 1;
        self.recoveries.push(recovery);
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Number of recoveries of `kind` (see [`Recovery::kind`]).
    pub fn count(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.recoveries.len()
    }

    pub fn recoveries(&self) -> &[Recovery] {
        &self.recoveries
    }

    /// `kind=count` pairs in kind order, for one-line summaries.
    pub fn summary(&self) -> String {
        if self.counts.is_empty() {
            return "none".to_string();
        }
        self.counts
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::{Recovery, RunReport};

    #[test]
    fn counts_by_kind() {
        let mut report = RunReport::new("drive");
        report.record(Recovery::DroppedReference {
            field: "owners".to_string(),
            key: "x@example.com".to_string(),
        });
        report.record(Recovery::DroppedReference {
            field: "owners".to_string(),
            key: "y@example.com".to_string(),
        });
        report.record(Recovery::ParentCycleBroken {
            field: "parents".to_string(),
        });
        assert_eq!(report.count("dropped_reference"), 2);
        assert_eq!(report.count("parent_cycle_broken"), 1);
        assert_eq!(report.total(), 3);
        assert_eq!(
            report.summary(),
            "dropped_reference=2 parent_cycle_broken=1"
        );
    }

    #[test]
    fn empty_summary() {
        assert_eq!(RunReport::new("notes").summary(), "none");
    }
}
