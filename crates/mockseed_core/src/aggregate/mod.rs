//! Aggregate recomputation.
//!
//! Derived fields are pure functions of the assembled graph: recomputing
//! twice yields identical values.

use crate::model::graph::{Container, ContainerAggregates, Item, Owner, OwnerAggregates};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Returns `owner` with every container and owner aggregate recomputed.
///
/// `fallback_now` is the owner's last activity when it holds no items.
pub fn recompute(mut owner: Owner, fallback_now: DateTime<Utc>) -> Owner {
    for container in &mut owner.containers {
        container.aggregates = container_aggregates(container);
    }
    owner.aggregates = owner_aggregates(&owner, fallback_now);
    owner
}

pub fn container_aggregates(container: &Container) -> ContainerAggregates {
    let items = container.items();
    ContainerAggregates {
        item_count: items.len(),
        storage_bytes: items.iter().map(|item| item.size_bytes).sum(),
        last_activity: items.iter().map(|item| item.modified_at).max(),
    }
}

/// Owner totals, read from the items rather than cached container values.
pub fn owner_aggregates(owner: &Owner, fallback_now: DateTime<Utc>) -> OwnerAggregates {
    OwnerAggregates {
        container_count: owner.containers.len(),
        item_count: owner.items().count(),
        storage_bytes: owner.items().map(|item| item.size_bytes).sum(),
        last_activity: owner
            .items()
            .map(|item| item.modified_at)
            .max()
            .unwrap_or(fallback_now),
    }
}

/// Sum of a numeric item attribute, rounded to cents. Items without the
/// attribute count as zero.
pub fn attribute_total(items: &[Item], field: &str) -> f64 {
    round_cents(
        items
            .iter()
            .filter_map(|item| item.attributes.get(field).and_then(Value::as_f64))
            .sum(),
    )
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{attribute_total, recompute};
    use crate::model::graph::{Container, Item, Owner, OwnerAggregates, RefFields};
    use chrono::{DateTime, Duration, Utc};
    use serde_json::{Map, Value};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn item(n: u128, size: u64, days_ago: i64) -> Item {
        let modified = now() - Duration::days(days_ago);
        Item {
            id: Uuid::from_u128(n),
            key: format!("i{n}"),
            created_at: modified - Duration::hours(1),
            modified_at: modified,
            size_bytes: size,
            attributes: Map::new(),
            references: RefFields::new(),
        }
    }

    fn owner(containers: Vec<Container>) -> Owner {
        Owner {
            id: Uuid::from_u128(1),
            key: "owner".to_string(),
            aliases: Vec::new(),
            attributes: Map::new(),
            references: RefFields::new(),
            containers,
            aggregates: OwnerAggregates {
                container_count: 0,
                item_count: 0,
                storage_bytes: 0,
                last_activity: now(),
            },
        }
    }

    #[test]
    fn sums_counts_and_latest_activity() {
        let mut full = Container::new(Uuid::from_u128(10), "full");
        full.push_item(item(11, 100, 5));
        full.push_item(item(12, 250, 2));
        let empty = Container::new(Uuid::from_u128(20), "empty");

        let owner = recompute(owner(vec![full, empty]), now());
        assert_eq!(owner.aggregates.container_count, 2);
        assert_eq!(owner.aggregates.item_count, 2);
        assert_eq!(owner.aggregates.storage_bytes, 350);
        assert_eq!(owner.aggregates.last_activity, now() - Duration::days(2));
        assert_eq!(owner.containers[0].aggregates.item_count, 2);
        assert_eq!(owner.containers[1].aggregates.last_activity, None);
    }

    #[test]
    fn owner_without_items_falls_back_to_now() {
        let owner = recompute(owner(Vec::new()), now());
        assert_eq!(owner.aggregates.last_activity, now());
        assert_eq!(owner.aggregates.item_count, 0);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut container = Container::new(Uuid::from_u128(10), "c");
        container.push_item(item(11, 7, 1));
        let once = recompute(owner(vec![container]), now());
        let twice = recompute(once.clone(), now());
        assert_eq!(once, twice);
    }

    #[test]
    fn attribute_total_sums_to_cents_and_skips_missing_values() {
        let mut lines = vec![item(1, 0, 1), item(2, 0, 1), item(3, 0, 1)];
        lines[0].attributes.insert("line_total".to_string(), Value::from(19.99));
        lines[1].attributes.insert("line_total".to_string(), Value::from(0.02));
        assert_eq!(attribute_total(&lines, "line_total"), 20.01);
        assert_eq!(attribute_total(&[], "line_total"), 0.0);
    }
}
