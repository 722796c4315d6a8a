//! Online retail service: a shared product catalog, promotions, and per-user
//! addresses, payment cards, cart, wish list, orders, and returns.
//!
//! # Invariants
//! - Products are allocated once per run in `Catalog("products")` and keyed
//!   by SKU (`SKU001`, ...). Promotions live in `Catalog("promotions")`,
//!   keyed by code.
//! - Every owner container carries a `kind`; order totals are derived from
//!   their lines at render time, never stored.
//! - A line whose SKU is not in the catalog keeps no `product_id`.

use crate::aggregate::{attribute_total, round_cents};
use crate::backends::common::{display_name, email_identity, fixture_identity, single_ref};
use crate::backends::{Backend, OwnerContext};
use crate::config::{CountRange, GenerationProfile, TimeWindow};
use crate::error::GenerationResult;
use crate::model::graph::{Container, Owner};
use crate::model::reference::{RefScope, RefSpec};
use crate::model::seed::{CatalogSeed, ContainerSeed, ItemSeed, OwnerFixture, OwnerIdentity, OwnerSeed, SeedTime};
use crate::synth::time::{date_only, iso_seconds};
use crate::synth::{OffsetRule, Synthesizer};
use crate::vocab::{people, VocabularyRequirement, VocabularySet};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde_json::{Map, Value};

pub const PRODUCT_CATALOG: &str = "products";
pub const PROMOTION_CATALOG: &str = "promotions";
const SKU_PREFIX: &str = "SKU";
const EXTRA_PRODUCTS: usize = 40;
const KIND: &str = "kind";
const ADDRESS: &str = "address";
const CARD: &str = "payment_card";
const CART: &str = "cart";
const WISH_LIST: &str = "wish_list";
const ORDER: &str = "order";
const RETURNS: &str = "returns";
const CANCELLED: &str = "cancelled";
const ORDER_STATUSES: &[&str] = &["delivered", "shipped", "pending", CANCELLED];
const RETURN_STATUSES: &[&str] = &["pending", "processed", "rejected"];
const PRODUCT_STATUSES: &[&str] = &["active", "inactive"];
/// Code, discount percent, minimum purchase.
const PROMOTIONS: &[(&str, i64, f64)] = &[
    ("SUMMERFUN", 15, 50.0),
    ("NEWCUSTOMER20", 20, 0.0),
    ("WELCOME10", 10, 0.0),
    ("SAVE20", 20, 100.0),
];

pub struct RetailBackend;

impl Backend for RetailBackend {
    fn name(&self) -> &'static str {
        "retail"
    }

    /// `containers` is the number of orders, `items` the lines per order.
    fn default_profile(&self) -> GenerationProfile {
        GenerationProfile {
            containers: CountRange::new(1, 4),
            items: CountRange::new(1, 3),
            peers: CountRange::exactly(0),
            window: TimeWindow::past(1, 730),
        }
    }

    fn builtin_vocabulary(&self) -> VocabularySet {
        people(&["gmail.com", "yahoo.com", "zscaler.org", "darkhorse.net"])
            .with_list(
                "product_names",
                &[
                    "Apple Watch Series 9 GPS 45mm Midnight Aluminum Case",
                    "Sony WF-1000XM4 Noise Canceling Wireless Earbuds",
                    "JBL Charge 5 Portable Bluetooth Speaker",
                    "Kindle Paperwhite 6.8 inch Display",
                    "Fitbit Charge 5 Fitness and Health Tracker",
                    "COSORI Pro LE 5-Qt Air Fryer",
                    "Vitamix A3500 Ascent Series Smart Blender",
                    "iRobot Roomba j7+ Self-Emptying Robot Vacuum",
                    "Dune by Frank Herbert Deluxe Hardcover",
                    "Sapiens: A Brief History of Humankind Paperback",
                    "Meta Quest 2 All-In-One VR Headset 128GB",
                    "GoPro HERO11 Black Action Camera",
                    "YETI Rambler 20oz Travel Mug",
                    "Gaiam Premium 6mm Print Yoga Mat",
                    "Logitech MX Master 3S Wireless Mouse",
                    "Herman Miller Aeron Ergonomic Office Chair",
                    "Nike Air Zoom Pegasus 39 Road Running Shoes",
                    "Levi's 511 Slim Jeans Dark Stonewash",
                    "Osprey Farpoint 40 Travel Backpack",
                    "Levoit Core 300 Air Purifier",
                ],
            )
            .with_list(
                "product_adjectives",
                &["Wireless", "Portable", "Eco-Friendly", "Smart", "Deluxe", "Compact", "Ultra", "Premium"],
            )
            .with_list(
                "product_nouns",
                &["Speaker", "Vacuum", "Headphones", "Air Fryer", "Backpack", "Yoga Mat", "Coffee Maker", "Lamp"],
            )
            .with_list(
                "product_categories",
                &["Electronics", "Home & Garden", "Toys", "Health", "Clothing", "Automotive", "Books"],
            )
            .with_list(
                "description_templates",
                &[
                    "Experience unmatched quality with our {name}, built for everyday use.",
                    "Upgrade your lifestyle with the new {name}.",
                    "The {name} combines style and performance for modern households.",
                    "Get ready for convenience on the go with this {name}.",
                ],
            )
            .with_list(
                "seller_names",
                &["TechTrend Outlet", "HomeGoods Direct", "Summit Outfitters", "Paperback Junction"],
            )
            .with_list("street_names", &["Main", "Oak", "Elm", "Maple", "Pine"])
            .with_list("street_types", &["Street", "Avenue", "Road", "Lane"])
            .with_list(
                "cities",
                &["Springfield", "Fairview", "Riverside", "Lakewood", "Centerville"],
            )
            .with_list("states", &["CA", "NY", "TX", "FL", "IL", "GA", "WA"])
            .with_list("card_networks", &["Visa", "Mastercard", "Amex", "Discover"])
            .with_list(
                "return_reasons",
                &["item damaged", "wrong size", "not as described", "changed mind"],
            )
    }

    fn required_vocabularies(&self) -> Vec<VocabularyRequirement> {
        vec![
            VocabularyRequirement::new("retail owner", "first_names"),
            VocabularyRequirement::new("retail owner", "last_names"),
            VocabularyRequirement::new("retail owner", "email_domains"),
            VocabularyRequirement::new("product", "product_names"),
            VocabularyRequirement::new("product", "product_adjectives"),
            VocabularyRequirement::new("product", "product_nouns"),
            VocabularyRequirement::new("product", "product_categories"),
            VocabularyRequirement::new("product", "description_templates"),
            VocabularyRequirement::new("product", "seller_names"),
            VocabularyRequirement::new("address", "street_names"),
            VocabularyRequirement::new("address", "street_types"),
            VocabularyRequirement::new("address", "cities"),
            VocabularyRequirement::new("address", "states"),
            VocabularyRequirement::new("payment card", "card_networks"),
            VocabularyRequirement::new("return", "return_reasons"),
        ]
    }

    fn identity_vocabularies(&self) -> Vec<&'static str> {
        vec!["first_names", "last_names", "email_domains"]
    }

    /// Orders move through fulfillment for up to ten days.
    fn modification_offset(&self) -> OffsetRule {
        OffsetRule::Seconds {
            min: 3_600,
            max: 86_400 * 10,
        }
    }

    fn catalog(&self, synth: &mut Synthesizer, vocab: &VocabularySet) -> Vec<CatalogSeed> {
        let mut entries = Vec::new();
        let names = vocab.get("product_names");
        for (index, name) in names.iter().enumerate() {
            entries.push(product(synth, vocab, index + 1, name.clone()));
        }
        for index in names.len() + 1..=names.len() + EXTRA_PRODUCTS {
            let name = format!(
                "{} {}",
                synth.pick(vocab.get("product_adjectives")),
                synth.pick(vocab.get("product_nouns"))
            );
            entries.push(product(synth, vocab, index, name));
        }
        for (code, discount, minimum) in PROMOTIONS {
            let expiry = synth.days_ahead(30, 180);
            entries.push(
                CatalogSeed::new(PROMOTION_CATALOG, *code)
                    .attr("code", *code)
                    .attr("discount_percentage", *discount)
                    .attr("min_purchase_amount", *minimum)
                    .attr("expiry_date", date_only(expiry))
                    .attr("is_active", true),
            );
        }
        entries
    }

    fn fixtures(&self, now: DateTime<Utc>) -> Vec<OwnerFixture> {
        let year = i64::from(now.year());
        let alice_order = now - Duration::days(12);
        let bob_order = now - Duration::days(40);
        vec![
            OwnerFixture {
                identity: fixture_identity("alice.smith@gmail.com", "Alice", "Smith"),
                seed: OwnerSeed::new()
                    .attr("balance", 125.75)
                    .container(address("addr_home", "Home Address", "742 Maple Street", "Springfield", "IL", 62704))
                    .container(card("card_visa", "Alice's Visa", "Alice Smith", "4242", year + 2, 8))
                    .container(
                        ContainerSeed::new(CART)
                            .attr(KIND, CART)
                            .item(cart_line("SKU004", 1, SeedTime::At(now - Duration::days(2)))),
                    )
                    .container(
                        order("order_1", "delivered", Some("TRK482915730"), alice_order)
                            .reference(address_ref(Some("addr_home")))
                            .reference(card_ref(Some("card_visa")))
                            .reference(promotion_ref(Some("SAVE20")))
                            .item(order_line("SKU003", 1, 149.99, alice_order))
                            // Discontinued product; the line stays, its link does not.
                            .item(order_line("SKU999", 2, 12.5, alice_order)),
                    )
                    .container(
                        ContainerSeed::new(RETURNS).attr(KIND, RETURNS).item(
                            return_entry("order_1", "SKU003", now - Duration::days(5))
                                .attr("reason", "item damaged")
                                .attr("status", "processed"),
                        ),
                    ),
            },
            OwnerFixture {
                identity: fixture_identity("bob.johnson@gmail.com", "Bob", "Johnson"),
                seed: OwnerSeed::new()
                    .attr("balance", 50.25)
                    .container(address("addr_work", "Work Address", "310 Oak Avenue", "Riverside", "CA", 92501))
                    .container(
                        order("order_1", "shipped", Some("TRK915204836"), bob_order)
                            .reference(address_ref(Some("addr_work")))
                            // Card removed from the account after checkout.
                            .reference(card_ref(Some("card_old")))
                            .reference(promotion_ref(None::<String>))
                            .item(order_line("SKU001", 1, 399.0, bob_order)),
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
        let first = ctx.identity.attr_str("first_name").to_string();
        let owner_name = display_name(ctx.identity);
        let skus: Vec<String> = ctx
            .catalog_keys
            .iter()
            .filter(|key| key.starts_with(SKU_PREFIX))
            .cloned()
            .collect();

        let mut seed = OwnerSeed::new().attr("balance", synth.float(0.0, 2500.0, 2));

        let mut address_keys = Vec::new();
        for index in 0..synth.int(1, 2) {
            let key = format!("address_{index}");
            let label = if synth.chance(0.7) { "Home Address" } else { "Work Address" };
            let street = format!(
                "{} {} {}",
                synth.int(100, 999),
                synth.pick(vocab.get("street_names")),
                synth.pick(vocab.get("street_types"))
            );
            let city = synth.pick(vocab.get("cities"));
            let state = synth.pick(vocab.get("states"));
            let zip = synth.int(10_000, 99_999);
            seed = seed.container(address(&key, label, &street, city, state, zip));
            address_keys.push(key);
        }

        let mut card_keys = Vec::new();
        let year = i64::from(synth.now().year());
        for index in 0..synth.int(0, 2) {
            let key = format!("card_{index}");
            let network = synth.pick(vocab.get("card_networks"));
            let last4 = synth.code("0123456789", 4);
            let expiry_year = synth.int(year + 1, year + 6);
            let expiry_month = synth.int(1, 12);
            seed = seed.container(card(
                &key,
                &format!("{first}'s {network}"),
                &owner_name,
                &last4,
                expiry_year,
                expiry_month,
            ));
            card_keys.push(key);
        }

        let mut cart = ContainerSeed::new(CART).attr(KIND, CART);
        let wanted = synth.int(0, 3) as usize;
        for sku in synth.sample(&skus, wanted) {
            let quantity = synth.int(1, 3);
            let added = SeedTime::At(synth.days_ago(0, 30));
            cart = cart.item(cart_line(sku, quantity, added));
        }
        seed = seed.container(cart);

        let mut wish_list = ContainerSeed::new(WISH_LIST).attr(KIND, WISH_LIST);
        let wanted = synth.int(0, 2) as usize;
        for sku in synth.sample(&skus, wanted) {
            let added = SeedTime::At(synth.days_ago(1, 365));
            wish_list = wish_list.item(
                ItemSeed::new(sku)
                    .created(added.clone())
                    .modified(added)
                    .reference(product_ref(sku)),
            );
        }
        seed = seed.container(wish_list);

        let mut placed = Vec::new();
        for index in 0..synth.count(ctx.profile.containers) {
            let key = format!("order_{index}");
            let ordered_at = synth.creation(&ctx.profile.window);
            let status = synth.choose(ORDER_STATUSES).copied().unwrap_or("pending");
            let tracking = (status != CANCELLED).then(|| format!("TRK{}", synth.code("0123456789", 9)));
            let promotion = if synth.chance(0.4) {
                synth.choose(PROMOTIONS).map(|(code, _, _)| code.to_string())
            } else {
                None
            };
            let delivery = synth.choose(&address_keys).cloned();
            let payment = synth.choose(&card_keys).cloned();

            let mut seed_order = order(&key, status, tracking.as_deref(), ordered_at)
                .reference(address_ref(delivery))
                .reference(card_ref(payment))
                .reference(promotion_ref(promotion));
            let wanted = synth.count(ctx.profile.items);
            let lines: Vec<String> = synth.sample(&skus, wanted).into_iter().map(str::to_string).collect();
            for sku in &lines {
                let quantity = synth.int(1, 2);
                let unit_price = synth.float(5.0, 1500.0, 2);
                seed_order = seed_order.item(order_line(sku, quantity, unit_price, ordered_at));
            }
            seed = seed.container(seed_order);
            placed.push((key, ordered_at, lines));
        }

        let mut returns = ContainerSeed::new(RETURNS).attr(KIND, RETURNS);
        if synth.chance(0.3) {
            if let Some((order_key, ordered_at, lines)) = synth.choose(&placed) {
                if let Some(sku) = synth.choose(lines) {
                    let days = synth.int(1, 20);
                    let returned_at = ordered_at
                        .checked_add_signed(Duration::days(days))
                        .unwrap_or(*ordered_at)
                        .min(synth.now())
                        .max(*ordered_at);
                    let reason = synth.pick(vocab.get("return_reasons"));
                    let status = synth.choose(RETURN_STATUSES).copied().unwrap_or("pending");
                    returns = returns.item(
                        return_entry(order_key, sku, returned_at)
                            .attr("reason", reason)
                            .attr("status", status),
                    );
                }
            }
        }
        Ok(seed.container(returns))
    }

    fn render_owner(&self, owner: &Owner) -> Value {
        let mut addresses = Map::new();
        let mut cards = Map::new();
        let mut orders = Map::new();
        let mut returns = Map::new();
        let mut cart = Vec::new();
        let mut wish_list = Vec::new();
        let mut lifetime_spend = 0.0;

        for container in &owner.containers {
            let id = container.id.to_string();
            match kind(container) {
                ADDRESS => {
                    addresses.insert(id, Value::Object(own_attributes(container)));
                }
                CARD => {
                    cards.insert(id, Value::Object(own_attributes(container)));
                }
                CART => {
                    cart.extend(container.items().iter().map(|line| {
                        let mut rendered = line.attributes.clone();
                        rendered.insert("product_id".to_string(), single_ref(&line.references, "product_id"));
                        rendered.insert("added_at".to_string(), Value::from(iso_seconds(line.created_at)));
                        Value::Object(rendered)
                    }));
                }
                WISH_LIST => {
                    wish_list.extend(container.items().iter().map(|entry| {
                        let mut rendered = Map::new();
                        rendered.insert("product_id".to_string(), single_ref(&entry.references, "product_id"));
                        rendered.insert("added_date".to_string(), Value::from(date_only(entry.created_at)));
                        Value::Object(rendered)
                    }));
                }
                ORDER => {
                    let total = attribute_total(container.items(), "line_total");
                    if container.attributes.get("status").and_then(Value::as_str) != Some(CANCELLED) {
                        lifetime_spend += total;
                    }
                    let lines: Vec<Value> = container
                        .items()
                        .iter()
                        .map(|line| {
                            let mut rendered = line.attributes.clone();
                            rendered.insert("product_id".to_string(), single_ref(&line.references, "product_id"));
                            Value::Object(rendered)
                        })
                        .collect();

                    let mut rendered = own_attributes(container);
                    for field in ["delivery_address_id", "payment_card_id", "promotion_id"] {
                        rendered.insert(field.to_string(), single_ref(&container.references, field));
                    }
                    rendered.insert("products".to_string(), Value::Array(lines));
                    rendered.insert("item_count".to_string(), Value::from(container.aggregates.item_count));
                    rendered.insert("total_amount".to_string(), Value::from(total));
                    rendered.insert(
                        "last_updated".to_string(),
                        container
                            .aggregates
                            .last_activity
                            .map_or(Value::Null, |at| Value::from(iso_seconds(at))),
                    );
                    orders.insert(id, Value::Object(rendered));
                }
                RETURNS => {
                    for entry in container.items() {
                        let mut rendered = entry.attributes.clone();
                        rendered.insert("order_id".to_string(), single_ref(&entry.references, "order_id"));
                        rendered.insert("product_id".to_string(), single_ref(&entry.references, "product_id"));
                        rendered.insert("return_date".to_string(), Value::from(date_only(entry.created_at)));
                        returns.insert(entry.id.to_string(), Value::Object(rendered));
                    }
                }
                _ => {}
            }
        }

        let mut rendered = owner.attributes.clone();
        rendered.insert("order_count".to_string(), Value::from(orders.len()));
        rendered.insert("lifetime_spend".to_string(), Value::from(round_cents(lifetime_spend)));
        rendered.insert("addresses".to_string(), Value::Object(addresses));
        rendered.insert("payment_cards".to_string(), Value::Object(cards));
        rendered.insert("cart".to_string(), Value::Array(cart));
        rendered.insert("wish_list".to_string(), Value::Array(wish_list));
        rendered.insert("orders".to_string(), Value::Object(orders));
        rendered.insert("returns".to_string(), Value::Object(returns));
        rendered.insert(
            "last_activity".to_string(),
            Value::from(iso_seconds(owner.aggregates.last_activity)),
        );
        Value::Object(rendered)
    }

    fn reference_fields(&self) -> &'static [&'static str] {
        &[
            "product_id",
            "order_id",
            "delivery_address_id",
            "payment_card_id",
            "promotion_id",
        ]
    }
}

fn kind(container: &Container) -> &str {
    container
        .attributes
        .get(KIND)
        .and_then(Value::as_str)
        .unwrap_or("")
}

fn own_attributes(container: &Container) -> Map<String, Value> {
    let mut attributes = container.attributes.clone();
    attributes.remove(KIND);
    attributes
}

fn product(synth: &mut Synthesizer, vocab: &VocabularySet, index: usize, name: String) -> CatalogSeed {
    let sku = format!("{SKU_PREFIX}{index:03}");
    let description = synth
        .pick(vocab.get("description_templates"))
        .replace("{name}", &name);
    let status = if synth.chance(0.85) {
        PRODUCT_STATUSES[0]
    } else {
        PRODUCT_STATUSES[1]
    };
    CatalogSeed::new(PRODUCT_CATALOG, sku.clone())
        .attr("sku", sku)
        .attr("name", name)
        .attr("description", description)
        .attr("category", synth.pick(vocab.get("product_categories")))
        .attr("seller", synth.pick(vocab.get("seller_names")))
        .attr("price", synth.float(5.0, 1500.0, 2))
        .attr("rating", synth.float(1.0, 5.0, 1))
        .attr("stock", synth.int(0, 250))
        .attr("fulfillment_center_id", format!("FC{:03}", synth.int(1, 3)))
        .attr("status", status)
}

fn address(key: &str, label: &str, street: &str, city: &str, state: &str, zip: i64) -> ContainerSeed {
    ContainerSeed::new(key)
        .attr(KIND, ADDRESS)
        .attr("name", label)
        .attr("street_address", street)
        .attr("city", city)
        .attr("state", state)
        .attr("country", "USA")
        .attr("zip_code", zip)
}

fn card(key: &str, name: &str, owner_name: &str, last4: &str, expiry_year: i64, expiry_month: i64) -> ContainerSeed {
    ContainerSeed::new(key)
        .attr(KIND, CARD)
        .attr("card_name", name)
        .attr("owner_name", owner_name)
        .attr("card_number_last4", last4)
        .attr("expiry_year", expiry_year)
        .attr("expiry_month", expiry_month)
}

fn order(key: &str, status: &str, tracking: Option<&str>, ordered_at: DateTime<Utc>) -> ContainerSeed {
    ContainerSeed::new(key)
        .attr(KIND, ORDER)
        .attr("order_date", iso_seconds(ordered_at))
        .attr("status", status)
        .attr("tracking_number", tracking.map_or(Value::Null, Value::from))
}

fn product_ref(sku: &str) -> RefSpec {
    RefSpec::single("product_id", RefScope::Catalog(PRODUCT_CATALOG), Some(sku))
}

fn address_ref(key: Option<impl Into<String>>) -> RefSpec {
    RefSpec::single("delivery_address_id", RefScope::OwnerContainers, key)
}

fn card_ref(key: Option<impl Into<String>>) -> RefSpec {
    RefSpec::single("payment_card_id", RefScope::OwnerContainers, key)
}

fn promotion_ref(code: Option<impl Into<String>>) -> RefSpec {
    RefSpec::single("promotion_id", RefScope::Catalog(PROMOTION_CATALOG), code)
}

/// Order lines are keyed by SKU, so a product appears once per order.
fn order_line(sku: &str, quantity: i64, unit_price: f64, ordered_at: DateTime<Utc>) -> ItemSeed {
    ItemSeed::new(sku)
        .created(SeedTime::At(ordered_at))
        .attr("quantity", quantity)
        .attr("unit_price", unit_price)
        .attr("line_total", round_cents(unit_price * quantity as f64))
        .reference(product_ref(sku))
}

fn cart_line(sku: &str, quantity: i64, added: SeedTime) -> ItemSeed {
    ItemSeed::new(sku)
        .created(added.clone())
        .modified(added)
        .attr("quantity", quantity)
        .reference(product_ref(sku))
}

fn return_entry(order_key: &str, sku: &str, returned_at: DateTime<Utc>) -> ItemSeed {
    ItemSeed::new(format!("return_{order_key}_{sku}"))
        .created(SeedTime::At(returned_at))
        .modified(SeedTime::At(returned_at))
        .reference(RefSpec::single("order_id", RefScope::OwnerContainers, Some(order_key)))
        .reference(product_ref(sku))
}

#[cfg(test)]
mod tests {
    use super::{RetailBackend, PRODUCT_CATALOG, PROMOTION_CATALOG};
    use crate::audit::verify_document;
    use crate::backends::Backend;
    use crate::config::RunConfig;
    use crate::engine::generate;
    use crate::model::graph::first_ref;
    use crate::output::render_document;
    use chrono::{DateTime, Utc};
    use serde_json::Value;
    use std::collections::HashSet;

    fn config(owners: u32) -> RunConfig {
        RunConfig {
            seed: Some(12),
            reference_time: Some(
                DateTime::parse_from_rfc3339("2025-11-28T10:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            owners,
            ..RunConfig::default()
        }
    }

    #[test]
    fn catalogs_are_allocated_once_per_run() {
        let outcome = generate(&RetailBackend, &config(4), None).unwrap();
        let products = &outcome.state.catalogs[PRODUCT_CATALOG];
        assert_eq!(products.len(), 60);
        let skus: HashSet<_> = products.iter().map(|entry| entry.key.as_str()).collect();
        assert_eq!(skus.len(), 60);
        assert!(skus.contains("SKU001") && skus.contains("SKU060"));
        assert_eq!(outcome.state.catalogs[PROMOTION_CATALOG].len(), 4);
    }

    #[test]
    fn order_lines_link_into_the_product_catalog() {
        let outcome = generate(&RetailBackend, &config(12), None).unwrap();
        let products: HashSet<_> = outcome.state.catalogs[PRODUCT_CATALOG]
            .iter()
            .map(|entry| entry.id)
            .collect();
        for owner in outcome.state.owners.iter().skip(2) {
            for line in owner.items() {
                let target = first_ref(&line.references, "product_id").unwrap();
                assert!(products.contains(&target.id().unwrap()));
            }
        }
    }

    #[test]
    fn fixture_order_total_and_dropped_links() {
        let outcome = generate(&RetailBackend, &config(2), None).unwrap();
        let alice = outcome.state.owner_by_key("alice.smith@gmail.com").unwrap();
        let rendered = RetailBackend.render_owner(alice);

        let orders = rendered["orders"].as_object().unwrap();
        assert_eq!(orders.len(), 1);
        let order = orders.values().next().unwrap();
        assert_eq!(order["total_amount"], 174.99);
        assert_eq!(order["item_count"], 2);
        assert!(order["promotion_id"].is_string());
        let lines = order["products"].as_array().unwrap();
        assert_eq!(lines.iter().filter(|line| line["product_id"].is_null()).count(), 1);
        assert_eq!(rendered["lifetime_spend"], 174.99);
        assert!(rendered.get("kind").is_none());

        let addresses = rendered["addresses"].as_object().unwrap();
        assert!(addresses.contains_key(order["delivery_address_id"].as_str().unwrap()));
        assert!(addresses.values().all(|address| address.get("kind").is_none()));

        let returns = rendered["returns"].as_object().unwrap();
        let entry = returns.values().next().unwrap();
        assert!(orders.contains_key(entry["order_id"].as_str().unwrap()));

        let bob = outcome.state.owner_by_key("bob.johnson@gmail.com").unwrap();
        let rendered = RetailBackend.render_owner(bob);
        let order = rendered["orders"].as_object().unwrap().values().next().unwrap();
        assert_eq!(order["payment_card_id"], Value::Null);
        assert_eq!(outcome.report.count("dropped_reference"), 2);
    }

    #[test]
    fn rendered_document_verifies() {
        let outcome = generate(&RetailBackend, &config(25), None).unwrap();
        let document = render_document(&RetailBackend, &outcome.state);
        assert_eq!(document["products"].as_object().unwrap().len(), 60);
        let violations = verify_document(
            &document,
            RetailBackend.reference_fields(),
            RetailBackend.well_known_keys(),
        );
        assert!(violations.is_empty(), "violations {violations:?}");
    }
}
