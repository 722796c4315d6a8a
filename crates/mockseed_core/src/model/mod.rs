//! Domain model.
//!
//! # Responsibility
//! - `seed`: entities described by natural keys, as backends produce them.
//! - `reference`: reference-field policies and resolved references.
//! - `graph`: the identifier-keyed graph handed to the serializer.

pub mod graph;
pub mod reference;
pub mod seed;
