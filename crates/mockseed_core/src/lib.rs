//! Core generation engine for mockseed.
//! Turns loosely keyed seed data into cross-referenced mock backend state.

pub mod aggregate;
pub mod audit;
pub mod backends;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod logging;
pub mod model;
pub mod output;
pub mod report;
pub mod resolve;
pub mod synth;
pub mod vocab;

pub use audit::{verify_document, AuditError, Violation, ViolationKind};
pub use backends::{Backend, BackendRegistry, RegistryError};
pub use config::{
    ConfigError, CountRange, GenerationProfile, RunConfig, TimeWindow, MAX_WINDOW_DAYS,
};
pub use engine::{generate, GenerationOutcome};
pub use error::{GenerationError, GenerationResult};
pub use identity::{EntityId, IdentityAllocator, Scope};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::graph::GeneratedState;
pub use output::{output_file_name, render_document, write_document, OutputError};
pub use report::{Recovery, RunReport};
pub use vocab::{VocabularyError, VocabularySet};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
