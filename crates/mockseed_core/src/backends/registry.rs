//! In-process backend registry.

use crate::backends::calendar::CalendarBackend;
use crate::backends::drive::DriveBackend;
use crate::backends::messaging::MessagingBackend;
use crate::backends::notes::NotesBackend;
use crate::backends::retail::RetailBackend;
use crate::backends::streaming::StreamingBackend;
use crate::backends::vehicle::VehicleBackend;
use crate::backends::Backend;
use crate::config::{ConfigError, RunConfig};
use crate::engine::{self, GenerationOutcome};
use crate::error::GenerationResult;
use crate::vocab::VocabularySet;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Backend registration/lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidName(String),
    DuplicateName(String),
    NotFound(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "backend name is invalid: {value}"),
            Self::DuplicateName(value) => write!(f, "backend already registered: {value}"),
            Self::NotFound(value) => write!(f, "unknown service: {value}"),
        }
    }
}

impl Error for RegistryError {}

/// Service name to adapter map.
#[derive(Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in service.
    pub fn with_builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Arc::new(CalendarBackend))?;
        registry.register(Arc::new(DriveBackend))?;
        registry.register(Arc::new(NotesBackend))?;
        registry.register(Arc::new(VehicleBackend))?;
        registry.register(Arc::new(MessagingBackend))?;
        registry.register(Arc::new(RetailBackend))?;
        registry.register(Arc::new(StreamingBackend))?;
        Ok(registry)
    }

    /// Registers one adapter.
    pub fn register(&mut self, backend: Arc<dyn Backend>) -> Result<(), RegistryError> {
        let name = backend.name().trim().to_string();
        if !is_valid_name(&name) {
            return Err(RegistryError::InvalidName(name));
        }
        if self.backends.contains_key(name.as_str()) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.backends.insert(name, backend);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Sorted service names.
    pub fn names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Backend>, RegistryError> {
        let normalized = name.trim();
        self.backends
            .get(normalized)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(normalized.to_string()))
    }

    /// Runs the named service after checking that every per-service
    /// override in `config` names a registered service.
    pub fn generate(
        &self,
        service: &str,
        config: &RunConfig,
        vocab_override: Option<&VocabularySet>,
    ) -> GenerationResult<GenerationOutcome> {
        config.check_services(&self.names())?;
        let backend = self
            .get(service)
            .map_err(|_| ConfigError::UnknownService(service.trim().to_string()))?;
        engine::generate(backend.as_ref(), config, vocab_override)
    }

    /// Every adapter, in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Backend>> {
        self.backends.values()
    }
}

fn is_valid_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::{BackendRegistry, RegistryError};
    use crate::backends::notes::NotesBackend;
    use crate::config::{ConfigError, RunConfig};
    use crate::error::GenerationError;
    use std::sync::Arc;

    #[test]
    fn builtin_registry_lists_every_service() {
        let registry = BackendRegistry::with_builtin().unwrap();
        assert_eq!(
            registry.names(),
            vec!["calendar", "drive", "messaging", "notes", "retail", "streaming", "vehicle"]
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = BackendRegistry::with_builtin().unwrap();
        let err = registry.register(Arc::new(NotesBackend)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("notes".to_string()));
    }

    #[test]
    fn unknown_service_is_not_found() {
        let registry = BackendRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get(" fax "),
            Err(RegistryError::NotFound(name)) if name == "fax"
        ));
    }

    #[test]
    fn generate_rejects_overrides_for_unregistered_services() {
        let registry = BackendRegistry::with_builtin().unwrap();
        let mut config = RunConfig {
            seed: Some(4),
            owners: 2,
            ..RunConfig::default()
        };
        config.services.insert("fax".to_string(), Default::default());
        assert!(matches!(
            registry.generate("notes", &config, None),
            Err(GenerationError::InvalidConfig(ConfigError::UnknownService(name))) if name == "fax"
        ));

        config.services.clear();
        assert!(matches!(
            registry.generate("pager", &config, None),
            Err(GenerationError::InvalidConfig(ConfigError::UnknownService(name))) if name == "pager"
        ));
        assert_eq!(registry.generate("notes", &config, None).unwrap().state.owners.len(), 2);
    }
}
