//! Run parameters ("recipes").
//!
//! # Responsibility
//! - Load run parameters from YAML and merge them over backend defaults.
//! - Reject invalid ranges before any entity is generated.
//!
//! # Invariants
//! - A validated profile has `min <= max` for every range.
//! - `forward_share` lies in `0.0..=1.0`.
//! - No window bound exceeds [`MAX_WINDOW_DAYS`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_OWNER_COUNT: u32 = 50;
pub const DEFAULT_KEY_ATTEMPTS: u32 = 64;
/// Upper bound for every `TimeWindow` day count (about a century).
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Configuration loading/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_yaml::Error),
    InvalidRange { field: String, min: u32, max: u32 },
    InvalidShare { field: String, value: f64 },
    WindowTooWide { field: String, days: u32, max: u32 },
    ZeroOwners,
    ZeroKeyAttempts,
    UnknownService(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read recipe `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid recipe: {err}"),
            Self::InvalidRange { field, min, max } => {
                write!(f, "range `{field}` has min {min} greater than max {max}")
            }
            Self::InvalidShare { field, value } => {
                write!(f, "`{field}` must be within 0.0..=1.0, got {value}")
            }
            Self::WindowTooWide { field, days, max } => {
                write!(f, "`{field}` is {days} days, more than the limit of {max}")
            }
            Self::ZeroOwners => write!(f, "owner count must be at least 1"),
            Self::ZeroKeyAttempts => write!(f, "key_attempts must be at least 1"),
            Self::UnknownService(name) => write!(f, "recipe names unknown service `{name}`"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Parse(value)
    }
}

/// Inclusive `[min, max]` count range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct CountRange {
    pub min: u32,
    pub max: u32,
}

impl CountRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub const fn exactly(count: u32) -> Self {
        Self::new(count, count)
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::InvalidRange {
                field: field.to_string(),
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl From<[u32; 2]> for CountRange {
    fn from(value: [u32; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl From<CountRange> for [u32; 2] {
    fn from(value: CountRange) -> Self {
        [value.min, value.max]
    }
}

/// Bounds for creation timestamps.
///
/// With probability `forward_share` a value falls on one of the
/// `future_days` days after the reference day (at least the next day);
/// otherwise it falls `min_days_ago..=max_days_ago` before the reference
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub min_days_ago: u32,
    pub max_days_ago: u32,
    pub future_days: u32,
    pub forward_share: f64,
}

impl TimeWindow {
    /// Window with no forward-looking values.
    pub const fn past(min_days_ago: u32, max_days_ago: u32) -> Self {
        Self {
            min_days_ago,
            max_days_ago,
            future_days: 0,
            forward_share: 0.0,
        }
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        for (name, days) in [
            ("min_days_ago", self.min_days_ago),
            ("max_days_ago", self.max_days_ago),
            ("future_days", self.future_days),
        ] {
            if days > MAX_WINDOW_DAYS {
                return Err(ConfigError::WindowTooWide {
                    field: format!("{field}.{name}"),
                    days,
                    max: MAX_WINDOW_DAYS,
                });
            }
        }
        if self.min_days_ago > self.max_days_ago {
            return Err(ConfigError::InvalidRange {
                field: format!("{field}.days_ago"),
                min: self.min_days_ago,
                max: self.max_days_ago,
            });
        }
        if !(0.0..=1.0).contains(&self.forward_share) {
            return Err(ConfigError::InvalidShare {
                field: format!("{field}.forward_share"),
                value: self.forward_share,
            });
        }
        Ok(())
    }
}

/// Per-service volume and time bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationProfile {
    /// Containers per owner.
    pub containers: CountRange,
    /// Items per container.
    pub items: CountRange,
    /// Peer references per owner.
    pub peers: CountRange,
    pub window: TimeWindow,
}

impl GenerationProfile {
    /// Validates every range, naming fields as `<service>.<field>`.
    pub fn validate(&self, service: &str) -> Result<(), ConfigError> {
        self.containers.validate(&format!("{service}.containers"))?;
        self.items.validate(&format!("{service}.items"))?;
        self.peers.validate(&format!("{service}.peers"))?;
        self.window.validate(&format!("{service}.window"))
    }

    fn apply(&mut self, patch: &ProfileOverride) {
        if let Some(containers) = patch.containers {
            self.containers = containers;
        }
        if let Some(items) = patch.items {
            self.items = items;
        }
        if let Some(peers) = patch.peers {
            self.peers = peers;
        }
        if let Some(window) = &patch.window {
            if let Some(value) = window.min_days_ago {
                self.window.min_days_ago = value;
            }
            if let Some(value) = window.max_days_ago {
                self.window.max_days_ago = value;
            }
            if let Some(value) = window.future_days {
                self.window.future_days = value;
            }
            if let Some(value) = window.forward_share {
                self.window.forward_share = value;
            }
        }
    }
}

/// Partial profile from a recipe; absent fields keep the backend default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverride {
    #[serde(default)]
    pub containers: Option<CountRange>,
    #[serde(default)]
    pub items: Option<CountRange>,
    #[serde(default)]
    pub peers: Option<CountRange>,
    #[serde(default)]
    pub window: Option<WindowOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowOverride {
    #[serde(default)]
    pub min_days_ago: Option<u32>,
    #[serde(default)]
    pub max_days_ago: Option<u32>,
    #[serde(default)]
    pub future_days: Option<u32>,
    #[serde(default)]
    pub forward_share: Option<f64>,
}

fn default_owners() -> u32 {
    DEFAULT_OWNER_COUNT
}

fn default_key_attempts() -> u32 {
    DEFAULT_KEY_ATTEMPTS
}

fn default_include_fixtures() -> bool {
    true
}

/// Parameters for one generation run.
///
/// Two runs are byte-identical only when both `seed` and `reference_time`
/// are fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub seed: Option<u64>,
    /// The run's "now". Read from the wall clock once when absent.
    #[serde(default)]
    pub reference_time: Option<DateTime<Utc>>,
    /// Total owners per service, fixtures included.
    #[serde(default = "default_owners")]
    pub owners: u32,
    #[serde(default = "default_key_attempts")]
    pub key_attempts: u32,
    #[serde(default = "default_include_fixtures")]
    pub include_fixtures: bool,
    /// Applied to every service before the per-service override.
    #[serde(default)]
    pub profile: ProfileOverride,
    #[serde(default)]
    pub services: BTreeMap<String, ProfileOverride>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            reference_time: None,
            owners: DEFAULT_OWNER_COUNT,
            key_attempts: DEFAULT_KEY_ATTEMPTS,
            include_fixtures: true,
            profile: ProfileOverride::default(),
            services: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    /// Parses a YAML recipe.
    pub fn from_yaml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Reads and parses a YAML recipe file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Checks run-wide values. Profiles are checked per service by
    /// [`GenerationProfile::validate`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owners == 0 {
            return Err(ConfigError::ZeroOwners);
        }
        if self.key_attempts == 0 {
            return Err(ConfigError::ZeroKeyAttempts);
        }
        Ok(())
    }

    /// Rejects per-service overrides for services not in `known`.
    pub fn check_services(&self, known: &[&str]) -> Result<(), ConfigError> {
        match self
            .services
            .keys()
            .find(|name| !known.contains(&name.as_str()))
        {
            Some(name) => Err(ConfigError::UnknownService(name.clone())),
            None => Ok(()),
        }
    }

    /// Layers the global then the per-service override over `base`.
    pub fn profile_for(&self, service: &str, base: GenerationProfile) -> GenerationProfile {
        let mut profile = base;
        profile.apply(&self.profile);
        if let Some(patch) = self.services.get(service) {
            profile.apply(patch);
        }
        profile
    }

    /// Returns the run's reference time truncated to whole seconds.
    pub fn resolve_now(&self) -> DateTime<Utc> {
        let now = self.reference_time.unwrap_or_else(Utc::now);
        DateTime::<Utc>::from_timestamp(now.timestamp(), 0).unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, CountRange, GenerationProfile, RunConfig, TimeWindow, MAX_WINDOW_DAYS,
    };

    fn base() -> GenerationProfile {
        GenerationProfile {
            containers: CountRange::new(1, 3),
            items: CountRange::new(3, 25),
            peers: CountRange::new(0, 3),
            window: TimeWindow {
                min_days_ago: 1,
                max_days_ago: 730,
                future_days: 365,
                forward_share: 0.7,
            },
        }
    }

    #[test]
    fn empty_recipe_uses_defaults() {
        let config = RunConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_layer_global_then_service() {
        let config = RunConfig::from_yaml_str(
            r#"
seed: 7
owners: 10
profile:
  items: [1, 2]
services:
  calendar:
    items: [4, 4]
    window:
      forward_share: 0.5
"#,
        )
        .unwrap();
        let calendar = config.profile_for("calendar", base());
        assert_eq!(calendar.items, CountRange::exactly(4));
        assert_eq!(calendar.window.forward_share, 0.5);
        assert_eq!(calendar.window.max_days_ago, 730);

        let drive = config.profile_for("drive", base());
        assert_eq!(drive.items, CountRange::new(1, 2));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut profile = base();
        profile.containers = CountRange::new(5, 2);
        match profile.validate("drive") {
            Err(ConfigError::InvalidRange { field, min, max }) => {
                assert_eq!(field, "drive.containers");
                assert_eq!((min, max), (5, 2));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn share_outside_unit_interval_is_rejected() {
        let mut profile = base();
        profile.window.forward_share = 1.5;
        assert!(matches!(
            profile.validate("calendar"),
            Err(ConfigError::InvalidShare { .. })
        ));
    }

    #[test]
    fn window_beyond_a_century_is_rejected() {
        let mut profile = base();
        profile.window.future_days = MAX_WINDOW_DAYS + 1;
        match profile.validate("calendar") {
            Err(ConfigError::WindowTooWide { field, days, max }) => {
                assert_eq!(field, "calendar.window.future_days");
                assert_eq!(days, MAX_WINDOW_DAYS + 1);
                assert_eq!(max, MAX_WINDOW_DAYS);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        profile.window.future_days = MAX_WINDOW_DAYS;
        assert!(profile.validate("calendar").is_ok());
    }

    #[test]
    fn zero_counts_are_rejected() {
        let config = RunConfig {
            owners: 0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroOwners)));

        let config = RunConfig {
            key_attempts: 0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroKeyAttempts)));
    }

    #[test]
    fn unknown_service_override_is_rejected() {
        let config = RunConfig::from_yaml_str("services:\n  fax: {}\n").unwrap();
        let err = config.check_services(&["calendar", "drive"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownService(name) if name == "fax"));
    }

    #[test]
    fn unknown_recipe_field_fails_to_parse() {
        assert!(matches!(
            RunConfig::from_yaml_str("ownerz: 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn reference_time_is_truncated_to_seconds() {
        let config = RunConfig::from_yaml_str("reference_time: 2025-03-01T12:30:45.987Z").unwrap();
        assert_eq!(
            config.resolve_now().to_rfc3339(),
            "2025-03-01T12:30:45+00:00"
        );
    }
}
